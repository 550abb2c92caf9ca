//! Configuration layering: defaults, TOML file, prefixed and flat environment variables

use animeshot_cli::config::{ConfigManager, StorageBackend};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

fn manager(dir: &TempDir) -> ConfigManager {
    ConfigManager::with_path(dir.path().join("config.toml"))
}

/// Set environment variables for the duration of `f`
fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
    for (key, value) in vars {
        unsafe { std::env::set_var(key, value) };
    }
    let result = f();
    for (key, _) in vars {
        unsafe { std::env::remove_var(key) };
    }
    result
}

#[test]
#[serial]
fn test_defaults_without_file() {
    let dir = TempDir::new().unwrap();
    let config = manager(&dir).load().unwrap();

    assert_eq!(config.storage.backend, StorageBackend::Drive);
    assert_eq!(config.batch.size, 100);
    assert_eq!(config.batch.concurrency, 5);
    assert_eq!(config.batch.max_retries, 3);
    assert_eq!(config.recognition.min_request_interval_secs, 10);
    assert!((config.recognition.min_similarity - 0.8).abs() < f64::EPSILON);
    assert!(config.storage.folder_id.is_none());
}

#[test]
#[serial]
fn test_file_values_override_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        r#"
[storage]
backend = "local"
folder_id = "/srv/shots"

[batch]
concurrency = 2
exclude = ["*.gif"]
"#,
    )
    .unwrap();

    let config = manager(&dir).load().unwrap();
    assert_eq!(config.storage.backend, StorageBackend::Local);
    assert_eq!(config.storage.folder_id.as_deref(), Some("/srv/shots"));
    assert_eq!(config.batch.concurrency, 2);
    assert_eq!(config.batch.exclude, vec!["*.gif".to_string()]);
    assert_eq!(config.batch.size, 100);
}

#[test]
#[serial]
fn test_prefixed_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "[batch]\nsize = 20\n").unwrap();

    let config = with_env(&[("ANIMESHOT_BATCH__SIZE", "40")], || {
        manager(&dir).load().unwrap()
    });
    assert_eq!(config.batch.size, 40);
}

#[test]
#[serial]
fn test_flat_env_names_are_mapped() {
    let dir = TempDir::new().unwrap();

    let config = with_env(
        &[
            ("GOOGLE_DRIVE_FOLDER_ID", "drive-folder"),
            ("FIREBASE_DATABASE_URL", "https://example.firebaseio.com"),
            ("CONCURRENT_LIMIT", "3"),
            ("TRACE_MOE_RATE_LIMIT", "6"),
        ],
        || manager(&dir).load().unwrap(),
    );

    assert_eq!(config.storage.folder_id.as_deref(), Some("drive-folder"));
    assert_eq!(
        config.persistence.database_url.as_deref(),
        Some("https://example.firebaseio.com")
    );
    assert_eq!(config.batch.concurrency, 3);
    assert_eq!(config.recognition.min_request_interval_secs, 6);
}

#[test]
#[serial]
fn test_flat_env_names_win_over_prefixed() {
    let dir = TempDir::new().unwrap();

    let config = with_env(
        &[("ANIMESHOT_BATCH__MAX_RETRIES", "2"), ("MAX_RETRIES", "7")],
        || manager(&dir).load().unwrap(),
    );
    assert_eq!(config.batch.max_retries, 7);
}

#[test]
#[serial]
fn test_secret_from_env_is_usable_but_redacted() {
    let dir = TempDir::new().unwrap();

    let config = with_env(&[("GOOGLE_DRIVE_ACCESS_TOKEN", "ya29.abc")], || {
        manager(&dir).load().unwrap()
    });
    let token = config.storage.access_token.unwrap();
    assert_eq!(token.expose_secret(), "ya29.abc");
    assert!(!format!("{token:?}").contains("ya29"));
}

#[test]
#[serial]
fn test_set_writes_typed_values() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir);

    manager.set("batch.size", "25").unwrap();
    manager.set("recognition.min_similarity", "0.9").unwrap();
    manager.set("batch.include", "*.png, *.jpg").unwrap();
    manager.set("storage.folder_id", "12345").unwrap();

    let config = manager.load().unwrap();
    assert_eq!(config.batch.size, 25);
    assert!((config.recognition.min_similarity - 0.9).abs() < f64::EPSILON);
    assert_eq!(config.batch.include, vec!["*.png", "*.jpg"]);
    assert_eq!(config.storage.folder_id.as_deref(), Some("12345"));
}

#[test]
#[serial]
fn test_set_rejects_invalid_values() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir);

    assert!(manager.set("batch.concurrency", "0").is_err());
    assert!(manager.set("storage.backend", "s3").is_err());
    assert!(manager.set("recognition.min_similarity", "1.5").is_err());
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
#[serial]
fn test_list_redacts_secrets() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager(&dir);
    manager.set("recognition.api_key", "secret-key").unwrap();

    let items = manager.list().unwrap();
    let (_, value) = items
        .iter()
        .find(|(key, _)| key == "recognition.api_key")
        .unwrap();
    assert_ne!(value, "secret-key");
    assert!(items.iter().any(|(key, _)| key == "batch.concurrency"));
}
