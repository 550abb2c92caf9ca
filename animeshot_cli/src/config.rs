use animeshot_core::SecretString;
use animeshot_core::error::ValidationError;
use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Confirm, Input, Password, Select};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Flat environment variables accepted for compatibility with existing deployments
pub const LEGACY_ENV_VARS: [(&str, &str); 9] = [
    ("GOOGLE_DRIVE_FOLDER_ID", "storage.folder_id"),
    ("GOOGLE_DRIVE_ACCESS_TOKEN", "storage.access_token"),
    ("FIREBASE_DATABASE_URL", "persistence.database_url"),
    ("FIREBASE_AUTH_TOKEN", "persistence.auth_token"),
    ("TRACE_MOE_API_KEY", "recognition.api_key"),
    ("TRACE_MOE_RATE_LIMIT", "recognition.min_request_interval_secs"),
    ("BATCH_SIZE", "batch.size"),
    ("CONCURRENT_LIMIT", "batch.concurrency"),
    ("MAX_RETRIES", "batch.max_retries"),
];

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,

    #[serde(default)]
    pub recognition: RecognitionSettings,

    #[serde(default)]
    pub batch: BatchSettings,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Drive,
    Local,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Drive folder id, or a directory path for the local backend
    pub folder_id: Option<String>,
    pub access_token: Option<SecretString>,
    pub api_base: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct PersistenceSettings {
    pub database_url: Option<String>,
    pub auth_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct RecognitionSettings {
    pub api_key: Option<SecretString>,
    pub trace_moe_url: String,
    pub anilist_url: String,
    pub min_similarity: f64,
    pub min_request_interval_secs: u64,
    pub cache_entries: usize,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct BatchSettings {
    /// Files requested per listing page
    pub size: usize,
    pub concurrency: usize,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Failed items allowed before the run exits non-zero
    pub failure_tolerance: usize,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Drive,
            folder_id: None,
            access_token: None,
            api_base: animeshot_core::storage::drive::DEFAULT_API_BASE.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            auth_token: None,
            timeout_secs: 30,
        }
    }
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            trace_moe_url: animeshot_core::recognition::trace_moe::DEFAULT_SEARCH_URL.to_string(),
            anilist_url: animeshot_core::recognition::anilist::DEFAULT_ANILIST_URL.to_string(),
            min_similarity: 0.8,
            min_request_interval_secs: 10,
            cache_entries: 1_000,
            timeout_secs: 30,
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            size: 100,
            concurrency: 5,
            max_retries: 3,
            initial_backoff_ms: 2_000,
            max_backoff_ms: 60_000,
            failure_tolerance: 0,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Apply `run` flags on top of the loaded configuration
    pub fn apply_cli_overrides(
        &mut self,
        batch_size: Option<usize>,
        concurrency: Option<usize>,
        folder: Option<String>,
    ) {
        if let Some(size) = batch_size {
            self.batch.size = size;
        }
        if let Some(concurrency) = concurrency {
            self.batch.concurrency = concurrency;
        }
        if folder.is_some() {
            self.storage.folder_id = folder;
        }
    }

    /// Check the settings a run needs
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.storage.folder_id.as_deref().is_none_or(str::is_empty) {
            return Err(ValidationError::missing_setting("storage.folder_id"));
        }
        self.validate_persistence()?;
        if self.storage.backend == StorageBackend::Drive
            && self.storage.access_token.as_ref().is_none_or(SecretString::is_empty)
        {
            return Err(ValidationError::missing_setting("storage.access_token"));
        }
        if self.batch.size < 1 {
            return Err(ValidationError::invalid_configuration(
                "batch.size must be at least 1",
            ));
        }
        if self.batch.concurrency < 1 {
            return Err(ValidationError::invalid_configuration(
                "batch.concurrency must be at least 1",
            ));
        }
        if self.batch.max_retries < 1 {
            return Err(ValidationError::invalid_configuration(
                "batch.max_retries must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.recognition.min_similarity) {
            return Err(ValidationError::invalid_configuration(
                "recognition.min_similarity must be between 0 and 1",
            ));
        }
        Ok(())
    }

    /// Check the settings the record store commands need
    pub fn validate_persistence(&self) -> std::result::Result<(), ValidationError> {
        if self.persistence.database_url.as_deref().is_none_or(str::is_empty) {
            return Err(ValidationError::missing_setting("persistence.database_url"));
        }
        Ok(())
    }
}

/// Configuration manager that handles XDG-compliant paths and layered configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new ConfigManager with default XDG-compliant paths
    pub fn new() -> Self {
        Self {
            config_path: crate::paths::get_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn get_config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    /// Load configuration with layered priority: legacy ENV > ENV > File > Defaults
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new();

        // Layer 1: Defaults
        figment = figment.merge(Serialized::defaults(AppConfig::default()));

        // Layer 2: Config file (if exists)
        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        // Layer 3: Environment variables
        figment = figment.merge(Env::prefixed("ANIMESHOT_").split("__"));

        // Layer 4: Flat variable names
        figment = figment.merge(legacy_env());

        figment.extract().context("Failed to load configuration")
    }

    /// Get a configuration value by key (dot notation)
    pub fn get(&self, key: &str) -> Result<String> {
        let value = self.load_as_toml()?;

        let mut current = &value;
        for part in key.split('.') {
            match current {
                toml::Value::Table(table) => {
                    current = table
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Key '{}' not found", key))?;
                }
                _ => anyhow::bail!("Invalid key path: {}", key),
            }
        }

        match current {
            toml::Value::String(s) => Ok(s.clone()),
            toml::Value::Integer(i) => Ok(i.to_string()),
            toml::Value::Float(f) => Ok(f.to_string()),
            toml::Value::Boolean(b) => Ok(b.to_string()),
            toml::Value::Array(items) => Ok(items
                .iter()
                .filter_map(|item| item.as_str())
                .collect::<Vec<_>>()
                .join(",")),
            _ => anyhow::bail!("Value at '{}' is not a simple type", key),
        }
    }

    /// Set a configuration value by key (dot notation)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.validate_config_value(key, value)?;

        let mut config = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            toml::from_str(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|part| part.is_empty()) {
            anyhow::bail!("Invalid key: '{}'", key);
        }

        let mut current = &mut config;
        for (i, part) in parts.iter().enumerate() {
            let toml::Value::Table(table) = current else {
                anyhow::bail!("Invalid key path: expected table at '{}'", part);
            };
            if i == parts.len() - 1 {
                table.insert(part.to_string(), self.parse_config_value(key, value)?);
                break;
            }
            current = table
                .entry(part.to_string())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        }

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(&config)?;
        fs::write(&self.config_path, toml_string)?;

        Ok(())
    }

    /// List all configuration values, secrets redacted
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let value = self.load_as_toml()?;

        let mut items = Vec::new();
        Self::collect_values(&value, String::new(), &mut items);
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    fn load_as_toml(&self) -> Result<toml::Value> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        Ok(toml::from_str(&toml_string)?)
    }

    fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let new_prefix = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::collect_values(val, new_prefix, items);
                }
            }
            toml::Value::String(s) => items.push((prefix, s.clone())),
            toml::Value::Integer(i) => items.push((prefix, i.to_string())),
            toml::Value::Float(f) => items.push((prefix, f.to_string())),
            toml::Value::Boolean(b) => items.push((prefix, b.to_string())),
            toml::Value::Array(values) => {
                let joined: Vec<&str> = values.iter().filter_map(|v| v.as_str()).collect();
                items.push((prefix, joined.join(",")));
            }
            _ => {}
        }
    }

    /// Validate a configuration value
    fn validate_config_value(&self, key: &str, value: &str) -> Result<()> {
        match key {
            "storage.backend" => {
                if !matches!(value, "drive" | "local") {
                    anyhow::bail!("backend must be 'drive' or 'local'");
                }
            }
            "batch.size" | "batch.concurrency" => {
                let n: usize = value.parse().context("Value must be a positive integer")?;
                if n == 0 {
                    anyhow::bail!("{key} must be at least 1");
                }
            }
            "batch.max_retries" => {
                let n: u32 = value.parse().context("max_retries must be a positive integer")?;
                if n == 0 {
                    anyhow::bail!("max_retries must be at least 1");
                }
            }
            "recognition.min_similarity" => {
                let similarity: f64 = value
                    .parse()
                    .context("min_similarity must be a number")?;
                if !(0.0..=1.0).contains(&similarity) {
                    anyhow::bail!("min_similarity must be between 0 and 1");
                }
            }
            k if k.ends_with("_secs") || k.ends_with("_ms") => {
                let _: u64 = value
                    .parse()
                    .context("Value must be a non-negative integer")?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Parse a value to the appropriate TOML type
    fn parse_config_value(&self, key: &str, value: &str) -> Result<toml::Value> {
        match key {
            "batch.size"
            | "batch.concurrency"
            | "batch.max_retries"
            | "batch.failure_tolerance"
            | "recognition.cache_entries" => {
                let num: i64 = value.parse().context("Expected integer value")?;
                Ok(toml::Value::Integer(num))
            }
            k if k.ends_with("_secs") || k.ends_with("_ms") => {
                let num: i64 = value.parse().context("Expected integer value")?;
                Ok(toml::Value::Integer(num))
            }
            "recognition.min_similarity" => {
                let f: f64 = value.parse().context("Expected number")?;
                Ok(toml::Value::Float(f))
            }
            "batch.include" | "batch.exclude" => Ok(toml::Value::Array(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| toml::Value::String(p.to_string()))
                    .collect(),
            )),
            // Ids, URLs and tokens stay strings even when they look numeric
            _ => Ok(toml::Value::String(value.to_string())),
        }
    }
}

/// Provider for the flat variable names in [`LEGACY_ENV_VARS`]
fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        LEGACY_ENV_VARS
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, path)| (*path).into())
    })
}

/// Interactive setup wizard for the service endpoints and credentials
pub async fn interactive_init(config_mgr: &mut ConfigManager, force: bool) -> Result<()> {
    println!("{}", "animeshot setup".bold());
    println!("{}", "===============".bold());
    println!();

    let current = config_mgr.load().ok();

    if !force && current.as_ref().is_some_and(|c| c.validate().is_ok()) {
        let reconfigure = Confirm::new()
            .with_prompt("Configuration already exists. Reconfigure?")
            .default(false)
            .interact()
            .context("Failed to read input")?;

        if !reconfigure {
            println!("Setup cancelled.");
            return Ok(());
        }
    }

    println!("This tool requires:");
    println!("  • A Google Drive folder (or a local directory) with screenshots");
    println!("  • A Firebase Realtime Database for the records");
    println!("  • Optionally a trace.moe API key for higher quotas");
    println!();

    // Step 1: Storage
    println!("{}", "Storage".bold());
    let backends = ["drive", "local"];
    let default_backend = match current.as_ref().map(|c| c.storage.backend) {
        Some(StorageBackend::Local) => 1,
        _ => 0,
    };
    let backend = Select::new()
        .with_prompt("Backend")
        .items(&backends)
        .default(default_backend)
        .interact()
        .context("Failed to read backend")?;

    let folder_prompt = if backends[backend] == "drive" {
        "Drive folder id"
    } else {
        "Screenshot directory"
    };
    let mut folder_input = Input::<String>::new().with_prompt(folder_prompt);
    if let Some(folder) = current.as_ref().and_then(|c| c.storage.folder_id.clone()) {
        folder_input = folder_input.default(folder);
    }
    let folder_id = folder_input
        .interact_text()
        .context("Failed to read folder")?;

    config_mgr.set("storage.backend", backends[backend])?;
    config_mgr.set("storage.folder_id", &folder_id)?;

    if backends[backend] == "drive" {
        let token = Password::new()
            .with_prompt("Drive access token")
            .interact()
            .context("Failed to read access token")?;
        config_mgr.set("storage.access_token", &token)?;
    }
    println!();

    // Step 2: Persistence
    println!("{}", "Firebase".bold());
    let mut url_input = Input::<String>::new()
        .with_prompt("Database URL")
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.starts_with("https://") || input.starts_with("http://") {
                Ok(())
            } else {
                Err("Must be an http(s) URL")
            }
        });
    if let Some(url) = current
        .as_ref()
        .and_then(|c| c.persistence.database_url.clone())
    {
        url_input = url_input.default(url);
    }
    let database_url = url_input
        .interact_text()
        .context("Failed to read database URL")?;
    config_mgr.set("persistence.database_url", &database_url)?;

    let auth_token = Password::new()
        .with_prompt("Database auth token (empty for none)")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read auth token")?;
    if !auth_token.is_empty() {
        config_mgr.set("persistence.auth_token", &auth_token)?;
    }
    println!();

    // Step 3: Recognition
    println!("{}", "trace.moe".bold());
    let api_key = Password::new()
        .with_prompt("API key (empty for anonymous)")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;
    if !api_key.is_empty() {
        config_mgr.set("recognition.api_key", &api_key)?;
    }

    println!();
    println!("{}", "✓ Configuration saved".green());
    println!("Config file: {}", config_mgr.get_config_path().display());
    println!();
    println!("You can now use:");
    println!("  animeshot folders  - Check storage access");
    println!("  animeshot run      - Rename screenshots");

    Ok(())
}
