//! Centralized path management for the animeshot CLI
//!
//! Configuration lives in the platform config directory, run state (the
//! checkpoint) in the platform data directory.

use std::path::PathBuf;

/// The name of the application directory used across all platforms
const APP_DIR: &str = "animeshot";

/// The name of the checkpoint file
const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Returns the base data directory for the application
///
/// - Linux: `~/.local/share/animeshot`
/// - macOS: `~/Library/Application Support/animeshot`
/// - Windows: `%APPDATA%/animeshot`
///
/// Falls back to `.animeshot` in the current directory when the platform
/// directory cannot be determined.
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".animeshot"))
}

/// Returns the path of the resume checkpoint
pub fn get_checkpoint_path() -> PathBuf {
    get_data_dir().join(CHECKPOINT_FILE)
}

/// Returns the configuration directory (`~/.config/animeshot` on Linux)
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".animeshot"))
}

/// Returns the path to the configuration file
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}
