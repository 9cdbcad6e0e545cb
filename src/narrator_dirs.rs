//! Centralized application directory paths for the narration bridge.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Environment Overrides
//!
//! All paths can be overridden for testing or custom deployments:
//! - `NARRATOR_DATA_DIR` — overrides [`data_dir`]
//! - `NARRATOR_CONFIG_DIR` — overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Resolves to `dirs::data_dir()/narrator-bridge/` by default. Override with
/// the `NARRATOR_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("NARRATOR_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("narrator-bridge"))
        .unwrap_or_else(|| PathBuf::from("/tmp/narrator-bridge-data"))
}

/// Application config directory.
///
/// Used for `config.toml` and the character registry overlay.
///
/// Resolves to `dirs::config_dir()/narrator-bridge/` by default. Override with
/// the `NARRATOR_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("NARRATOR_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("narrator-bridge"))
        .unwrap_or_else(|| PathBuf::from("/tmp/narrator-bridge-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Character registry overlay file (`config_dir()/characters.toml`).
#[must_use]
pub fn characters_file() -> PathBuf {
    config_dir().join("characters.toml")
}
