//! TOML configuration file loading
//!
//! Supports `~/.config/coach/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct CoachConfigFile {
    #[serde(default)]
    pub session: SessionFileConfig,

    #[serde(default)]
    pub media: MediaFileConfig,

    #[serde(default)]
    pub tone: ToneFileConfig,

    #[serde(default)]
    pub scheduler: SchedulerFileConfig,

    #[serde(default)]
    pub backend: BackendFileConfig,
}

/// Session timing
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Session length in seconds
    pub duration_secs: Option<u64>,

    /// Countdown decrement in milliseconds
    pub tick_ms: Option<u64>,

    /// Shared deadline for config fetch and connection open, in seconds
    pub connect_timeout_secs: Option<u64>,

    /// Pause after tearing down a stale session, in milliseconds
    pub start_grace_ms: Option<u64>,

    /// How long the observing flag may stay raised, in seconds
    pub observing_window_secs: Option<u64>,
}

/// Device acquisition
#[derive(Debug, Default, Deserialize)]
pub struct MediaFileConfig {
    /// Enable the camera when available
    pub video: Option<bool>,

    /// Retries after the first camera attempt
    pub camera_retries: Option<u32>,

    /// Fixed delay between attempts, in milliseconds
    pub retry_delay_ms: Option<u64>,
}

/// Tone adaptation
#[derive(Debug, Default, Deserialize)]
pub struct ToneFileConfig {
    /// Duplicate-signal window in milliseconds
    pub debounce_ms: Option<u64>,

    /// Minimum time a tone is held, in seconds
    pub min_change_interval_secs: Option<u64>,
}

/// Virtual message scheduling
#[derive(Debug, Default, Deserialize)]
pub struct SchedulerFileConfig {
    /// Poll interval in milliseconds
    pub poll_ms: Option<u64>,

    /// Idle cooldown in seconds
    pub cooldown_secs: Option<u64>,
}

/// External services
#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// Configuration/credential service base URL
    pub url: Option<String>,

    /// Memory extraction endpoint
    pub memory_url: Option<String>,

    /// Reward service endpoint
    pub rewards_url: Option<String>,

    /// Stable user identifier sent with requests
    pub user_id: Option<String>,

    /// BCP 47 locale (e.g. "en-US")
    pub locale: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CoachConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> CoachConfigFile {
    config_file_path().map_or_else(CoachConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults with a warning.
pub fn load_from(path: &Path) -> CoachConfigFile {
    if !path.exists() {
        return CoachConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                CoachConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            CoachConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/coach/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("coach").join("config.toml"))
}
