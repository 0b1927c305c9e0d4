//! TOML configuration file loading
//!
//! Supports `~/.config/voice-sos/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::platform::{ToastDuration, ToastPosition};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SosConfigFile {
    /// Who to call and how
    #[serde(default)]
    pub emergency: EmergencyFileConfig,

    /// Speech recognition session settings
    #[serde(default)]
    pub recognition: RecognitionFileConfig,

    /// Position acquisition settings
    #[serde(default)]
    pub location: LocationFileConfig,

    /// Call placement settings
    #[serde(default)]
    pub telephony: TelephonyFileConfig,

    /// Toast settings
    #[serde(default)]
    pub notification: NotificationFileConfig,
}

/// Emergency contact configuration
#[derive(Debug, Default, Deserialize)]
pub struct EmergencyFileConfig {
    /// Number to dial (e.g. "112")
    pub contact: Option<String>,

    /// Ask the user to confirm before dialing
    pub confirm_prompt: Option<bool>,
}

/// Recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecognitionFileConfig {
    /// Language tag (e.g. "en-US")
    pub language: Option<String>,

    /// Phrases that start the emergency sequence
    pub trigger_phrases: Option<Vec<String>>,

    /// Seconds between proactive session restarts
    pub restart_interval_secs: Option<u64>,

    /// Automatic setup retries before giving up
    pub max_retries: Option<u32>,

    /// Milliseconds to wait between setup retries
    pub retry_backoff_ms: Option<u64>,
}

/// Location configuration
#[derive(Debug, Default, Deserialize)]
pub struct LocationFileConfig {
    /// Seconds before a position request is abandoned
    pub timeout_secs: Option<u64>,
    pub high_accuracy: Option<bool>,
    /// Map URL prefix the coordinates are appended to
    pub map_url: Option<String>,
    /// Fixed latitude for hosts without a location source
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Command printing `{"latitude": .., "longitude": ..}` (e.g. "termux-location")
    pub command: Option<String>,
}

/// Telephony configuration
#[derive(Debug, Default, Deserialize)]
pub struct TelephonyFileConfig {
    /// Command invoked with the number as its last argument
    pub dial_command: Option<String>,
}

/// Notification configuration
#[derive(Debug, Default, Deserialize)]
pub struct NotificationFileConfig {
    pub duration: Option<ToastDuration>,
    pub position: Option<ToastPosition>,
}

/// Load the TOML config file from the standard path
///
/// Returns `SosConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SosConfigFile {
    let Some(path) = config_file_path() else {
        return SosConfigFile::default();
    };

    load_config_file_from(&path)
}

/// Load a TOML config file from an explicit path
///
/// Missing or unparseable files fall back to defaults with a warning.
pub fn load_config_file_from(path: &Path) -> SosConfigFile {
    if !path.exists() {
        return SosConfigFile::default();
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
                SosConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SosConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voice-sos/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-sos").join("config.toml"))
}
