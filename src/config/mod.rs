//! Configuration management for the emergency controller

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::platform::{Position, PositionOptions, RecognitionOptions, ToastDuration, ToastPosition};
use crate::{Error, Result};

/// International emergency number, reachable from most GSM networks
pub const DEFAULT_EMERGENCY_CONTACT: &str = "112";

/// Phrase that triggers the emergency sequence unless configured otherwise
pub const DEFAULT_TRIGGER_PHRASE: &str = "help me";

/// Default recognition language
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Default map URL prefix for location links
pub const DEFAULT_MAP_URL: &str = "https://maps.google.com/?q=";

/// Controller configuration
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    /// Who to call and how
    pub emergency: EmergencyConfig,

    /// Speech recognition session settings
    pub recognition: RecognitionConfig,

    /// Position acquisition settings
    pub location: LocationConfig,

    /// Call placement settings
    pub telephony: TelephonyConfig,

    /// Toast settings
    pub notification: NotificationConfig,
}

/// Emergency contact configuration
#[derive(Debug, Clone, Serialize)]
pub struct EmergencyConfig {
    /// Number dialed when the trigger fires
    pub contact: String,

    /// Ask the user to confirm before dialing
    pub confirm_prompt: bool,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            contact: DEFAULT_EMERGENCY_CONTACT.to_string(),
            confirm_prompt: true,
        }
    }
}

/// Speech recognition configuration
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionConfig {
    /// Language tag passed to the engine
    pub language: String,

    /// Phrases that start the emergency sequence (matched as substrings)
    pub trigger_phrases: Vec<String>,

    /// Proactive session restart interval
    ///
    /// Engines silently end sessions after a platform-specific maximum.
    pub restart_interval: Duration,

    /// Automatic setup retries before reporting permanent failure
    pub max_retries: u32,

    /// Fixed wait between setup retries
    pub retry_backoff: Duration,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            trigger_phrases: vec![DEFAULT_TRIGGER_PHRASE.to_string()],
            restart_interval: Duration::from_secs(10),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl RecognitionConfig {
    /// Engine options for a continuous session
    #[must_use]
    pub fn options(&self) -> RecognitionOptions {
        RecognitionOptions::continuous(self.language.clone())
    }
}

/// Location configuration
#[derive(Debug, Clone, Serialize)]
pub struct LocationConfig {
    /// Hard limit on a single position request
    pub timeout: Duration,

    /// Request a GPS-grade fix
    pub high_accuracy: bool,

    /// Map URL prefix the coordinates are appended to
    pub map_url: String,

    /// Fixed position for hosts without a location source
    pub fixed: Option<Position>,

    /// Shell command printing a JSON position
    pub command: Option<String>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            high_accuracy: true,
            map_url: DEFAULT_MAP_URL.to_string(),
            fixed: None,
            command: None,
        }
    }
}

impl LocationConfig {
    /// Options for a position request
    #[must_use]
    pub const fn options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: self.high_accuracy,
            timeout: self.timeout,
        }
    }
}

/// Telephony configuration
#[derive(Debug, Clone, Default, Serialize)]
pub struct TelephonyConfig {
    /// Shell command the number is appended to (e.g. "termux-telephony-call")
    pub dial_command: Option<String>,
}

/// Notification configuration
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NotificationConfig {
    pub duration: ToastDuration,
    pub position: ToastPosition,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit TOML path instead of the standard one
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let fc = file::load_config_file_from(path);
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn from_sources<F>(fc: file::SosConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let emergency = EmergencyConfig {
            contact: env("SOS_EMERGENCY_CONTACT")
                .or(fc.emergency.contact)
                .unwrap_or(defaults.emergency.contact),
            confirm_prompt: parse_env(&env, "SOS_CONFIRM_PROMPT")
                .or(fc.emergency.confirm_prompt)
                .unwrap_or(defaults.emergency.confirm_prompt),
        };

        let trigger_phrases = env("SOS_TRIGGER_PHRASES")
            .map(|s| s.split(',').map(ToString::to_string).collect())
            .or(fc.recognition.trigger_phrases)
            .unwrap_or(defaults.recognition.trigger_phrases);

        let recognition = RecognitionConfig {
            language: env("SOS_LANGUAGE")
                .or(fc.recognition.language)
                .unwrap_or(defaults.recognition.language),
            trigger_phrases,
            restart_interval: parse_env(&env, "SOS_RESTART_INTERVAL_SECS")
                .or(fc.recognition.restart_interval_secs)
                .map_or(defaults.recognition.restart_interval, Duration::from_secs),
            max_retries: parse_env(&env, "SOS_MAX_RETRIES")
                .or(fc.recognition.max_retries)
                .unwrap_or(defaults.recognition.max_retries),
            retry_backoff: parse_env(&env, "SOS_RETRY_BACKOFF_MS")
                .or(fc.recognition.retry_backoff_ms)
                .map_or(defaults.recognition.retry_backoff, Duration::from_millis),
        };

        let fixed = match (fc.location.latitude, fc.location.longitude) {
            (Some(latitude), Some(longitude)) => Some(Position {
                latitude,
                longitude,
            }),
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "location.latitude and location.longitude must be set together".to_string(),
                ));
            }
        };

        let location = LocationConfig {
            timeout: parse_env(&env, "SOS_LOCATION_TIMEOUT_SECS")
                .or(fc.location.timeout_secs)
                .map_or(defaults.location.timeout, Duration::from_secs),
            high_accuracy: fc
                .location
                .high_accuracy
                .unwrap_or(defaults.location.high_accuracy),
            map_url: env("SOS_MAP_URL")
                .or(fc.location.map_url)
                .unwrap_or(defaults.location.map_url),
            fixed,
            command: env("SOS_LOCATION_COMMAND").or(fc.location.command),
        };

        let telephony = TelephonyConfig {
            dial_command: env("SOS_DIAL_COMMAND").or(fc.telephony.dial_command),
        };

        let notification = NotificationConfig {
            duration: fc.notification.duration.unwrap_or_default(),
            position: fc.notification.position.unwrap_or_default(),
        };

        let config = Self {
            emergency,
            recognition,
            location,
            telephony,
            notification,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check invariants the controller relies on
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.emergency.contact.trim().is_empty() {
            return Err(Error::Config("emergency contact is empty".to_string()));
        }

        if self
            .recognition
            .trigger_phrases
            .iter()
            .all(|p| p.trim().is_empty())
        {
            return Err(Error::Config("no trigger phrase configured".to_string()));
        }

        if self.recognition.restart_interval.is_zero() {
            return Err(Error::Config("restart interval must be non-zero".to_string()));
        }

        if self.location.timeout.is_zero() {
            return Err(Error::Config("location timeout must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Path of the standard config file, if a home directory exists
    #[must_use]
    pub fn file_path() -> Option<PathBuf> {
        file::config_file_path()
    }
}

/// Parse an environment value, warning and ignoring it when invalid
fn parse_env<T, F>(env: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid environment value");
            None
        }
    }
}
