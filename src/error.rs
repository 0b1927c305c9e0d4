//! Error types for the emergency controller

use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while listening for or acting on an emergency
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A required permission was refused by the user or platform
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Speech recognition is not available on this device
    #[error("speech recognition not available")]
    EngineUnavailable,

    /// Starting a recognition session failed (retryable)
    #[error("speech recognition setup failed: {0}")]
    SetupFailure(String),

    /// Position could not be acquired (auxiliary, never fatal to a call)
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    /// The emergency call could not be placed
    #[error("call failed: {0}")]
    CallFailure(String),

    /// A partial-result payload did not have the expected shape
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Notification surface error
    #[error("notification error: {0}")]
    Notification(String),

    /// The controller was torn down and can no longer be used
    #[error("controller has been torn down")]
    TornDown,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether a later attempt at the same operation may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::SetupFailure(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_failures_are_retryable() {
        assert!(Error::SetupFailure("busy".to_string()).is_retryable());
        assert!(!Error::EngineUnavailable.is_retryable());
        assert!(!Error::PermissionDenied("microphone".to_string()).is_retryable());
        assert!(!Error::TornDown.is_retryable());
    }

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(
            Error::CallFailure("no signal".to_string()).to_string(),
            "call failed: no signal"
        );
        assert_eq!(
            Error::EngineUnavailable.to_string(),
            "speech recognition not available"
        );
    }
}
