//! Speech recognition engine capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::PermissionState;
use crate::{Error, Result};

/// Options passed to the engine when a session starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionOptions {
    /// BCP 47 language tag (e.g. "en-US")
    pub language: String,

    /// Emit incremental hypotheses while speech is ongoing
    pub partial_results: bool,

    /// Show the platform's own recognition UI
    pub popup: bool,
}

impl RecognitionOptions {
    /// Continuous, headless recognition in the given language
    #[must_use]
    pub fn continuous(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            partial_results: true,
            popup: false,
        }
    }
}

/// A well-formed partial-result payload: `{ "value": ["...", ...] }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartialResults {
    /// Candidate transcriptions, most likely first
    pub value: Vec<String>,
}

impl PartialResults {
    /// Interpret a raw engine payload
    ///
    /// # Errors
    ///
    /// Returns `MalformedEvent` if `value` is missing, null, not an array,
    /// or contains anything other than strings
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self> {
        Self::deserialize(payload).map_err(|e| Error::MalformedEvent(e.to_string()))
    }
}

/// Continuous speech recognition engine
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &'static str;

    /// Check whether recognition is supported on this device
    async fn check_available(&self) -> Result<bool>;

    /// Ask for microphone / recognition permission
    async fn request_permission(&self) -> Result<PermissionState>;

    /// Begin a recognition session
    async fn start(&self, options: &RecognitionOptions) -> Result<()>;

    /// End the current session
    async fn stop(&self) -> Result<()>;

    /// Subscribe to raw partial-result payloads
    ///
    /// Payloads are untyped; consumers must tolerate malformed ones.
    fn subscribe(&self) -> broadcast::Receiver<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_string_candidates() {
        let parsed = PartialResults::from_payload(&json!({"value": ["a", "b"]})).unwrap();
        assert_eq!(parsed.value, vec!["a", "b"]);
    }

    #[test]
    fn rejects_malformed_payloads() {
        for payload in [
            json!({"value": null}),
            json!({"value": "not-an-array"}),
            json!({"value": ["ok", 3]}),
            json!({}),
            json!(null),
        ] {
            assert!(
                matches!(
                    PartialResults::from_payload(&payload),
                    Err(Error::MalformedEvent(_))
                ),
                "{payload} should be malformed"
            );
        }
    }

    #[test]
    fn continuous_options() {
        let options = RecognitionOptions::continuous("en-US");
        assert!(options.partial_results);
        assert!(!options.popup);
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({"language": "en-US", "partialResults": true, "popup": false})
        );
    }
}
