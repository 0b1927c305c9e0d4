//! Trigger phrase detection
//!
//! Scans partial transcription results for a trigger phrase. Detection acts on
//! partial hypotheses rather than waiting for a final result, trading false
//! positives for latency.

use crate::platform::PartialResults;
use crate::{Error, Result};

/// Detects trigger phrases in partial transcription results
#[derive(Debug, Clone)]
pub struct PhraseDetector {
    phrases: Vec<String>,
}

impl PhraseDetector {
    /// Create a new phrase detector
    ///
    /// # Arguments
    ///
    /// * `phrases` - Trigger phrases (e.g. "help me"), matched case-insensitively
    ///
    /// # Errors
    ///
    /// Returns error if no non-empty phrase remains after normalization
    pub fn new<I, S>(phrases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized: Vec<String> = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        if normalized.is_empty() {
            return Err(Error::Config("no trigger phrase configured".to_string()));
        }

        tracing::debug!(phrases = ?normalized, "phrase detector initialized");

        Ok(Self { phrases: normalized })
    }

    /// Check a raw engine payload for a trigger phrase
    ///
    /// Malformed payloads never match.
    #[must_use]
    pub fn detect(&self, payload: &serde_json::Value) -> bool {
        match PartialResults::from_payload(payload) {
            Ok(results) => self.find_match(&results.value).is_some(),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring partial result");
                false
            }
        }
    }

    /// Return the first candidate containing a trigger phrase, with the phrase
    #[must_use]
    pub fn find_match<'a>(&self, candidates: &'a [String]) -> Option<(&'a str, &str)> {
        candidates.iter().find_map(|candidate| {
            let normalized = candidate.to_lowercase();
            self.phrases
                .iter()
                .find(|phrase| normalized.contains(phrase.as_str()))
                .map(|phrase| {
                    tracing::info!(
                        phrase = %phrase,
                        candidate = %candidate,
                        "trigger phrase detected"
                    );
                    (candidate.as_str(), phrase.as_str())
                })
        })
    }

    /// Get the configured phrases
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}
