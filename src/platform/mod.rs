//! Device capabilities the controller drives
//!
//! Each capability is a trait so the controller can run against a phone
//! bridge, the console host in `console`, or test fakes.

mod location;
mod notify;
mod speech;
mod telephony;

use std::sync::Arc;

pub use location::{LocationProvider, Position, PositionOptions};
pub use notify::{Notifier, Toast, ToastDuration, ToastPosition};
pub use speech::{PartialResults, RecognitionOptions, SpeechEngine};
pub use telephony::Telephony;

/// Permission state reported by a platform capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Permission granted
    Granted,
    /// Permission refused
    Denied,
    /// Not decided yet; asking will show a prompt
    Prompt,
}

impl PermissionState {
    /// Check if the permission is granted
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
            Self::Prompt => write!(f, "prompt"),
        }
    }
}

/// The set of capabilities one controller instance composes
#[derive(Clone)]
pub struct Capabilities {
    /// Continuous speech recognition
    pub speech: Arc<dyn SpeechEngine>,
    /// Position fixes
    pub location: Arc<dyn LocationProvider>,
    /// Outgoing calls
    pub telephony: Arc<dyn Telephony>,
    /// Transient user-visible messages
    pub notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("speech", &self.speech.name())
            .field("location", &self.location.name())
            .field("telephony", &self.telephony.name())
            .field("notifier", &self.notifier.name())
            .finish()
    }
}
