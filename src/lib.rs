//! voice-sos - Voice-triggered emergency controller
//!
//! Listens continuously for a spoken trigger phrase ("help me" by default).
//! On detection it stops listening, captures the current location, and
//! places an emergency call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 EmergencyController                  │
//! │   Lifecycle  │  Phrase detection  │  Emergency seq.  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Platform capabilities                │
//! │   Speech  │  Location  │  Telephony  │  Notifier     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod platform;
pub mod voice;

pub use config::Config;
pub use controller::{
    ControllerSnapshot, EmergencyController, EmergencyOutcome, EmergencyReport, Phase,
    RetryPolicy,
};
pub use error::{Error, Result};
pub use platform::{
    Capabilities, LocationProvider, Notifier, PermissionState, Position, SpeechEngine, Telephony,
};
pub use voice::PhraseDetector;
