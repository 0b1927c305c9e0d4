//! Voice processing module
//!
//! Trigger phrase detection over speech engine partial results.

mod phrase;

pub use phrase::PhraseDetector;
