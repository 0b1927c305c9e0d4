//! Phrase detector construction tests
//!
//! Detection over raw payloads is covered next to the detector itself

use voice_sos::{Config, Error, PhraseDetector};

#[test]
fn test_phrase_normalization() {
    let detector = PhraseDetector::new(["  Help ME  ", "MAYDAY", "   "]).unwrap();

    // Trimmed, lowercased, blanks dropped
    assert_eq!(detector.phrases(), &["help me", "mayday"]);
}

#[test]
fn test_no_phrases_is_config_error() {
    let result = PhraseDetector::new(Vec::<String>::new());
    assert!(matches!(result, Err(Error::Config(_))));

    let result = PhraseDetector::new(["", "  "]);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_default_config_listens_for_help_me() {
    let config = Config::default();
    let detector = PhraseDetector::new(&config.recognition.trigger_phrases).unwrap();

    assert_eq!(detector.phrases(), &["help me"]);
}

#[test]
fn test_configured_phrases_replace_default() {
    let mut config = Config::default();
    config.recognition.trigger_phrases = vec!["Mayday".to_string(), "SOS".to_string()];
    let detector = PhraseDetector::new(&config.recognition.trigger_phrases).unwrap();

    assert_eq!(detector.phrases(), &["mayday", "sos"]);
    let heard = vec!["sos sos sos".to_string()];
    assert_eq!(detector.find_match(&heard), Some(("sos sos sos", "sos")));
}
