//! Decides whether a Telein event represents a lead worth forwarding.
//!
//! Telein reports every keypress. Only a decimal digit means the caller
//! picked a menu option; `*`, `#`, missing keys (hangups, timeouts) are noise.

use crate::config::is_dtmf_digit;
use crate::webhook_models::InboundEvent;

pub const KEY_PRESSED: &str = "key_pressed";

/// Semantic events that always carry a lead.
pub const LEAD_EVENTS: [&str; 3] = ["lead_created", "call_answered", "contact_form_submitted"];

/// Tag used when the payload has no `event_type`.
pub const UNKNOWN_EVENT: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventClassification {
    /// Effective event type, also used to pick the destination and tag the record.
    pub event_type: String,
    /// DTMF key as sent, if any.
    pub key: Option<String>,
    pub proceed: bool,
}

impl EventClassification {
    /// Human-readable reason for ignoring the event.
    pub fn ignore_reason(&self) -> String {
        if self.event_type == KEY_PRESSED {
            match &self.key {
                Some(key) => format!("Key '{}' is not a menu digit", key),
                None => "Keypress without key".to_string(),
            }
        } else {
            format!("Event type '{}' does not create leads", self.event_type)
        }
    }
}

pub fn classify(event: &InboundEvent) -> EventClassification {
    let event_type = event.top_level_text("event_type");
    let key = event.top_level_text("key");

    let proceed = match event_type.as_deref() {
        Some(KEY_PRESSED) => key.as_deref().is_some_and(is_dtmf_digit),
        Some(other) => LEAD_EVENTS.contains(&other),
        None => false,
    };

    EventClassification {
        event_type: event_type.unwrap_or_else(|| UNKNOWN_EVENT.to_string()),
        key,
        proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn classify_json(value: Value) -> EventClassification {
        match value {
            Value::Object(map) => classify(&InboundEvent::from_map(map)),
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn test_digit_keypress_proceeds() {
        for digit in 0..=9 {
            let c = classify_json(json!({"event_type": "key_pressed", "key": digit.to_string()}));
            assert!(c.proceed, "digit {} should proceed", digit);
        }
    }

    #[test]
    fn test_numeric_key_proceeds() {
        let c = classify_json(json!({"event_type": "key_pressed", "key": 5}));
        assert!(c.proceed);
        assert_eq!(c.key.as_deref(), Some("5"));
    }

    #[test]
    fn test_non_digit_or_missing_key_is_ignored() {
        let star = classify_json(json!({"event_type": "key_pressed", "key": "*"}));
        assert!(!star.proceed);
        assert_eq!(star.ignore_reason(), "Key '*' is not a menu digit");

        let missing = classify_json(json!({"event_type": "key_pressed"}));
        assert!(!missing.proceed);
        assert_eq!(missing.ignore_reason(), "Keypress without key");

        let two_digits = classify_json(json!({"event_type": "key_pressed", "key": "12"}));
        assert!(!two_digits.proceed);
    }

    #[test]
    fn test_padded_values_are_not_trimmed() {
        let padded = classify_json(json!({"event_type": " key_pressed ", "key": " 5 "}));
        assert!(!padded.proceed);
        assert_eq!(padded.event_type, " key_pressed ");

        let padded_key = classify_json(json!({"event_type": "key_pressed", "key": " 5 "}));
        assert!(!padded_key.proceed);
        assert_eq!(padded_key.key.as_deref(), Some(" 5 "));

        assert!(!classify_json(json!({"event_type": "Lead_Created"})).proceed);
    }

    #[test]
    fn test_lead_events_proceed() {
        for event_type in LEAD_EVENTS {
            assert!(classify_json(json!({"event_type": event_type})).proceed);
        }
    }

    #[test]
    fn test_other_events_are_ignored() {
        let c = classify_json(json!({"event_type": "campaign_updated"}));
        assert!(!c.proceed);
        assert_eq!(c.event_type, "campaign_updated");

        let absent = classify_json(json!({"lead_data": {"telefone": "11988887777"}}));
        assert!(!absent.proceed);
        assert_eq!(absent.event_type, UNKNOWN_EVENT);
    }
}
