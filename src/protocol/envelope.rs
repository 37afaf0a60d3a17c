//! Inbound frame classification.
//!
//! Text frames from the remote endpoint are either the heartbeat (`.`) or a
//! JSON envelope:
//!
//! ```json
//! { "type": "broadcast", "msgtype": "CombatData", "from": "...", "msg": { ... } }
//! { "type": "broadcast", "msgtype": "broadcast",  "from": "...", "msg": "..." }
//! { "type": "send", "from": "...", "msg": "..." }
//! ```
//!
//! | `type` | `msgtype` | Result |
//! |--------|-----------|--------|
//! | `broadcast` | `broadcast` | `message` / broadcast |
//! | `broadcast` | any other string | `data` carrying `msg` |
//! | `send` | any | `message` / single |
//! | anything else | any | ignored |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::error::Result;
use crate::event::{ChatMessage, MessageKind, NormalizedEvent};

// ============================================================================
// Constants
// ============================================================================

/// Keepalive payload. Echoed back, never surfaced.
pub const HEARTBEAT: &str = ".";

/// `msgtype` the endpoint uses for combat telemetry.
pub const TELEMETRY_KIND: &str = "CombatData";

/// `msgtype` marking a chat broadcast.
const BROADCAST_KIND: &str = "broadcast";

// ============================================================================
// Inbound
// ============================================================================

/// Result of classifying one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The keepalive payload.
    Heartbeat,
    /// A payload that maps onto the normalized vocabulary.
    Event(NormalizedEvent),
    /// Well-formed JSON with an unknown envelope shape.
    Ignored,
}

/// Classifies an inbound text frame.
///
/// # Errors
///
/// Returns [`Error::Json`](crate::Error::Json) if the frame is neither the
/// heartbeat nor valid JSON.
pub fn classify(text: &str) -> Result<Inbound> {
    if text == HEARTBEAT {
        return Ok(Inbound::Heartbeat);
    }

    let value: Value = serde_json::from_str(text)?;
    Ok(Envelope(value)
        .into_event()
        .map_or(Inbound::Ignored, Inbound::Event))
}

// ============================================================================
// Envelope
// ============================================================================

/// A parsed JSON envelope.
#[derive(Debug, Clone)]
struct Envelope(Value);

impl Envelope {
    /// Maps the envelope onto a normalized event, if it has a known shape.
    fn into_event(mut self) -> Option<NormalizedEvent> {
        match self.get_str("type")? {
            "broadcast" => match self.get_str("msgtype")? {
                BROADCAST_KIND => Some(NormalizedEvent::Message(ChatMessage::new(
                    MessageKind::Broadcast,
                    self.sender(),
                    self.take_msg(),
                ))),
                _ => Some(NormalizedEvent::Data(self.take_msg())),
            },
            "send" => Some(NormalizedEvent::Message(ChatMessage::new(
                MessageKind::Single,
                self.sender(),
                self.take_msg(),
            ))),
            _ => None,
        }
    }

    /// Gets a string field.
    #[inline]
    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Gets the sender, stringifying non-string values.
    #[inline]
    fn sender(&self) -> Option<String> {
        match self.0.get("from")? {
            Value::Null => None,
            Value::String(from) => Some(from.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Takes the message body, leaving `null` behind.
    #[inline]
    fn take_msg(&mut self) -> Value {
        self.0.get_mut("msg").map(Value::take).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    use crate::Error;

    #[test]
    fn test_heartbeat() {
        assert_eq!(classify(".").expect("classify"), Inbound::Heartbeat);
    }

    #[test]
    fn test_send_envelope() {
        let inbound = classify(r#"{"type":"send","from":"A","msg":"hi"}"#).expect("classify");
        assert_eq!(
            inbound,
            Inbound::Event(NormalizedEvent::Message(ChatMessage::new(
                MessageKind::Single,
                Some("A".into()),
                json!("hi"),
            )))
        );
    }

    #[test]
    fn test_broadcast_message() {
        let inbound = classify(r#"{"type":"broadcast","msgtype":"broadcast","from":"B","msg":"yo"}"#)
            .expect("classify");
        match inbound {
            Inbound::Event(NormalizedEvent::Message(message)) => {
                assert_eq!(message.kind, MessageKind::Broadcast);
                assert_eq!(message.from.as_deref(), Some("B"));
                assert_eq!(message.message, json!("yo"));
            }
            other => panic!("expected broadcast message, got {other:?}"),
        }
    }

    #[test]
    fn test_telemetry_is_data() {
        let text = json!({
            "type": "broadcast",
            "msgtype": TELEMETRY_KIND,
            "from": "server",
            "msg": { "Encounter": { "title": "Striking Dummy" }, "Combatant": {} }
        })
        .to_string();

        let inbound = classify(&text).expect("classify");
        assert_eq!(
            inbound,
            Inbound::Event(NormalizedEvent::Data(
                json!({ "Encounter": { "title": "Striking Dummy" }, "Combatant": {} })
            ))
        );
    }

    #[test]
    fn test_missing_msg_becomes_null() {
        let inbound = classify(r#"{"type":"send","from":"A"}"#).expect("classify");
        match inbound {
            Inbound::Event(NormalizedEvent::Message(message)) => {
                assert_eq!(message.message, Value::Null);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_numeric_sender_is_stringified() {
        let inbound = classify(r#"{"type":"send","from":42,"msg":"x"}"#).expect("classify");
        let Inbound::Event(event) = inbound else {
            panic!("expected event");
        };
        assert_eq!(
            event.as_message().and_then(|m| m.from.as_deref()),
            Some("42")
        );
    }

    #[test]
    fn test_unknown_shapes_are_ignored() {
        for text in [
            r#"{"type":"whisper","msg":"x"}"#,
            r#"{"msg":"x"}"#,
            r#"{"type":"broadcast","msg":"x"}"#,
            r#"{"type":7}"#,
            "[1,2,3]",
            "42",
            "\"..\"",
        ] {
            assert_eq!(classify(text).expect("valid json"), Inbound::Ignored, "{text}");
        }
    }

    #[test]
    fn test_malformed_is_json_error() {
        let err = classify("{not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(classify("").is_err());
    }

    proptest! {
        #[test]
        fn prop_send_yields_single_message(from in ".*", msg in ".*") {
            let text = json!({ "type": "send", "from": from, "msg": msg }).to_string();
            let inbound = classify(&text).expect("classify");
            prop_assert_eq!(
                inbound,
                Inbound::Event(NormalizedEvent::Message(ChatMessage::new(
                    MessageKind::Single,
                    Some(from),
                    Value::String(msg),
                )))
            );
        }

        #[test]
        fn prop_non_broadcast_msgtype_yields_data(
            msgtype in "[A-Za-z]{1,16}".prop_filter("not broadcast", |t| t != "broadcast"),
            n in any::<i64>(),
        ) {
            let body = json!({ "value": n });
            let text = json!({ "type": "broadcast", "msgtype": msgtype, "from": "s", "msg": body })
                .to_string();
            prop_assert_eq!(classify(&text).expect("classify"), Inbound::Event(NormalizedEvent::Data(body)));
        }

        #[test]
        fn prop_non_json_never_classifies(text in "[^\\[\\]{}\"0-9tfn. \\-]+") {
            prop_assert!(classify(&text).is_err());
        }
    }
}
