//! Normalized event vocabulary.
//!
//! Every transport, whatever its backing, publishes exactly these four
//! events. Consumers depend on this module and nothing else.
//!
//! | Tag | Payload | Produced by |
//! |-----|---------|-------------|
//! | `data` | opaque telemetry blob | remote (`broadcast`/telemetry), local (data update) |
//! | `message` | [`ChatMessage`] | remote, local, window relay |
//! | `logline` | [`LogLine`] | local |
//! | `closed` | [`ClosedNotice`] | remote |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::channel::TaggedEvent;

// ============================================================================
// EventTag
// ============================================================================

/// Subscription key for [`NormalizedEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTag {
    /// Telemetry payload.
    Data,
    /// Chat-like message.
    Message,
    /// Echoed log text.
    LogLine,
    /// Remote connection closed.
    Closed,
}

impl EventTag {
    /// Returns the wire name of the tag.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Message => "message",
            Self::LogLine => "logline",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// NormalizedEvent
// ============================================================================

/// An event published by a transport.
///
/// Serializes as `{"event": "<tag>", "payload": ...}` so consumers that
/// forward events elsewhere keep the same vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "lowercase")]
pub enum NormalizedEvent {
    /// Opaque telemetry payload, passed through untouched.
    Data(Value),
    /// Chat-like message.
    Message(ChatMessage),
    /// Echoed log line.
    #[serde(rename = "logline")]
    LogLine(LogLine),
    /// Remote connection closed; carries retries remaining.
    Closed(ClosedNotice),
}

impl NormalizedEvent {
    /// Returns the subscription tag of this event.
    #[inline]
    #[must_use]
    pub const fn tag(&self) -> EventTag {
        match self {
            Self::Data(_) => EventTag::Data,
            Self::Message(_) => EventTag::Message,
            Self::LogLine(_) => EventTag::LogLine,
            Self::Closed(_) => EventTag::Closed,
        }
    }

    /// Returns the chat message, if this is a `message` event.
    #[inline]
    #[must_use]
    pub fn as_message(&self) -> Option<&ChatMessage> {
        match self {
            Self::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the close notice, if this is a `closed` event.
    #[inline]
    #[must_use]
    pub fn as_closed(&self) -> Option<&ClosedNotice> {
        match self {
            Self::Closed(notice) => Some(notice),
            _ => None,
        }
    }
}

impl TaggedEvent for NormalizedEvent {
    type Tag = EventTag;

    #[inline]
    fn tag(&self) -> EventTag {
        NormalizedEvent::tag(self)
    }
}

// ============================================================================
// ChatMessage
// ============================================================================

/// Sub-kind of a `message` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Sent to every connected client.
    Broadcast,
    /// Sent to this client only.
    Single,
    /// Posted by the embedding window.
    Window,
}

/// Payload of a `message` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Message sub-kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Sender, when the source reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Message body.
    pub message: Value,
}

impl ChatMessage {
    /// Creates a message of the given kind.
    #[inline]
    #[must_use]
    pub fn new(kind: MessageKind, from: Option<String>, message: Value) -> Self {
        Self {
            kind,
            from,
            message,
        }
    }

    /// Creates a window-posted message. Window messages carry no sender.
    #[inline]
    #[must_use]
    pub fn window(message: Value) -> Self {
        Self::new(MessageKind::Window, None, message)
    }
}

// ============================================================================
// LogLine
// ============================================================================

/// Sub-kind of a `logline` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLineKind {
    /// Log text echoed by the host.
    Echo,
}

/// Payload of a `logline` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    /// Log line sub-kind.
    #[serde(rename = "type")]
    pub kind: LogLineKind,

    /// Log text as delivered by the host.
    pub message: Value,
}

impl LogLine {
    /// Creates an echoed log line.
    #[inline]
    #[must_use]
    pub fn echo(message: Value) -> Self {
        Self {
            kind: LogLineKind::Echo,
            message,
        }
    }
}

// ============================================================================
// ClosedNotice
// ============================================================================

/// Payload of a `closed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClosedNotice {
    /// WebSocket close code.
    pub code: u16,

    /// Reconnection attempts left after this one.
    pub reconnecting: u32,
}

// ============================================================================
// Tests
// ============================================================================
