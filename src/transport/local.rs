//! Transport over events injected by the plugin host.
//!
//! When the consumer runs inside the host there is no socket. The host
//! exposes its eventing surface and actions through [`HostApi`], and
//! [`LocalTransport`] adapts them onto the normalized vocabulary:
//!
//! | Host event | Normalized event |
//! |------------|------------------|
//! | `onOverlayDataUpdate` | `data` (detail passed through) |
//! | `onBroadcastMessageReceive` | `message` / broadcast |
//! | `onRecvMessage` | `message` / single |
//! | `onLogLine` | `logline` / echo |
//!
//! The host connection is assumed always-on: no `closed` events, no retries.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::{debug, trace};

use crate::event::{ChatMessage, EventChannel, LogLine, MessageKind, NormalizedEvent};

use super::capability::{Capability, CapabilitySet};
use super::{Transport, TransportKind};

// ============================================================================
// HostEvent
// ============================================================================

/// The four host event sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    /// Combat data refreshed.
    DataUpdate,
    /// Broadcast message received.
    BroadcastMessage,
    /// Message addressed to this overlay.
    DirectMessage,
    /// Log line echoed.
    LogLine,
}

impl HostEventKind {
    /// All kinds, in wiring order.
    pub const ALL: [Self; 4] = [
        Self::DataUpdate,
        Self::BroadcastMessage,
        Self::DirectMessage,
        Self::LogLine,
    ];

    /// Returns the host's native event name.
    #[inline]
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::DataUpdate => "onOverlayDataUpdate",
            Self::BroadcastMessage => "onBroadcastMessageReceive",
            Self::DirectMessage => "onRecvMessage",
            Self::LogLine => "onLogLine",
        }
    }

    /// Maps a native event name to its kind.
    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.event_name() == name)
    }
}

/// An event fired by the host, with its detail payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    /// Event source.
    pub kind: HostEventKind,
    /// Detail payload. Message-like events carry `{"message": ...}`.
    pub detail: Value,
}

impl HostEvent {
    /// Creates a host event.
    #[inline]
    #[must_use]
    pub fn new(kind: HostEventKind, detail: Value) -> Self {
        Self { kind, detail }
    }

    /// Maps the host event onto the normalized vocabulary.
    #[must_use]
    pub fn normalize(mut self) -> NormalizedEvent {
        match self.kind {
            HostEventKind::DataUpdate => NormalizedEvent::Data(self.detail),
            HostEventKind::BroadcastMessage => NormalizedEvent::Message(ChatMessage::new(
                MessageKind::Broadcast,
                None,
                self.take_message(),
            )),
            HostEventKind::DirectMessage => NormalizedEvent::Message(ChatMessage::new(
                MessageKind::Single,
                None,
                self.take_message(),
            )),
            HostEventKind::LogLine => NormalizedEvent::LogLine(LogLine::echo(self.take_message())),
        }
    }

    #[inline]
    fn take_message(&mut self) -> Value {
        self.detail
            .get_mut("message")
            .map(Value::take)
            .unwrap_or_default()
    }
}

// ============================================================================
// HostApi
// ============================================================================

/// Handler the host calls for every event it fires.
pub type HostEventHandler = Box<dyn Fn(HostEvent) + Send + Sync>;

/// Eventing and action surface exposed by the plugin host.
pub trait HostApi: Send + Sync {
    /// Returns `true` if the host exposes an end-of-encounter action.
    fn has_end_encounter(&self) -> bool;

    /// Ends the current encounter. Only called when
    /// [`has_end_encounter`](Self::has_end_encounter) is `true`.
    fn end_encounter(&self);

    /// Registers a handler for all four event sources.
    fn attach(&self, handler: HostEventHandler);
}

/// A host that exposes nothing: no action, and events never fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedHost;

impl HostApi for DetachedHost {
    #[inline]
    fn has_end_encounter(&self) -> bool {
        false
    }

    #[inline]
    fn end_encounter(&self) {}

    #[inline]
    fn attach(&self, _handler: HostEventHandler) {}
}

// ============================================================================
// LocalTransport
// ============================================================================

/// Transport adapting an injected [`HostApi`].
pub struct LocalTransport {
    host: Arc<dyn HostApi>,
    capabilities: CapabilitySet,
    events: Arc<EventChannel<NormalizedEvent>>,
    connected: AtomicBool,
}

impl fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTransport")
            .field("capabilities", &self.capabilities)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl LocalTransport {
    /// Creates a transport over `host`, probing its capabilities once.
    #[must_use]
    pub fn new(host: Arc<dyn HostApi>) -> Self {
        let capabilities = if host.has_end_encounter() {
            [Capability::END].into_iter().collect()
        } else {
            CapabilitySet::empty()
        };

        debug!(capabilities = ?capabilities.to_sorted_vec(), "Local transport created");

        Self {
            host,
            capabilities,
            events: Arc::new(EventChannel::new()),
            connected: AtomicBool::new(false),
        }
    }

    /// Returns `true` once host events are wired.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Transport for LocalTransport {
    #[inline]
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    #[inline]
    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    #[inline]
    fn events(&self) -> &EventChannel<NormalizedEvent> {
        &self.events
    }

    fn connect(&self) -> bool {
        if self.connected.swap(true, Ordering::AcqRel) {
            return true;
        }

        let events = Arc::clone(&self.events);
        self.host.attach(Box::new(move |host_event: HostEvent| {
            trace!(source = host_event.kind.event_name(), "Relaying host event");
            events.emit(&host_event.normalize());
        }));

        debug!("Local transport wired to host events");
        true
    }

    fn request(&self, capability: &Capability) -> bool {
        if *capability == Capability::END && self.host.has_end_encounter() {
            self.host.end_encounter();
            return true;
        }
        false
    }
}

// ============================================================================
// Tests
// ============================================================================
