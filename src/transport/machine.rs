//! Remote connection state machine.
//!
//! [`ConnectionMachine`] holds the connection state and retry budget and
//! decides what happens on open, message, error and close. It performs no
//! I/O: the driver task in [`remote`](super::remote) owns the socket and the
//! timer and feeds socket events in.
//!
//! # States
//!
//! ```text
//!                 connect()            open
//! Disconnected ─────────────► Connecting ─────► Connected
//!                                 ▲                 │ close, budget left
//!                                 │ delay elapsed   ▼
//!                                 └──────── ReconnectScheduled
//!
//! close with budget already spent ──► Exhausted (terminal)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::error::Error;
use crate::event::{ClosedNotice, EventChannel, NormalizedEvent};
use crate::protocol::{Inbound, RemoteCommand, classify};

use super::options::RemoteOptions;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the remote connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    /// No connection and none in progress.
    Disconnected,
    /// Connection attempt in flight.
    Connecting,
    /// Socket open.
    Connected,
    /// Waiting out the reconnect delay.
    ReconnectScheduled,
    /// Retry budget spent; no further attempts.
    Exhausted,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::ReconnectScheduled => "reconnect-scheduled",
            Self::Exhausted => "exhausted",
        })
    }
}

// ============================================================================
// RetryBudget
// ============================================================================

/// Countdown of automatic reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u32,
    max: u32,
}

impl RetryBudget {
    /// Creates a full budget.
    #[inline]
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self {
            remaining: max,
            max,
        }
    }

    /// Attempts left.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Returns `true` when no attempts are left.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Restores the budget to its maximum.
    #[inline]
    pub fn reset(&mut self) {
        self.remaining = self.max;
    }

    /// Spends one attempt.
    ///
    /// Returns the attempts left afterwards, or `None` if already exhausted.
    #[inline]
    pub fn consume(&mut self) -> Option<u32> {
        self.remaining = self.remaining.checked_sub(1)?;
        Some(self.remaining)
    }
}

// ============================================================================
// CloseOutcome
// ============================================================================

/// What the driver should do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Wait, then connect again.
    Reconnect {
        /// Delay before the next attempt.
        after: Duration,
    },
    /// Stop; the budget is spent.
    Exhausted,
}

// ============================================================================
// ConnectionMachine
// ============================================================================

/// Connection state, retry budget and message dispatch for one remote
/// transport.
///
/// The machine is the only writer of its state. Observers get a
/// [`watch::Receiver`] from [`subscribe_state`](Self::subscribe_state).
pub struct ConnectionMachine {
    state: watch::Sender<ConnectionState>,
    budget: RetryBudget,
    /// Mirror of `budget.remaining` for readers outside the driver.
    retries: Arc<AtomicU32>,
    reconnect_delay: Duration,
    events: Arc<EventChannel<NormalizedEvent>>,
}

impl fmt::Debug for ConnectionMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMachine")
            .field("state", &self.state())
            .field("budget", &self.budget)
            .field("reconnect_delay", &self.reconnect_delay)
            .finish_non_exhaustive()
    }
}

impl ConnectionMachine {
    /// Creates a machine in the `Disconnected` state with a full budget.
    #[must_use]
    pub fn new(options: &RemoteOptions, events: Arc<EventChannel<NormalizedEvent>>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state,
            budget: RetryBudget::new(options.max_retries),
            retries: Arc::new(AtomicU32::new(options.max_retries)),
            reconnect_delay: options.reconnect_delay,
            events,
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes every state change.
    #[inline]
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Returns the retry attempts left.
    #[inline]
    #[must_use]
    pub fn retries_remaining(&self) -> u32 {
        self.budget.remaining()
    }

    /// Returns a shared view of the retry attempts left.
    #[inline]
    #[must_use]
    pub fn retries_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.retries)
    }

    /// A connection attempt is starting.
    pub fn begin_connect(&mut self) {
        self.set_state(ConnectionState::Connecting);
    }

    /// The socket opened.
    pub fn on_open(&mut self) {
        self.set_state(ConnectionState::Connected);
    }

    /// Handles one inbound text frame.
    ///
    /// Any frame restores the retry budget. Returns the reply to send, which
    /// is only ever the heartbeat echo and only while connected.
    pub fn on_message(&mut self, text: &str) -> Option<RemoteCommand> {
        self.budget.reset();
        self.publish_budget();

        match classify(text) {
            Ok(Inbound::Heartbeat) => {
                if self.state() == ConnectionState::Connected {
                    Some(RemoteCommand::Pong)
                } else {
                    trace!(state = %self.state(), "Heartbeat echo dropped, connection not ready");
                    None
                }
            }
            Ok(Inbound::Event(event)) => {
                trace!(tag = %event.tag(), "Dispatching remote event");
                self.events.emit(&event);
                None
            }
            Ok(Inbound::Ignored) => {
                trace!(len = text.len(), "Ignoring unknown envelope");
                None
            }
            Err(e) => {
                warn!(error = %e, payload = %text, "Discarding malformed payload");
                None
            }
        }
    }

    /// Records a socket fault. The driver closes the socket afterwards.
    pub fn on_error(&mut self, error: &Error) {
        error!(error = %error, state = %self.state(), "WebSocket error");
    }

    /// Handles a close with the given code.
    pub fn on_close(&mut self, code: u16) -> CloseOutcome {
        let consumed = self.budget.consume();
        self.publish_budget();

        let Some(remaining) = consumed else {
            info!(code, "Retry budget exhausted, giving up");
            self.set_state(ConnectionState::Exhausted);
            return CloseOutcome::Exhausted;
        };

        self.set_state(ConnectionState::ReconnectScheduled);
        self.events.emit(&NormalizedEvent::Closed(ClosedNotice {
            code,
            reconnecting: remaining,
        }));

        warn!(code, reconnecting = remaining, delay = ?self.reconnect_delay, "Connection closed, reconnecting");
        CloseOutcome::Reconnect {
            after: self.reconnect_delay,
        }
    }

    /// The driver gave up after exhaustion.
    ///
    /// Restores the budget so a later explicit connect starts fresh. The
    /// state stays `Exhausted` until then.
    pub fn rearm(&mut self) {
        self.budget.reset();
        self.publish_budget();
    }

    /// The driver stopped on request.
    pub fn on_shutdown(&mut self) {
        self.set_state(ConnectionState::Disconnected);
    }

    #[inline]
    fn publish_budget(&self) {
        self.retries.store(self.budget.remaining(), Ordering::Relaxed);
    }

    fn set_state(&mut self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Connection state changed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde_json::json;

    use crate::event::{ChatMessage, EventTag, MessageKind};

    struct Harness {
        machine: ConnectionMachine,
        seen: Arc<Mutex<Vec<NormalizedEvent>>>,
    }

    fn harness() -> Harness {
        let events = Arc::new(EventChannel::<NormalizedEvent>::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in [EventTag::Data, EventTag::Message, EventTag::LogLine, EventTag::Closed] {
            let sink = Arc::clone(&seen);
            events.subscribe(tag, move |event: &NormalizedEvent| sink.lock().push(event.clone()));
        }

        Harness {
            machine: ConnectionMachine::new(&RemoteOptions::default(), events),
            seen,
        }
    }

    fn connected() -> Harness {
        let mut h = harness();
        h.machine.begin_connect();
        h.machine.on_open();
        h
    }

    #[test]
    fn test_budget_consume() {
        let mut budget = RetryBudget::new(2);
        assert_eq!(budget.consume(), Some(1));
        assert_eq!(budget.consume(), Some(0));
        assert!(budget.is_exhausted());
        assert_eq!(budget.consume(), None);
        budget.reset();
        assert_eq!(budget.remaining(), 2);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut h = harness();
        assert_eq!(h.machine.state(), ConnectionState::Disconnected);
        h.machine.begin_connect();
        assert_eq!(h.machine.state(), ConnectionState::Connecting);
        h.machine.on_open();
        assert_eq!(h.machine.state(), ConnectionState::Connected);
        h.machine.on_shutdown();
        assert_eq!(h.machine.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_envelope_emits_single_message() {
        let mut h = connected();
        assert_eq!(h.machine.on_message(r#"{"type":"send","from":"A","msg":"hi"}"#), None);

        assert_eq!(
            *h.seen.lock(),
            vec![NormalizedEvent::Message(ChatMessage::new(
                MessageKind::Single,
                Some("A".into()),
                json!("hi"),
            ))]
        );
    }

    #[test]
    fn test_heartbeat_echoed_when_connected() {
        let mut h = connected();
        assert_eq!(h.machine.on_message("."), Some(RemoteCommand::Pong));
        assert!(h.seen.lock().is_empty());
    }

    #[test]
    fn test_heartbeat_dropped_when_not_ready() {
        let mut h = harness();
        h.machine.begin_connect();
        assert_eq!(h.machine.on_message("."), None);
        assert!(h.seen.lock().is_empty());
    }

    #[test]
    fn test_malformed_payload_changes_nothing() {
        let mut h = connected();
        assert_eq!(h.machine.on_message("{oops"), None);
        assert!(h.seen.lock().is_empty());
        assert_eq!(h.machine.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_close_emits_decremented_budget() {
        let mut h = connected();
        let outcome = h.machine.on_close(1006);

        assert_eq!(
            outcome,
            CloseOutcome::Reconnect {
                after: Duration::from_millis(2000)
            }
        );
        assert_eq!(h.machine.state(), ConnectionState::ReconnectScheduled);
        assert_eq!(
            *h.seen.lock(),
            vec![NormalizedEvent::Closed(ClosedNotice {
                code: 1006,
                reconnecting: 4
            })]
        );
    }

    #[test]
    fn test_sixth_close_exhausts_silently() {
        let mut h = connected();
        for _ in 0..5 {
            h.machine.begin_connect();
            assert!(matches!(h.machine.on_close(1006), CloseOutcome::Reconnect { .. }));
        }

        let counts: Vec<u32> = h
            .seen
            .lock()
            .iter()
            .filter_map(|e| e.as_closed().map(|n| n.reconnecting))
            .collect();
        assert_eq!(counts, vec![4, 3, 2, 1, 0]);

        assert_eq!(h.machine.on_close(1006), CloseOutcome::Exhausted);
        assert_eq!(h.machine.state(), ConnectionState::Exhausted);
        assert_eq!(h.seen.lock().len(), 5);
    }

    #[test]
    fn test_any_message_resets_budget() {
        let mut h = connected();
        h.machine.on_close(1006);
        h.machine.on_close(1006);
        assert_eq!(h.machine.retries_remaining(), 3);

        h.machine.on_open();
        h.machine.on_message(".");
        assert_eq!(h.machine.retries_remaining(), 5);

        h.machine.on_close(1000);
        h.machine.on_message("not json");
        assert_eq!(h.machine.retries_remaining(), 5);
    }

    #[test]
    fn test_rearm_after_exhaustion() {
        let mut h = connected();
        for _ in 0..6 {
            h.machine.on_close(1006);
        }
        assert_eq!(h.machine.state(), ConnectionState::Exhausted);

        h.machine.rearm();
        assert_eq!(h.machine.state(), ConnectionState::Exhausted);
        assert_eq!(h.machine.retries_remaining(), 5);

        h.machine.begin_connect();
        assert_eq!(h.machine.state(), ConnectionState::Connecting);
        assert!(matches!(h.machine.on_close(1006), CloseOutcome::Reconnect { .. }));
        assert_eq!(h.seen.lock().last().and_then(|e| e.as_closed()).map(|n| n.reconnecting), Some(4));
    }

    #[test]
    fn test_retries_handle_mirrors_budget() {
        let mut h = connected();
        let retries = h.machine.retries_handle();
        h.machine.on_close(1006);
        assert_eq!(retries.load(Ordering::Relaxed), 4);
        h.machine.on_message(".");
        assert_eq!(retries.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_state_watch_observes_changes() {
        let mut h = harness();
        let rx = h.machine.subscribe_state();
        h.machine.begin_connect();
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::ReconnectScheduled.to_string(), "reconnect-scheduled");
        assert_eq!(
            serde_json::to_value(ConnectionState::ReconnectScheduled).expect("serialize"),
            json!("reconnect-scheduled")
        );
    }
}
