//! Transport abstraction and its variants.
//!
//! Exactly one transport delivers telemetry per process. Both real variants
//! publish the same [`NormalizedEvent`] vocabulary through an owned
//! [`EventChannel`], so consumers never know which one is active.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   WebSocket    ┌──────────────────┐
//! │ RemoteTransport  │◄──────────────►│ Overlay endpoint │
//! │  driver task     │  ws://…/MiniParse                 │
//! └────────┬─────────┘                └──────────────────┘
//!          │ emit
//!          ▼
//!   EventChannel<NormalizedEvent>  ──►  consumers
//!          ▲
//!          │ emit
//! ┌────────┴─────────┐   HostApi      ┌──────────────────┐
//! │ LocalTransport   │◄───────────────│ Plugin host      │
//! └──────────────────┘                └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `capability` | Capability tags and sets |
//! | `local` | Host-injected event transport |
//! | `machine` | Remote connection state machine |
//! | `null` | Base transport with no backing connection |
//! | `options` | Remote transport options |
//! | `remote` | WebSocket transport with reconnection |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::event::{ChatMessage, EventChannel, EventTag, Listener, NormalizedEvent};
use crate::identifiers::ListenerId;

// ============================================================================
// Submodules
// ============================================================================

/// Capability tags and sets.
pub mod capability;

/// Host-injected event transport.
pub mod local;

/// Remote connection state machine.
pub mod machine;

/// Base transport with no backing connection.
pub mod null;

/// Remote transport options.
pub mod options;

/// WebSocket transport with reconnection.
pub mod remote;

// ============================================================================
// Re-exports
// ============================================================================

pub use capability::{Capability, CapabilitySet};
pub use local::{DetachedHost, HostApi, HostEvent, HostEventHandler, HostEventKind, LocalTransport};
pub use machine::{ConnectionMachine, ConnectionState, RetryBudget};
pub use null::NullTransport;
pub use options::RemoteOptions;
pub use remote::RemoteTransport;

// ============================================================================
// TransportKind
// ============================================================================

/// Which variant a transport is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// WebSocket to a remote endpoint.
    Remote,
    /// Events injected by the plugin host.
    Local,
    /// No backing connection.
    None,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::None => "none",
        })
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Contract shared by every transport variant.
///
/// None of these operations block or panic. Failure is reported as `false`.
pub trait Transport: Send + Sync {
    /// Returns the variant.
    fn kind(&self) -> TransportKind;

    /// Returns the capability set fixed at construction.
    fn capabilities(&self) -> &CapabilitySet;

    /// Returns the channel this transport publishes on.
    fn events(&self) -> &EventChannel<NormalizedEvent>;

    /// Establishes the backing connection.
    ///
    /// Idempotent. Returns `false` when there is nothing to connect to,
    /// otherwise starts connecting and returns `true` without waiting.
    fn connect(&self) -> bool;

    /// Performs a capability-gated action.
    ///
    /// Returns `true` if the action was dispatched, `false` if the capability
    /// is unsupported or the transport is not ready.
    fn request(&self, capability: &Capability) -> bool;

    /// Exact membership test against [`capabilities`](Self::capabilities).
    #[inline]
    fn supports(&self, capability: &Capability) -> bool {
        self.capabilities().contains(capability)
    }

    /// Registers a listener on [`events`](Self::events).
    fn subscribe(&self, tag: EventTag, listener: Listener<NormalizedEvent>) -> ListenerId {
        self.events().subscribe(tag, move |event| listener(event))
    }

    /// Removes a listener registered through [`events`](Self::events).
    #[inline]
    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events().unsubscribe(id)
    }

    /// Relays a message posted by the embedding window.
    ///
    /// Emitted as a `message` event of kind `window`, whatever the variant.
    /// Returns the number of listeners reached.
    fn post_window_message(&self, data: Value) -> usize {
        self.events()
            .emit(&NormalizedEvent::Message(ChatMessage::window(data)))
    }
}

// ============================================================================
// Tests
// ============================================================================
