//! Overlay Transport - telemetry delivery for overlay front-ends.
//!
//! An overlay consumes combat telemetry, chat-style messages and log lines
//! from one of two sources, and should not care which:
//!
//! - **Remote**: a WebSocket to the overlay endpoint, with heartbeat echo and
//!   bounded automatic reconnection
//! - **Local**: events injected by the plugin host the overlay runs inside
//!
//! Both publish the same [`NormalizedEvent`] vocabulary (`data`, `message`,
//! `logline`, `closed`) through an [`EventChannel`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use overlay_transport::{
//!     Capability, EventTag, LaunchContext, NormalizedEvent, TransportSelector,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     // ?HOST_PORT=ws://:10501 selects ws://localhost:10501/MiniParse
//!     let launch = LaunchContext::from_query("?HOST_PORT=ws://:10501");
//!     let transport = TransportSelector::new(launch).select();
//!
//!     transport.subscribe(
//!         EventTag::Data,
//!         Arc::new(|event: &NormalizedEvent| println!("{event:?}")),
//!     );
//!
//!     if transport.supports(&Capability::END) {
//!         transport.request(&Capability::END);
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bootstrap`] | Launch parsing and transport selection |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`event`] | [`EventChannel`] and the normalized vocabulary |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Remote wire protocol |
//! | [`transport`] | [`Transport`] trait and its variants |

// ============================================================================
// Modules
// ============================================================================

/// Launch parsing and transport selection.
///
/// Use [`TransportSelector`] once at startup.
pub mod bootstrap;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Event dispatch and the normalized event vocabulary.
pub mod event;

/// Type-safe identifiers.
pub mod identifiers;

/// Remote wire protocol.
///
/// Inbound envelope classification and outbound command strings.
pub mod protocol;

/// Transport abstraction and its variants.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bootstrap types
pub use bootstrap::{AppTransport, LaunchContext, RemoteEndpoint, TransportSelector};

// Error types
pub use error::{Error, Result};

// Event types
pub use event::{
    ChatMessage, ClosedNotice, EventChannel, EventTag, LogLine, LogLineKind, MessageKind,
    NormalizedEvent,
};

// Identifier types
pub use identifiers::ListenerId;

// Transport types
pub use transport::{
    Capability, CapabilitySet, ConnectionState, DetachedHost, HostApi, HostEvent, HostEventKind,
    LocalTransport, NullTransport, RemoteOptions, RemoteTransport, Transport, TransportKind,
};
