//! Event dispatch and the normalized event vocabulary.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Tag-keyed publish/subscribe primitive |
//! | `types` | [`NormalizedEvent`] and its payloads |

// ============================================================================
// Submodules
// ============================================================================

/// Tag-keyed publish/subscribe primitive.
pub mod channel;

/// Normalized event vocabulary.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{EventChannel, Listener, TaggedEvent};
pub use types::{
    ChatMessage, ClosedNotice, EventTag, LogLine, LogLineKind, MessageKind, NormalizedEvent,
};
