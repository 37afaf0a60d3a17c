//! Remote wire protocol.
//!
//! | Direction | Shape |
//! |-----------|-------|
//! | Remote → Local | heartbeat `.` or JSON envelope |
//! | Local → Remote | plain command text (`.`, `RequestEnd`, `Capture`) |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound command strings |
//! | `envelope` | Inbound frame classification |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound command strings.
pub mod command;

/// Inbound frame classification.
pub mod envelope;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::RemoteCommand;
pub use envelope::{HEARTBEAT, Inbound, TELEMETRY_KIND, classify};
