//! Startup wiring: launch configuration and transport selection.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `launch` | `HOST_PORT` directive parsing |
//! | `selector` | Picks and connects the one transport |

// ============================================================================
// Submodules
// ============================================================================

/// `HOST_PORT` directive parsing.
pub mod launch;

/// Picks and connects the one transport.
pub mod selector;

// ============================================================================
// Re-exports
// ============================================================================

pub use launch::{HOST_PORT_KEY, LaunchContext, RemoteEndpoint};
pub use selector::{AppTransport, TransportSelector};
