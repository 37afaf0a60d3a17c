//! Transport used when no telemetry source is available.

// ============================================================================
// Imports
// ============================================================================

use crate::event::{EventChannel, NormalizedEvent};

use super::capability::{Capability, CapabilitySet};
use super::{Transport, TransportKind};

// ============================================================================
// NullTransport
// ============================================================================

/// A transport with no telemetry source and no capabilities.
///
/// Consumers still get a working event channel, so listeners can be
/// registered unconditionally. The only events published on it are window
/// messages relayed through [`Transport::post_window_message`].
#[derive(Debug, Default)]
pub struct NullTransport {
    capabilities: CapabilitySet,
    events: EventChannel<NormalizedEvent>,
}

impl NullTransport {
    /// Creates a null transport.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for NullTransport {
    #[inline]
    fn kind(&self) -> TransportKind {
        TransportKind::None
    }

    #[inline]
    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    #[inline]
    fn events(&self) -> &EventChannel<NormalizedEvent> {
        &self.events
    }

    #[inline]
    fn connect(&self) -> bool {
        true
    }

    #[inline]
    fn request(&self, _capability: &Capability) -> bool {
        false
    }
}

// ============================================================================
// Tests
// ============================================================================
