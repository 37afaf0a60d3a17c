//! Outbound command strings.
//!
//! The remote endpoint takes plain text frames with no framing.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// RemoteCommand
// ============================================================================

/// A command frame sent to the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
    /// Heartbeat echo.
    Pong,
    /// End the current encounter.
    RequestEnd,
    /// Toggle screen capture.
    Capture,
}

impl RemoteCommand {
    /// Returns the wire text of the command.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pong => super::envelope::HEARTBEAT,
            Self::RequestEnd => "RequestEnd",
            Self::Capture => "Capture",
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_text() {
        assert_eq!(RemoteCommand::Pong.as_str(), ".");
        assert_eq!(RemoteCommand::RequestEnd.to_string(), "RequestEnd");
        assert_eq!(RemoteCommand::Capture.to_string(), "Capture");
    }
}
