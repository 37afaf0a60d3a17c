//! Type-safe identifiers.
//!
//! Newtype wrappers so listener handles cannot be confused with other
//! UUID-shaped values.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ListenerId
// ============================================================================

/// Handle returned by [`EventChannel::subscribe`](crate::EventChannel::subscribe).
///
/// Pass it back to `unsubscribe` to remove exactly that listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Generates a new random listener ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        let a = ListenerId::generate();
        let b = ListenerId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_matches_uuid() {
        let id = ListenerId::generate();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }
}
