//! Capability tags.
//!
//! A capability names an optional, side-effecting feature. Consumers test
//! with [`Transport::supports`](super::Transport::supports) and invoke with
//! [`Transport::request`](super::Transport::request).

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::fmt;

use rustc_hash::FxHashSet;

// ============================================================================
// Capability
// ============================================================================

/// An opaque feature tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    /// End the current encounter.
    pub const END: Self = Self(Cow::Borrowed("end"));

    /// Toggle capture.
    pub const CAPTURE: Self = Self(Cow::Borrowed("capture"));

    /// Creates a capability from any tag.
    #[inline]
    #[must_use]
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Capability {
    fn from(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }
}

// ============================================================================
// CapabilitySet
// ============================================================================

/// The fixed set of capabilities a transport declares at construction.
///
/// There is no mutating API; a set never changes once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(FxHashSet<Capability>);

impl CapabilitySet {
    /// Creates an empty set.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Exact membership test.
    #[inline]
    #[must_use]
    pub fn contains(&self, capability: &Capability) -> bool {
        self.0.contains(capability)
    }

    /// Returns the number of capabilities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no capabilities are declared.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the capabilities in tag order.
    #[must_use]
    pub fn to_sorted_vec(&self) -> Vec<Capability> {
        let mut tags: Vec<_> = self.0.iter().cloned().collect();
        tags.sort();
        tags
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
