//! Remote transport options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use overlay_transport::RemoteOptions;
//!
//! let options = RemoteOptions::new()
//!     .with_reconnect_delay(Duration::from_millis(500))
//!     .with_max_retries(10);
//!
//! assert_eq!(options.max_retries, 10);
//! assert_eq!(options.resource_path, "MiniParse");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Delay between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Consecutive closes tolerated without an intervening message.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Resource path appended to the endpoint address.
pub const DEFAULT_RESOURCE_PATH: &str = "MiniParse";

// ============================================================================
// RemoteOptions
// ============================================================================

/// Tuning for [`RemoteTransport`](super::RemoteTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOptions {
    /// Delay before each reconnection attempt.
    pub reconnect_delay: Duration,

    /// Retry budget, restored on every received message.
    pub max_retries: u32,

    /// Path segment appended to the endpoint, without leading slash.
    pub resource_path: String,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            resource_path: DEFAULT_RESOURCE_PATH.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl RemoteOptions {
    /// Creates options with the defaults (2000 ms, 5 retries, `MiniParse`).
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the retry budget.
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the resource path. A leading `/` is stripped.
    #[inline]
    #[must_use]
    pub fn with_resource_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.resource_path = path.trim_start_matches('/').to_string();
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl RemoteOptions {
    /// Checks that the resource path can be appended to an address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path contains a query, fragment or
    /// whitespace.
    pub fn validate(&self) -> Result<()> {
        if let Some(bad) = self
            .resource_path
            .chars()
            .find(|c| matches!(c, '?' | '#') || c.is_whitespace())
        {
            return Err(Error::config(format!(
                "Resource path '{}' contains '{}'. Use a plain path such as \"MiniParse\".",
                self.resource_path,
                bad.escape_default()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
