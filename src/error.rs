//! Error types for the overlay transport.
//!
//! Most transport operations are infallible by contract (`connect` and
//! `request` report failure as `false`). This type covers the fallible
//! edges: endpoint parsing, socket faults and payload decoding. Socket and
//! payload errors are logged by the connection driver and never reach
//! consumers directly.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidAddress`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when transport options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Remote endpoint address could not be resolved.
    ///
    /// Returned when a `HOST_PORT` directive is present but malformed.
    #[error("Invalid remote address '{address}': {reason}")]
    InvalidAddress {
        /// The address as found in the launch context.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Socket ended without a close handshake.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid address error.
    #[inline]
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the transport keeps running after this error.
    ///
    /// Payload errors leave the connection open and connection errors go
    /// through the reconnect path. Configuration errors never recover.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_connection_error() || matches!(self, Self::Json(_))
    }

    /// Returns `true` if this is a configuration error.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::InvalidAddress { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_invalid_address_display() {
        let err = Error::invalid_address("ws://", "missing host");
        assert_eq!(
            err.to_string(),
            "Invalid remote address 'ws://': missing host"
        );
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("x").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("x").is_connection_error());
    }

    #[test]
    fn test_is_config_error() {
        assert!(Error::config("x").is_config_error());
        assert!(Error::invalid_address("a", "b").is_config_error());
        assert!(!Error::ConnectionClosed.is_config_error());
        assert!(!Error::invalid_address("a", "b").is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_payload_errors_are_recoverable() {
        let json_err = serde_json::from_str::<serde_json::Value>("").unwrap_err();
        assert!(Error::from(json_err).is_recoverable());
        assert!(Error::ConnectionClosed.is_recoverable());
    }
}
