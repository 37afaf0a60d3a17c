//! Launch query parsing.
//!
//! The overlay is launched with a query string. A `HOST_PORT` directive in it
//! names the remote endpoint:
//!
//! ```text
//! ?HOST_PORT=ws://127.0.0.1:10501&other=1
//! ```
//!
//! The captured value stops at the first `&` or `/`. An empty host
//! (`ws://:10501`) means `localhost`, and the resource path is appended.
//!
//! # Example
//!
//! ```
//! use overlay_transport::{LaunchContext, RemoteOptions};
//!
//! let launch = LaunchContext::from_query("?HOST_PORT=ws://:10501");
//! let endpoint = launch.remote_endpoint(&RemoteOptions::default())?.unwrap();
//!
//! assert_eq!(endpoint.as_str(), "ws://localhost:10501/MiniParse");
//! # Ok::<(), overlay_transport::Error>(())
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::transport::RemoteOptions;

// ============================================================================
// Constants
// ============================================================================

/// Query key of the remote endpoint directive.
pub const HOST_PORT_KEY: &str = "HOST_PORT";

/// Host substituted when the directive leaves it empty.
const DEFAULT_HOST: &str = "localhost";

/// Scheme and authority of a directive value.
static DIRECTIVE_PATTERN: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(wss?)://([^&/]+)"));

// ============================================================================
// RemoteEndpoint
// ============================================================================

/// A normalized remote endpoint address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    url: Url,
}

impl RemoteEndpoint {
    /// Normalizes a directive value into an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the value is not
    /// `ws[s]://[host][:port]`, or if the result is not a valid URL.
    pub fn parse(directive: &str, resource_path: &str) -> Result<Self> {
        let pattern = DIRECTIVE_PATTERN
            .as_ref()
            .map_err(|e| Error::config(format!("Directive pattern failed to compile: {e}")))?;

        let captures = pattern.captures(directive).ok_or_else(|| {
            Error::invalid_address(directive, "expected ws://host:port or wss://host:port")
        })?;

        let scheme = &captures[1];
        let authority = &captures[2];
        let authority = if authority.starts_with(':') {
            format!("{DEFAULT_HOST}{authority}")
        } else {
            authority.to_string()
        };

        let raw = format!(
            "{scheme}://{authority}/{}",
            resource_path.trim_start_matches('/')
        );
        let url = Url::parse(&raw).map_err(|e| Error::invalid_address(directive, e.to_string()))?;

        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::invalid_address(directive, "missing host"));
        }

        Ok(Self { url })
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the endpoint as a string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Consumes the endpoint, returning its URL.
    #[inline]
    #[must_use]
    pub fn into_url(self) -> Url {
        self.url
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

// ============================================================================
// LaunchContext
// ============================================================================

/// Configuration captured from the launch query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
    host_port: Option<String>,
}

impl LaunchContext {
    /// A launch with no directives.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Launch context with the given directive value.
    #[inline]
    #[must_use]
    pub fn with_host_port(directive: impl Into<String>) -> Self {
        Self {
            host_port: Some(directive.into()),
        }
    }

    /// Parses a query string, with or without the leading `?`.
    ///
    /// The first `HOST_PORT` pair wins. Its value is percent-decoded; a
    /// value that does not decode is kept as-is.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);

        let host_port = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == HOST_PORT_KEY)
            .map(|(_, value)| match urlencoding::decode(value) {
                Ok(decoded) => decoded.into_owned(),
                Err(e) => {
                    warn!(value, error = %e, "HOST_PORT is not valid percent-encoding");
                    value.to_string()
                }
            });

        if let Some(directive) = &host_port {
            debug!(directive, "Found remote endpoint directive");
        }

        Self { host_port }
    }

    /// Parses the query component of a launch URL.
    #[inline]
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        url.query().map_or_else(Self::empty, Self::from_query)
    }

    /// Returns the raw directive value, if present.
    #[inline]
    #[must_use]
    pub fn host_port(&self) -> Option<&str> {
        self.host_port.as_deref()
    }

    /// Resolves the directive into an endpoint.
    ///
    /// Returns `Ok(None)` when there is no directive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the directive is present but
    /// malformed.
    pub fn remote_endpoint(&self, options: &RemoteOptions) -> Result<Option<RemoteEndpoint>> {
        self.host_port
            .as_deref()
            .map(|directive| RemoteEndpoint::parse(directive, &options.resource_path))
            .transpose()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(query: &str) -> Result<Option<String>> {
        let endpoint = LaunchContext::from_query(query).remote_endpoint(&RemoteOptions::default())?;
        Ok(endpoint.map(|endpoint| endpoint.to_string()))
    }

    #[test]
    fn test_empty_host_becomes_localhost() {
        assert_eq!(
            resolve("?HOST_PORT=ws://:10501").expect("parse"),
            Some("ws://localhost:10501/MiniParse".to_string())
        );
    }

    #[test]
    fn test_explicit_host() {
        assert_eq!(
            resolve("HOST_PORT=ws://127.0.0.1:10501").expect("parse"),
            Some("ws://127.0.0.1:10501/MiniParse".to_string())
        );
        assert_eq!(
            resolve("?a=1&HOST_PORT=wss://overlay.example:443&b=2").expect("parse"),
            Some("wss://overlay.example/MiniParse".to_string())
        );
    }

    #[test]
    fn test_value_stops_at_slash() {
        assert_eq!(
            resolve("?HOST_PORT=ws://10.0.0.2:10501/ignored").expect("parse"),
            Some("ws://10.0.0.2:10501/MiniParse".to_string())
        );
    }

    #[test]
    fn test_percent_encoded_value() {
        assert_eq!(
            resolve("?HOST_PORT=ws%3A%2F%2F%3A10501").expect("parse"),
            Some("ws://localhost:10501/MiniParse".to_string())
        );
    }

    #[test]
    fn test_absent_directive() {
        assert_eq!(resolve("").expect("parse"), None);
        assert_eq!(resolve("?OVERLAY_WS=ws://:1").expect("parse"), None);
        assert_eq!(LaunchContext::empty().host_port(), None);
    }

    #[test]
    fn test_first_directive_wins() {
        let launch = LaunchContext::from_query("HOST_PORT=ws://:1&HOST_PORT=ws://:2");
        assert_eq!(launch.host_port(), Some("ws://:1"));
    }

    #[test]
    fn test_malformed_directive() {
        let err = resolve("?HOST_PORT=http://localhost:10501").expect_err("bad scheme");
        assert!(matches!(err, Error::InvalidAddress { .. }));
        assert!(err.is_config_error());

        assert!(resolve("?HOST_PORT=ws://").is_err());
        assert!(resolve("?HOST_PORT=ws://:notaport").is_err());
    }

    #[test]
    fn test_custom_resource_path() {
        let options = RemoteOptions::new().with_resource_path("/Other");
        let endpoint = LaunchContext::with_host_port("ws://:10501")
            .remote_endpoint(&options)
            .expect("parse")
            .expect("present");
        assert_eq!(endpoint.as_str(), "ws://localhost:10501/Other");
    }

    #[test]
    fn test_from_url() {
        let url = Url::parse("file:///overlay/index.html?HOST_PORT=ws://:10501").expect("url");
        assert_eq!(LaunchContext::from_url(&url).host_port(), Some("ws://:10501"));

        let bare = Url::parse("file:///overlay/index.html").expect("url");
        assert_eq!(LaunchContext::from_url(&bare), LaunchContext::empty());
    }
}
