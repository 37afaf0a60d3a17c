//! Startup transport selection.
//!
//! Exactly one transport is chosen per process:
//!
//! | Launch | Host injected | Transport |
//! |--------|---------------|-----------|
//! | `HOST_PORT` directive | any | [`RemoteTransport`] |
//! | no directive | yes | [`LocalTransport`] |
//! | no directive | no | [`NullTransport`] |
//!
//! A directive that does not parse is logged and treated as absent.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::{info, warn};

use crate::transport::{
    HostApi, LocalTransport, NullTransport, RemoteOptions, RemoteTransport, Transport,
};

use super::launch::LaunchContext;

// ============================================================================
// AppTransport
// ============================================================================

/// Handle to the process-wide transport, passed to consumers explicitly.
///
/// Cloning is cheap; every clone refers to the same transport.
#[derive(Clone)]
pub struct AppTransport {
    inner: Arc<dyn Transport>,
    remote: Option<Arc<RemoteTransport>>,
}

impl AppTransport {
    /// Wraps an arbitrary transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: transport,
            remote: None,
        }
    }

    fn from_remote(remote: Arc<RemoteTransport>) -> Self {
        Self {
            inner: Arc::clone(&remote) as Arc<dyn Transport>,
            remote: Some(remote),
        }
    }

    /// Returns the shared transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner
    }

    /// Returns the concrete remote transport, for state observation and
    /// shutdown.
    #[inline]
    #[must_use]
    pub fn remote(&self) -> Option<&RemoteTransport> {
        self.remote.as_deref()
    }
}

impl Deref for AppTransport {
    type Target = dyn Transport;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl fmt::Debug for AppTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppTransport")
            .field("kind", &self.inner.kind())
            .field("capabilities", &self.inner.capabilities().to_sorted_vec())
            .finish()
    }
}

// ============================================================================
// TransportSelector
// ============================================================================

/// Chooses and connects the transport at startup.
///
/// # Example
///
/// ```
/// use overlay_transport::{LaunchContext, TransportKind, TransportSelector};
///
/// let transport = TransportSelector::new(LaunchContext::empty()).select();
/// assert_eq!(transport.kind(), TransportKind::None);
/// ```
#[derive(Clone)]
pub struct TransportSelector {
    launch: LaunchContext,
    host: Option<Arc<dyn HostApi>>,
    options: RemoteOptions,
}

impl fmt::Debug for TransportSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSelector")
            .field("launch", &self.launch)
            .field("host", &self.host.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl TransportSelector {
    /// Creates a selector over a launch context.
    #[must_use]
    pub fn new(launch: LaunchContext) -> Self {
        Self {
            launch,
            host: None,
            options: RemoteOptions::default(),
        }
    }

    /// Sets the host API injected by the plugin host.
    #[must_use]
    pub fn with_host(mut self, host: Arc<dyn HostApi>) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the options used if a remote transport is chosen.
    #[must_use]
    pub fn with_remote_options(mut self, options: RemoteOptions) -> Self {
        self.options = options;
        self
    }

    /// Constructs the chosen transport without connecting it.
    #[must_use]
    pub fn build(self) -> AppTransport {
        let options = match self.options.validate() {
            Ok(()) => self.options,
            Err(e) => {
                warn!(error = %e, "Invalid remote options, using defaults");
                RemoteOptions::default()
            }
        };

        let endpoint = match self.launch.remote_endpoint(&options) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(error = %e, "Ignoring remote endpoint directive");
                None
            }
        };

        if let Some(endpoint) = endpoint {
            info!(url = %endpoint, "Selected remote transport");
            let remote = RemoteTransport::new(Some(endpoint.into_url()), options);
            return AppTransport::from_remote(Arc::new(remote));
        }

        match self.host {
            Some(host) => {
                info!("Selected local transport");
                AppTransport::new(Arc::new(LocalTransport::new(host)))
            }
            None => {
                info!("No telemetry source, selected null transport");
                AppTransport::new(Arc::new(NullTransport::new()))
            }
        }
    }

    /// Constructs the chosen transport and connects it.
    ///
    /// A remote transport needs a tokio runtime to connect. Outside one it is
    /// returned unconnected and the failure is logged.
    #[must_use]
    pub fn select(self) -> AppTransport {
        let transport = self.build();
        if !transport.connect() {
            warn!(kind = %transport.kind(), "Selected transport did not connect");
        }
        transport
    }
}

// ============================================================================
// Tests
// ============================================================================
