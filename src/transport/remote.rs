//! WebSocket transport with bounded automatic reconnection.
//!
//! # Driver Task
//!
//! [`RemoteTransport::connect`] spawns one tokio task that owns the socket,
//! the [`ConnectionMachine`] and the reconnect timer. It loops over:
//!
//! 1. connect to the endpoint (a failed attempt counts as close `1006`)
//! 2. relay frames until the socket closes or errors
//! 3. ask the machine whether to retry, and wait out the delay
//!
//! When the budget is spent the task hands the machine back with a fresh
//! budget, so a later explicit [`connect`](Transport::connect) starts a new
//! driver.
//!
//! Commands from [`Transport::request`] reach the task over an unbounded
//! channel, so callers never block. `true` from `request` means the command
//! was queued on the open socket. A command still queued when that socket
//! closes is dropped and logged at `warn`; it is not replayed on the next
//! connection.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::event::{EventChannel, NormalizedEvent};
use crate::protocol::RemoteCommand;

use super::capability::{Capability, CapabilitySet};
use super::machine::{CloseOutcome, ConnectionMachine, ConnectionState};
use super::options::RemoteOptions;
use super::{Transport, TransportKind};

// ============================================================================
// Constants
// ============================================================================

/// Close code for a connection lost without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code for a close frame that carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Sender half of the command queue, present only while the socket is open.
type Outbound = Arc<Mutex<Option<mpsc::UnboundedSender<RemoteCommand>>>>;

/// Machine parked between drivers.
type MachineSlot = Arc<Mutex<Option<ConnectionMachine>>>;

// ============================================================================
// RemoteTransport
// ============================================================================

/// Transport backed by a WebSocket to the overlay endpoint.
///
/// Declares `{end, capture}` regardless of what the endpoint supports.
///
/// # Example
///
/// ```no_run
/// use overlay_transport::{Capability, RemoteOptions, RemoteTransport, Transport};
/// use url::Url;
///
/// # async fn example() -> Result<(), url::ParseError> {
/// let url = Url::parse("ws://localhost:10501/MiniParse")?;
/// let transport = RemoteTransport::new(Some(url), RemoteOptions::default());
///
/// assert!(transport.connect());
/// transport.request(&Capability::END);
/// # Ok(())
/// # }
/// ```
pub struct RemoteTransport {
    /// Resolved endpoint, if the launch context named one.
    endpoint: Option<Url>,
    /// Static capability set.
    capabilities: CapabilitySet,
    /// Event channel (shared with the driver).
    events: Arc<EventChannel<NormalizedEvent>>,
    /// State machine, held by the driver while one runs.
    machine: MachineSlot,
    /// Read side of the machine's state.
    state_rx: watch::Receiver<ConnectionState>,
    /// Read side of the machine's retry budget.
    retries: Arc<AtomicU32>,
    /// Command queue into the open socket.
    outbound: Outbound,
    /// Stop signal for the driver.
    shutdown_tx: watch::Sender<bool>,
}

impl fmt::Debug for RemoteTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTransport")
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RemoteTransport - Constructor
// ============================================================================

impl RemoteTransport {
    /// Creates a disconnected transport.
    ///
    /// With `endpoint = None` the transport exists but [`connect`](Transport::connect)
    /// returns `false`.
    #[must_use]
    pub fn new(endpoint: Option<Url>, options: RemoteOptions) -> Self {
        let events = Arc::new(EventChannel::new());
        let machine = ConnectionMachine::new(&options, Arc::clone(&events));
        let state_rx = machine.subscribe_state();
        let retries = machine.retries_handle();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            endpoint,
            capabilities: [Capability::END, Capability::CAPTURE].into_iter().collect(),
            events,
            machine: Arc::new(Mutex::new(Some(machine))),
            state_rx,
            retries,
            outbound: Arc::new(Mutex::new(None)),
            shutdown_tx,
        }
    }
}

// ============================================================================
// RemoteTransport - Accessors
// ============================================================================

impl RemoteTransport {
    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Returns a receiver observing connection state changes.
    #[inline]
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Returns the automatic reconnection attempts left.
    #[inline]
    #[must_use]
    pub fn retries_remaining(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Stops the driver.
    ///
    /// Closes an open socket gracefully, cancels a pending reconnect, and
    /// leaves the state `Disconnected`. Final: later `connect` calls return
    /// `false`.
    pub fn shutdown(&self) {
        if !self.shutdown_tx.send_replace(true) {
            debug!("Remote transport shutting down");
        }
    }

    /// Queues a command if the socket is open.
    fn send(&self, command: RemoteCommand) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }

        self.outbound
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok())
    }
}

// ============================================================================
// RemoteTransport - Transport
// ============================================================================

impl Transport for RemoteTransport {
    #[inline]
    fn kind(&self) -> TransportKind {
        TransportKind::Remote
    }

    #[inline]
    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    #[inline]
    fn events(&self) -> &EventChannel<NormalizedEvent> {
        &self.events
    }

    fn connect(&self) -> bool {
        let Some(endpoint) = self.endpoint.clone() else {
            debug!("No remote endpoint configured");
            return false;
        };

        if *self.shutdown_tx.borrow() {
            return false;
        }

        let mut slot = self.machine.lock();
        let Some(mut machine) = slot.take() else {
            // Driver already running.
            return true;
        };

        let Ok(runtime) = Handle::try_current() else {
            let e = Error::connection("connect() called outside a tokio runtime");
            error!(url = %endpoint, error = %e, "Remote transport not started");
            *slot = Some(machine);
            return false;
        };

        machine.begin_connect();
        info!(url = %endpoint, "Remote transport connecting");

        let driver = Driver {
            endpoint,
            machine,
            slot: Arc::clone(&self.machine),
            outbound: Arc::clone(&self.outbound),
            shutdown_rx: self.shutdown_tx.subscribe(),
        };
        runtime.spawn(driver.run());

        true
    }

    fn request(&self, capability: &Capability) -> bool {
        let command = if *capability == Capability::END {
            RemoteCommand::RequestEnd
        } else if *capability == Capability::CAPTURE {
            RemoteCommand::Capture
        } else {
            return false;
        };

        self.send(command)
    }
}

// ============================================================================
// Driver
// ============================================================================

/// How a socket session ended.
enum SessionEnd {
    /// Socket closed with this code.
    Closed(u16),
    /// Shutdown requested.
    Shutdown,
}

/// One step of the session loop.
enum Step {
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
    Send(RemoteCommand),
    Shutdown,
}

/// Connection driver. Sole owner of the socket and the machine.
struct Driver {
    endpoint: Url,
    machine: ConnectionMachine,
    slot: MachineSlot,
    outbound: Outbound,
    shutdown_rx: watch::Receiver<bool>,
}

impl Driver {
    /// Connect, relay, retry until exhausted or shut down.
    async fn run(mut self) {
        loop {
            let attempt = tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => None,
                result = connect_async(self.endpoint.as_str()) => Some(result),
            };
            let Some(attempt) = attempt else {
                break;
            };

            let code = match attempt {
                Ok((ws_stream, _response)) => match self.run_session(ws_stream).await {
                    SessionEnd::Closed(code) => code,
                    SessionEnd::Shutdown => break,
                },
                Err(e) => {
                    self.machine.on_error(&Error::from(e));
                    CLOSE_ABNORMAL
                }
            };

            let delay = match self.machine.on_close(code) {
                CloseOutcome::Reconnect { after } => after,
                CloseOutcome::Exhausted => {
                    debug!(url = %self.endpoint, "Remote driver exhausted");
                    self.park();
                    return;
                }
            };

            let cancelled = tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => true,
                () = sleep(delay) => false,
            };
            if cancelled {
                break;
            }

            self.machine.begin_connect();
        }

        self.machine.on_shutdown();
        debug!(url = %self.endpoint, "Remote driver stopped");
    }

    /// Returns the machine to the transport with a fresh budget.
    fn park(mut self) {
        self.machine.rearm();
        *self.slot.lock() = Some(self.machine);
    }

    /// Relays frames for one open socket.
    async fn run_session(&mut self, ws_stream: WsStream) -> SessionEnd {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        *self.outbound.lock() = Some(command_tx);
        self.machine.on_open();
        info!(url = %self.endpoint, "Remote transport connected");

        let (mut ws_write, mut ws_read) = ws_stream.split();

        let end = loop {
            let step = tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => Step::Shutdown,
                frame = ws_read.next() => Step::Frame(frame),
                Some(command) = command_rx.recv() => Step::Send(command),
            };

            match step {
                Step::Frame(Some(Ok(Message::Text(text)))) => {
                    if let Some(reply) = self.machine.on_message(text.as_str())
                        && let Err(e) = ws_write.send(Message::Text(reply.to_string().into())).await
                    {
                        trace!(error = %e, "Heartbeat echo dropped");
                    }
                }

                Step::Frame(Some(Ok(Message::Close(frame)))) => {
                    let code = frame.map_or(CLOSE_NO_STATUS, |f| u16::from(f.code));
                    debug!(code, "WebSocket closed by remote");
                    let _ = ws_write.close().await;
                    break SessionEnd::Closed(code);
                }

                Step::Frame(Some(Ok(Message::Binary(data)))) => {
                    trace!(len = data.len(), "Ignoring binary frame");
                }

                // Ping/Pong are answered by tungstenite
                Step::Frame(Some(Ok(_))) => {}

                Step::Frame(Some(Err(e))) => {
                    self.machine.on_error(&Error::from(e));
                    let _ = ws_write.close().await;
                    break SessionEnd::Closed(CLOSE_ABNORMAL);
                }

                Step::Frame(None) => {
                    self.machine.on_error(&Error::ConnectionClosed);
                    break SessionEnd::Closed(CLOSE_ABNORMAL);
                }

                Step::Send(command) => {
                    match ws_write.send(Message::Text(command.to_string().into())).await {
                        Ok(()) => trace!(%command, "Command sent"),
                        Err(e) => warn!(%command, error = %e, "Failed to send command"),
                    }
                }

                Step::Shutdown => {
                    let _ = ws_write.close().await;
                    break SessionEnd::Shutdown;
                }
            }
        };

        self.outbound.lock().take();
        for command in drain_pending(&mut command_rx) {
            warn!(%command, "Command dropped, connection closed before it was sent");
        }
        end
    }
}

/// Closes the command queue and returns what never reached the socket.
fn drain_pending(command_rx: &mut mpsc::UnboundedReceiver<RemoteCommand>) -> Vec<RemoteCommand> {
    command_rx.close();
    let mut pending = Vec::new();
    while let Ok(command) = command_rx.try_recv() {
        pending.push(command);
    }
    pending
}

// ============================================================================
// Tests
// ============================================================================
