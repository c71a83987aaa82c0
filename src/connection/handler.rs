//! RCON Connection
//!
//! This module implements one authenticated RCON session over TCP. A
//! connection owns its socket, a background reader task, and a table of
//! in-flight requests waiting for their responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. TCP connect (bounded by the connect timeout)
//!        │
//!        ▼
//! 2. Send auth packet ──> Authenticating
//!        │
//!        ├── reply id == -1 ──> Errored (AuthenticationFailed)
//!        │
//!        ▼
//! 3. Ready
//!    ┌──────────────────────────────┐
//!    │  execute(command)            │
//!    │   - allocate request id      │
//!    │   - register completion      │
//!    │   - write packet             │
//!    │   - await matching response  │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Socket EOF / error / close() ──> Closed or Errored
//!    (every pending request is rejected with ConnectionClosed)
//! ```
//!
//! ## Response Correlation
//!
//! The reader task accumulates bytes in a `BytesMut` buffer, decodes every
//! complete frame, and completes the `oneshot` registered under the frame's
//! request id. Responses for ids nobody is waiting on (for example a reply
//! that arrives after its command timed out) are dropped.

use crate::config::PoolConfig;
use crate::error::{RconError, RconResult};
use crate::protocol::{packet_type, Packet, PacketDecoder, AUTH_FAILURE_ID, MAX_COMMAND_LENGTH};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

/// Handshake phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP connect in progress
    Connecting,
    /// Auth packet sent, waiting for the verdict
    Authenticating,
    /// Logged in and accepting commands
    Ready,
    /// Closed locally or by the server
    Closed,
    /// Failed (bad password, I/O error, malformed frame)
    Errored,
}

impl ConnectionState {
    fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Errored)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Ready => "ready",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Traffic statistics shared by every connection of a pool
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of sessions opened
    pub connections_opened: AtomicU64,
    /// Sessions currently alive
    pub active_connections: AtomicU64,
    /// Logins rejected by a server
    pub auth_failures: AtomicU64,
    /// Commands written to a socket
    pub commands_sent: AtomicU64,
    /// Commands that got no response in time
    pub commands_timed_out: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn auth_failed(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_sent(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_timed_out(&self) {
        self.commands_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Completion handle for one in-flight request.
type Completion = oneshot::Sender<RconResult<Packet>>;

struct Inner {
    state: ConnectionState,
    /// Next request id to hand out
    next_request_id: i32,
    /// In-flight requests keyed by request id
    pending: HashMap<i32, Completion>,
}

/// State shared between a connection and its reader task.
pub(crate) struct Shared {
    server: String,
    inner: Mutex<Inner>,
    stats: Arc<ConnectionStats>,
}

impl Shared {
    pub(crate) fn new(server: String, stats: Arc<ConnectionStats>) -> Self {
        Self {
            server,
            inner: Mutex::new(Inner {
                state: ConnectionState::Connecting,
                next_request_id: 1,
                pending: HashMap::new(),
            }),
            stats,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    fn set_state(&self, state: ConnectionState) {
        let mut inner = self.inner.lock();
        if !inner.state.is_terminal() {
            inner.state = state;
        }
    }

    /// Allocates a request id and registers a completion for it.
    ///
    /// Fails with `ConnectionClosed` unless the connection is in `expected`.
    pub(crate) fn register(
        &self,
        expected: ConnectionState,
    ) -> RconResult<(i32, oneshot::Receiver<RconResult<Packet>>)> {
        let mut inner = self.inner.lock();
        if inner.state != expected {
            return Err(self.closed());
        }

        // Ids wrap to 1 before overflowing; 0 and negatives are never issued,
        // so the auth failure sentinel can't collide with a real request.
        let mut request_id = inner.next_request_id;
        while inner.pending.contains_key(&request_id) {
            request_id = next_id(request_id);
        }
        inner.next_request_id = next_id(request_id);

        let (tx, rx) = oneshot::channel();
        inner.pending.insert(request_id, tx);
        Ok((request_id, rx))
    }

    /// Removes a pending request without completing it.
    pub(crate) fn forget(&self, request_id: i32) -> bool {
        self.inner.lock().pending.remove(&request_id).is_some()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Routes a decoded packet to whoever is waiting for it.
    pub(crate) fn dispatch(&self, packet: Packet) {
        let mut inner = self.inner.lock();
        match inner.state {
            ConnectionState::Authenticating => {
                // Some servers send an empty RESPONSE_VALUE before the verdict
                if packet.packet_type != packet_type::AUTH_RESPONSE {
                    trace!(server = %self.server, %packet, "Ignoring packet during login");
                    return;
                }

                if packet.request_id == AUTH_FAILURE_ID {
                    inner.state = ConnectionState::Errored;
                    let pending = std::mem::take(&mut inner.pending);
                    drop(inner);

                    warn!(server = %self.server, "RCON login rejected");
                    for (_, tx) in pending {
                        let _ = tx.send(Err(RconError::AuthenticationFailed {
                            server: self.server.clone(),
                        }));
                    }
                    return;
                }

                inner.state = ConnectionState::Ready;
                if let Some(tx) = inner.pending.remove(&packet.request_id) {
                    let _ = tx.send(Ok(packet));
                }
            }
            ConnectionState::Ready => match inner.pending.remove(&packet.request_id) {
                Some(tx) => {
                    let _ = tx.send(Ok(packet));
                }
                None => {
                    debug!(
                        server = %self.server,
                        request_id = packet.request_id,
                        "Discarding response for unknown request"
                    );
                }
            },
            state => {
                trace!(server = %self.server, %state, %packet, "Dropping packet");
            }
        }
    }

    /// Moves to a terminal state and rejects every pending request.
    pub(crate) fn fail_all(&self, state: ConnectionState) {
        let pending = {
            let mut inner = self.inner.lock();
            if !inner.state.is_terminal() {
                inner.state = state;
            }
            std::mem::take(&mut inner.pending)
        };

        if !pending.is_empty() {
            debug!(
                server = %self.server,
                pending = pending.len(),
                "Rejecting pending requests"
            );
        }
        for (_, tx) in pending {
            let _ = tx.send(Err(self.closed()));
        }
    }

    fn closed(&self) -> RconError {
        RconError::ConnectionClosed {
            server: self.server.clone(),
        }
    }
}

fn next_id(id: i32) -> i32 {
    if id >= i32::MAX {
        1
    } else {
        id + 1
    }
}

/// Reads frames until the stream ends, dispatching each to `shared`.
pub(crate) async fn read_loop<R>(mut reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = PacketDecoder::new();

    let outcome = 'read: loop {
        match reader.read_buf(decoder.buffer_mut()).await {
            Ok(0) => {
                debug!(server = %shared.server, "Server closed the connection");
                break ConnectionState::Closed;
            }
            Ok(n) => {
                shared.stats.bytes_read(n);
                trace!(server = %shared.server, bytes = n, "Read data");
            }
            Err(e) => {
                debug!(server = %shared.server, error = %e, "Read failed");
                break ConnectionState::Errored;
            }
        }

        loop {
            match decoder.next_packet() {
                Ok(Some(packet)) => shared.dispatch(packet),
                Ok(None) => break,
                Err(e) => {
                    warn!(server = %shared.server, error = %e, "Malformed packet");
                    break 'read ConnectionState::Errored;
                }
            }
        }
    };

    shared.fail_all(outcome);
}

/// Owns a registered request id until its response arrives.
///
/// Dropped early (timeout, error or a cancelled caller) it removes the id
/// from the pending table.
struct PendingRequest<'a> {
    shared: &'a Shared,
    request_id: i32,
    armed: bool,
}

impl<'a> PendingRequest<'a> {
    fn new(shared: &'a Shared, request_id: i32) -> Self {
        Self {
            shared,
            request_id,
            armed: true,
        }
    }

    /// The reader already removed the entry when it delivered the response.
    fn complete(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if self.armed && self.shared.forget(self.request_id) {
            trace!(server = %self.shared.server, request_id = self.request_id, "Abandoned request");
        }
    }
}

/// Marks the connection errored if a write is dropped before it finishes.
struct InFlightWrite<'a> {
    shared: &'a Shared,
    finished: bool,
}

impl Drop for InFlightWrite<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(server = %self.shared.server, "Write abandoned partway");
            self.shared.fail_all(ConnectionState::Errored);
        }
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One authenticated RCON session.
///
/// Connections are created and owned by the pool; callers only see them
/// through a [`PooledLease`](crate::pool::PooledLease).
pub struct RconConnection {
    /// Pool-unique serial number
    id: u64,
    host: String,
    port: u16,
    shared: Arc<Shared>,
    writer: tokio::sync::Mutex<BoxedWriter>,
    reader: JoinHandle<()>,
    command_timeout: Duration,
}

impl RconConnection {
    /// Opens a TCP session and logs in.
    ///
    /// Connect and login together are bounded by `config.connect_timeout`.
    pub async fn connect(
        id: u64,
        host: &str,
        port: u16,
        password: &str,
        config: &PoolConfig,
        stats: Arc<ConnectionStats>,
    ) -> RconResult<Self> {
        let server = format!("{}:{}", host, port);
        let deadline = Instant::now() + config.connect_timeout;

        debug!(server = %server, "Opening RCON connection");
        let stream = match timeout_at(deadline, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(RconError::Io(e)),
            Err(_) => {
                return Err(RconError::ConnectTimeout {
                    server,
                    timeout: config.connect_timeout,
                })
            }
        };
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let connection = Self::start(
            id,
            host,
            port,
            read_half,
            Box::new(write_half),
            config,
            stats,
        );

        connection
            .authenticate(password, deadline, config.connect_timeout)
            .await?;
        info!(server = %server, connection = id, "RCON connection ready");
        Ok(connection)
    }

    /// Wires up a connection over an already-open stream and spawns its reader.
    pub(crate) fn start<R>(
        id: u64,
        host: &str,
        port: u16,
        reader: R,
        writer: BoxedWriter,
        config: &PoolConfig,
        stats: Arc<ConnectionStats>,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        stats.connection_opened();
        let shared = Arc::new(Shared::new(format!("{}:{}", host, port), stats));
        let reader = tokio::spawn(read_loop(reader, Arc::clone(&shared)));

        Self {
            id,
            host: host.to_string(),
            port,
            shared,
            writer: tokio::sync::Mutex::new(writer),
            reader,
            command_timeout: config.command_timeout,
        }
    }

    async fn authenticate(
        &self,
        password: &str,
        deadline: Instant,
        connect_timeout: Duration,
    ) -> RconResult<()> {
        self.shared.set_state(ConnectionState::Authenticating);
        let (request_id, rx) = self.shared.register(ConnectionState::Authenticating)?;
        let pending = PendingRequest::new(&self.shared, request_id);

        let outcome = timeout_at(deadline, async {
            self.send(&Packet::auth(request_id, password)).await?;
            self.receive(rx).await
        })
        .await;

        match outcome {
            Ok(Ok(_)) => {
                pending.complete();
                Ok(())
            }
            Ok(Err(e)) => {
                if matches!(e, RconError::AuthenticationFailed { .. }) {
                    self.shared.stats.auth_failed();
                }
                Err(e)
            }
            Err(_) => {
                drop(pending);
                self.close();
                Err(RconError::ConnectTimeout {
                    server: self.server(),
                    timeout: connect_timeout,
                })
            }
        }
    }

    /// Sends a command and waits for its response body.
    ///
    /// Writing the request and waiting for the reply share one command
    /// timeout. A response arriving after the timeout is discarded by the
    /// reader. Dropping the returned future gives up the request id.
    pub async fn execute(&self, command: &str) -> RconResult<String> {
        if command.len() > MAX_COMMAND_LENGTH {
            return Err(RconError::CommandTooLong {
                len: command.len(),
                max: MAX_COMMAND_LENGTH,
            });
        }

        let (request_id, rx) = self.shared.register(ConnectionState::Ready)?;
        let pending = PendingRequest::new(&self.shared, request_id);
        let deadline = Instant::now() + self.command_timeout;

        let outcome = timeout_at(deadline, async {
            self.send(&Packet::command(request_id, command)).await?;
            self.shared.stats.command_sent();
            trace!(server = %self.shared.server, request_id, command, "Sent command");
            self.receive(rx).await
        })
        .await;

        match outcome {
            Ok(Ok(packet)) => {
                pending.complete();
                Ok(packet.body)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                drop(pending);
                self.shared.stats.command_timed_out();
                warn!(
                    server = %self.shared.server,
                    request_id,
                    timeout_ms = self.command_timeout.as_millis() as u64,
                    "Command timed out"
                );
                Err(RconError::CommandTimeout(self.command_timeout))
            }
        }
    }

    async fn receive(&self, rx: oneshot::Receiver<RconResult<Packet>>) -> RconResult<Packet> {
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(self.shared.closed()),
        }
    }

    /// Writes one packet.
    ///
    /// A failed write kills the connection, and so does a write that is
    /// abandoned partway, since the stream may hold a partial frame.
    async fn send(&self, packet: &Packet) -> RconResult<()> {
        let bytes = packet.encode();
        let mut writer = self.writer.lock().await;

        let mut in_flight = InFlightWrite {
            shared: &self.shared,
            finished: false,
        };
        let result = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;
        in_flight.finished = true;

        match result {
            Ok(()) => {
                self.shared.stats.bytes_written(bytes.len());
                Ok(())
            }
            Err(e) => {
                warn!(server = %self.shared.server, error = %e, "Write failed");
                self.shared.fail_all(ConnectionState::Errored);
                Err(self.shared.closed())
            }
        }
    }

    /// Closes the session, rejecting anything still pending.
    pub fn close(&self) {
        self.shared.fail_all(ConnectionState::Closed);
        self.reader.abort();
    }

    /// Pool-unique serial number.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The `host:port` key this connection is pooled under.
    pub fn server(&self) -> String {
        self.shared.server.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// True once the login succeeded and the socket is still usable.
    pub fn is_authenticated(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Number of requests waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending_count()
    }
}

impl Drop for RconConnection {
    fn drop(&mut self) {
        self.close();
        self.shared.stats.connection_closed();
    }
}

impl fmt::Debug for RconConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconConnection")
            .field("id", &self.id)
            .field("server", &self.shared.server)
            .field("state", &self.state())
            .finish()
    }
}
