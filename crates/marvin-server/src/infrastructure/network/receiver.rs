//! PacketReceiver: single-threaded, readiness-driven TCP frame server.
//!
//! One [`mio::Poll`] tracks the listening socket and every accepted
//! connection.  The owner drives the receiver by calling
//! [`PacketReceiver::poll`] in its own loop; each call waits for readiness
//! once and then runs three passes over the ready sockets:
//!
//! 1. **read** – accept new connections, advance frame assembly, dispatch
//!    complete frames to the [`PacketHandler`] and queue their ACKs;
//! 2. **write** – flush queued ACKs in FIFO order;
//! 3. **fault** – drop connections whose socket reported an error.
//!
//! Registrations are edge-triggered, so every pass drains what it can before
//! returning: the listener accepts until `WouldBlock`, a readable connection
//! is stepped until it defers, and a writable one is flushed until its queue
//! is empty or the socket blocks.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use marvin_core::PacketHeader;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::connection::{Connection, FlushOutcome, ReadOutcome};
use super::handler::{ConnectionId, DisconnectReason, PacketHandler};

const LISTENER: Token = Token(0);
const WAKER: Token = Token(usize::MAX);
const FIRST_CONNECTION_ID: usize = 1;

/// Default TCP port the receiver listens on.
pub const DEFAULT_PORT: u16 = 4242;
/// Default listen backlog.
pub const DEFAULT_BACKLOG: i32 = 10;
/// Default capacity of the readiness event buffer.
pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Error type for receiver operations.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to set up readiness polling: {0}")]
    Setup(#[source] io::Error),
    #[error("readiness wait failed: {0}")]
    Poll(#[source] io::Error),
    #[error("receiver has been shut down")]
    ShutDown,
}

/// Configuration for a [`PacketReceiver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Address to listen on.  Port 0 picks an ephemeral port.
    pub bind_addr: SocketAddr,
    /// Maximum number of pending, not yet accepted connections.
    pub backlog: i32,
    /// Upper bound on one readiness wait; `None` waits indefinitely.
    pub poll_timeout: Option<Duration>,
    /// Number of readiness events collected per wait.
    pub event_capacity: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            backlog: DEFAULT_BACKLOG,
            poll_timeout: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Requests shutdown of a [`PacketReceiver`] from another thread.
///
/// [`request`](Self::request) sets a flag and wakes a blocked
/// [`PacketReceiver::poll`], which then returns promptly.  The owner of the
/// receiver checks [`is_requested`](Self::is_requested) in its run loop and
/// calls [`PacketReceiver::shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    waker: Arc<Waker>,
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Marks shutdown as requested and wakes the poll loop.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        if let Err(e) = self.waker.wake() {
            warn!("failed to wake packet receiver: {e}");
        }
    }

    /// Returns `true` once [`request`](Self::request) has been called.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Readiness collected from one wait, split by pass.
#[derive(Default)]
struct ReadySet {
    accept: bool,
    /// Readable connections, with whether the peer has closed its write half.
    readable: Vec<(ConnectionId, bool)>,
    writable: Vec<ConnectionId>,
    faulted: Vec<ConnectionId>,
}

/// The packet receiver.
///
/// Owns the listening socket, every connection and the handler.  All state is
/// mutated only inside [`poll`](Self::poll), [`close_connection`](Self::close_connection)
/// and [`shutdown`](Self::shutdown).
pub struct PacketReceiver<H: PacketHandler> {
    poll: Poll,
    events: Events,
    poll_timeout: Option<Duration>,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    connections: BTreeMap<ConnectionId, Connection>,
    /// Connections with a non-empty response queue (registered for writable).
    writers: BTreeSet<ConnectionId>,
    next_id: usize,
    handler: H,
    waker: Arc<Waker>,
    shutdown_requested: Arc<AtomicBool>,
    shut_down: bool,
}

impl<H: PacketHandler> PacketReceiver<H> {
    /// Binds the listening socket and prepares the readiness poller.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::BindFailed`] if the address cannot be bound or
    /// listened on, and [`ReceiverError::Setup`] if the poller cannot be
    /// created.
    pub fn bind(config: ReceiverConfig, handler: H) -> Result<Self, ReceiverError> {
        let poll = Poll::new().map_err(ReceiverError::Setup)?;
        let waker = Waker::new(poll.registry(), WAKER).map_err(ReceiverError::Setup)?;

        let mut listener = bind_listener(config.bind_addr, config.backlog).map_err(|source| {
            ReceiverError::BindFailed {
                addr: config.bind_addr,
                source,
            }
        })?;
        let local_addr = listener.local_addr().map_err(|source| ReceiverError::BindFailed {
            addr: config.bind_addr,
            source,
        })?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(ReceiverError::Setup)?;

        info!(
            "packet receiver listening on {local_addr} (backlog {})",
            config.backlog
        );

        Ok(Self {
            poll,
            events: Events::with_capacity(config.event_capacity.max(1)),
            poll_timeout: config.poll_timeout,
            listener: Some(listener),
            local_addr,
            connections: BTreeMap::new(),
            writers: BTreeSet::new(),
            next_id: FIRST_CONNECTION_ID,
            handler,
            waker: Arc::new(waker),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            shut_down: false,
        })
    }

    /// Waits for readiness once and dispatches every ready socket.
    ///
    /// Returns the number of readiness events handled; `0` means the wait
    /// timed out or was interrupted by a signal.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::ShutDown`] after [`shutdown`](Self::shutdown),
    /// and [`ReceiverError::Poll`] if the readiness wait itself fails.
    /// Connection-level failures are never returned; they close that
    /// connection only.
    pub fn poll(&mut self) -> Result<usize, ReceiverError> {
        if self.shut_down {
            return Err(ReceiverError::ShutDown);
        }

        match self.poll.poll(&mut self.events, self.poll_timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(ReceiverError::Poll(e)),
        }

        let mut ready = ReadySet::default();
        let mut handled = 0;
        for event in self.events.iter() {
            handled += 1;
            match event.token() {
                LISTENER => ready.accept = true,
                WAKER => debug!("packet receiver woken"),
                token => {
                    let id = ConnectionId(token.0);
                    if event.is_readable() || event.is_read_closed() {
                        ready.readable.push((id, event.is_read_closed()));
                    }
                    if event.is_writable() {
                        ready.writable.push(id);
                    }
                    if event.is_error() {
                        ready.faulted.push(id);
                    }
                }
            }
        }

        if ready.accept {
            self.accept_pending();
        }
        for (id, read_closed) in ready.readable {
            self.service_readable(id, read_closed);
        }
        for id in ready.writable {
            self.service_writable(id);
        }
        for id in ready.faulted {
            if self.connections.contains_key(&id) {
                warn!("{id}: socket reported an error condition");
                self.remove_connection(id, DisconnectReason::Fault);
            }
        }

        Ok(handled)
    }

    /// Closes one connection and reports it with [`DisconnectReason::Evicted`].
    ///
    /// Returns `false` (and does nothing) if the id is unknown or already
    /// closed.
    pub fn close_connection(&mut self, id: ConnectionId) -> bool {
        self.remove_connection(id, DisconnectReason::Evicted)
    }

    /// Tears the receiver down.
    ///
    /// Calls [`PacketHandler::on_server_shutdown`], closes every connection in
    /// reverse accept order (each reported with [`DisconnectReason::Shutdown`])
    /// and finally closes the listener.  Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!(
            "packet receiver shutting down ({} connection(s) open)",
            self.connections.len()
        );

        self.handler.on_server_shutdown();

        let ids: Vec<ConnectionId> = self.connections.keys().rev().copied().collect();
        for id in ids {
            self.remove_connection(id, DisconnectReason::Shutdown);
        }

        if let Some(mut listener) = self.listener.take() {
            if let Err(e) = self.poll.registry().deregister(&mut listener) {
                debug!("failed to deregister listener: {e}");
            }
        }
        info!("packet receiver stopped");
    }

    /// Returns a handle that can request shutdown from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            waker: Arc::clone(&self.waker),
            requested: Arc::clone(&self.shutdown_requested),
        }
    }

    /// Returns `true` once any [`ShutdownHandle`] has requested shutdown.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Returns `true` after [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// The address the listener is bound to (with the real port when 0 was requested).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Ids of all open connections, in accept order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub fn peer_addr(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.connections.get(&id).map(Connection::addr)
    }

    /// Number of ACKs queued but not yet written for a connection.
    pub fn pending_responses(&self, id: ConnectionId) -> Option<usize> {
        self.connections.get(&id).map(Connection::pending_responses)
    }

    /// Whether a connection has a header buffered and is waiting for its body.
    pub fn is_awaiting_body(&self, id: ConnectionId) -> Option<bool> {
        self.connections.get(&id).map(Connection::is_awaiting_body)
    }

    /// Whether a connection is registered for write readiness.
    pub fn is_write_pending(&self, id: ConnectionId) -> bool {
        self.writers.contains(&id)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    // ── Passes ───────────────────────────────────────────────────────────────

    fn accept_pending(&mut self) {
        loop {
            let Some(listener) = self.listener.as_ref() else {
                return;
            };
            let (mut stream, addr) = match listener.accept() {
                Ok(pair) => pair,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("accept failed: {e}");
                    return;
                }
            };

            let id = ConnectionId(self.next_id);
            self.next_id += 1;
            if let Err(e) = self
                .poll
                .registry()
                .register(&mut stream, id.token(), Interest::READABLE)
            {
                warn!("failed to register connection from {addr}: {e}");
                continue;
            }

            self.connections.insert(id, Connection::new(stream, addr));
            info!("{id}: accepted connection from {addr}");
            self.handler.on_connect(id, addr);
        }
    }

    fn service_readable(&mut self, id: ConnectionId, read_closed: bool) {
        loop {
            let Some(conn) = self.connections.get_mut(&id) else {
                return;
            };
            match conn.read_step() {
                // The peer sent its FIN, so a short chunk can never complete.
                Ok(ReadOutcome::Pending) if read_closed => {
                    debug!("{id}: peer closed with a truncated frame");
                    self.remove_connection(id, DisconnectReason::PeerClosed);
                    return;
                }
                Ok(ReadOutcome::Pending) => return,
                Ok(ReadOutcome::HeaderBuffered) => {
                    debug!("{id}: header buffered, awaiting body");
                }
                Ok(ReadOutcome::Frame(frame)) => {
                    debug!(
                        "{id}: frame type 0x{:02X} with {} body byte(s)",
                        frame.header.packet_type,
                        frame.body.len()
                    );
                    let handled = self.handler.on_data(id, &frame.header, &frame.body);
                    self.queue_ack(id, handled);
                }
                Ok(ReadOutcome::Closed) => {
                    self.remove_connection(id, DisconnectReason::PeerClosed);
                    return;
                }
                Err(e) => {
                    warn!("{id}: read failed: {e}");
                    self.remove_connection(id, DisconnectReason::Fault);
                    return;
                }
            }
        }
    }

    fn service_writable(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        match conn.flush() {
            Ok(FlushOutcome::Drained) => {
                if self.writers.remove(&id) {
                    self.set_interest(id, Interest::READABLE);
                }
            }
            Ok(FlushOutcome::Blocked) => {
                debug!("{id}: send would block, {} ACK(s) still queued", conn.pending_responses());
            }
            Err(e) => {
                warn!("{id}: write failed: {e}");
                self.remove_connection(id, DisconnectReason::Fault);
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn queue_ack(&mut self, id: ConnectionId, handled: bool) {
        // on_data may have evicted the connection through a shared handle.
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        conn.queue_response(PacketHeader::ack(handled).encode().to_vec());
        if self.writers.insert(id) {
            self.set_interest(id, Interest::READABLE | Interest::WRITABLE);
        }
    }

    /// Re-registers a connection with new interests; a failure faults it.
    fn set_interest(&mut self, id: ConnectionId, interest: Interest) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        if let Err(e) = self
            .poll
            .registry()
            .reregister(conn.stream_mut(), id.token(), interest)
        {
            warn!("{id}: failed to update readiness interest: {e}");
            self.remove_connection(id, DisconnectReason::Fault);
        }
    }

    /// Purges every trace of a connection, closes its socket and notifies the
    /// handler.  Returns `false` if the id was not open.
    fn remove_connection(&mut self, id: ConnectionId, reason: DisconnectReason) -> bool {
        let Some(mut conn) = self.connections.remove(&id) else {
            return false;
        };
        self.writers.remove(&id);
        if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
            debug!("{id}: failed to deregister: {e}");
        }
        let addr = conn.addr();
        drop(conn);

        info!("{id}: connection from {addr} closed ({reason})");
        self.handler.on_disconnect(id, addr, reason);
        true
    }
}

impl<H: PacketHandler> Drop for PacketReceiver<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Creates a non-blocking listener with `SO_REUSEADDR` and the given backlog.
fn bind_listener(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    Ok(TcpListener::from_std(socket.into()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
