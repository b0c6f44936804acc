//! The callback surface between the packet receiver and the application.

use std::fmt;
use std::net::SocketAddr;

use marvin_core::PacketHeader;
use mio::Token;

/// Stable handle for one accepted connection.
///
/// Assigned at accept time and never reused for the lifetime of the
/// receiver, so it stays meaningful after the peer's address has gone away
/// and distinguishes several connections from the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) usize);

impl ConnectionId {
    /// Returns the raw numeric value of the handle.
    pub fn get(self) -> usize {
        self.0
    }

    pub(crate) fn token(self) -> Token {
        Token(self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Why a connection was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer closed its side of the connection (zero-byte read).
    PeerClosed,
    /// The socket reported an error condition or an I/O call failed.
    Fault,
    /// The owner closed the connection with
    /// [`PacketReceiver::close_connection`](super::PacketReceiver::close_connection).
    Evicted,
    /// The receiver was shut down.
    Shutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisconnectReason::PeerClosed => "peer closed",
            DisconnectReason::Fault => "socket fault",
            DisconnectReason::Evicted => "evicted",
            DisconnectReason::Shutdown => "server shutdown",
        };
        f.write_str(s)
    }
}

/// Application callbacks invoked by [`PacketReceiver`](super::PacketReceiver).
///
/// Every method has a no-op default, so an implementation only overrides what
/// it cares about.  All callbacks run on the thread calling
/// [`PacketReceiver::poll`](super::PacketReceiver::poll) and must not block.
#[cfg_attr(test, mockall::automock)]
pub trait PacketHandler {
    /// A new connection was accepted.
    fn on_connect(&mut self, _id: ConnectionId, _addr: SocketAddr) {}

    /// A connection was removed.  Called exactly once per connection,
    /// whatever the reason, after all of its state has been purged.
    fn on_disconnect(&mut self, _id: ConnectionId, _addr: SocketAddr, _reason: DisconnectReason) {}

    /// The receiver is shutting down.  Called once, before any connection is
    /// closed.
    fn on_server_shutdown(&mut self) {}

    /// A complete frame arrived.  The return value selects the
    /// acknowledgement queued for the sender: `true` → type 1, `false` → type 0.
    fn on_data(&mut self, _id: ConnectionId, _header: &PacketHeader, _body: &[u8]) -> bool {
        false
    }
}

/// A handler that ignores every callback and rejects every frame.
impl PacketHandler for () {}
