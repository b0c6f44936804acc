//! Network infrastructure for the client application.
//!
//! [`CommandClient`] owns one blocking TCP stream to the server.  Every frame
//! it writes is answered by a 3-byte acknowledgement header (type 1 = handled,
//! type 0 = rejected, size 0); [`CommandClient::send_command`] pairs the two.

mod retry;

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use marvin_core::{encode_frame, Command, PacketHeader, PacketId, ProtocolError, HEADER_SIZE};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use retry::RetryPolicy;

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A single TCP connect to the server failed.
    #[error("failed to connect to server at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// Every attempt allowed by the [`RetryPolicy`] failed.
    #[error("gave up connecting to {addr} after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        addr: SocketAddr,
        attempts: u32,
        #[source]
        source: io::Error,
    },
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
    /// A frame could not be encoded or an ACK header could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// The server answered with something other than a bare ACK header.
    #[error("unexpected response: type 0x{packet_type:02X}, size {size}")]
    UnexpectedResponse { packet_type: u8, size: u16 },
    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,
}

/// Blocking connection to a marvin server.
pub struct CommandClient {
    stream: TcpStream,
    peer: SocketAddr,
}

impl CommandClient {
    /// Connects once.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectFailed`] if the connection is refused or
    /// cannot be set up.
    pub fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream =
            TcpStream::connect(addr).map_err(|source| ClientError::ConnectFailed { addr, source })?;
        Self::from_stream(stream, addr)
    }

    /// Connects, retrying failed attempts as described by `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RetriesExhausted`] carrying the last connect
    /// error when the attempts or the deadline run out.
    pub fn connect_with_retry(addr: SocketAddr, policy: &RetryPolicy) -> Result<Self, ClientError> {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let remaining = policy.deadline.saturating_sub(started.elapsed());
            let timeout = policy.connect_timeout.min(remaining);
            let result = if timeout.is_zero() {
                Err(io::Error::new(io::ErrorKind::TimedOut, "connect deadline elapsed"))
            } else {
                TcpStream::connect_timeout(&addr, timeout)
            };

            let error = match result {
                Ok(stream) => {
                    info!("connected to {addr} on attempt {attempt}");
                    return Self::from_stream(stream, addr);
                }
                Err(e) => e,
            };

            let delay = policy.delay_after(attempt);
            let out_of_time = started.elapsed() + delay >= policy.deadline;
            if attempt >= policy.max_attempts.max(1) || out_of_time {
                return Err(ClientError::RetriesExhausted {
                    addr,
                    attempts: attempt,
                    source: error,
                });
            }

            warn!("connect attempt {attempt} to {addr} failed: {error}; retrying in {delay:?}");
            std::thread::sleep(delay);
        }
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr) -> Result<Self, ClientError> {
        stream.set_nodelay(true)?;
        Ok(Self { stream, peer })
    }

    /// Address of the server this client is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Bounds how long [`read_ack`](Self::read_ack) waits.  `None` waits forever.
    pub fn set_ack_timeout(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Writes one frame without waiting for its acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] if the body exceeds 65535 bytes and
    /// [`ClientError::Io`] if the write fails.
    pub fn send_frame(&mut self, packet_type: u8, body: &[u8]) -> Result<(), ClientError> {
        let bytes = encode_frame(packet_type, body)?;
        self.stream.write_all(&bytes)?;
        debug!("sent frame type 0x{packet_type:02X} with {} body byte(s)", body.len());
        Ok(())
    }

    /// Reads the next acknowledgement; `true` means the server handled the frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] on EOF and
    /// [`ClientError::UnexpectedResponse`] for anything that is not a bare
    /// type-0/1 header.
    pub fn read_ack(&mut self) -> Result<bool, ClientError> {
        let mut buf = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ClientError::Closed,
            _ => ClientError::Io(e),
        })?;

        let header = PacketHeader::decode(&buf)?;
        let unexpected = ClientError::UnexpectedResponse {
            packet_type: header.packet_type,
            size: header.size,
        };
        if header.size != 0 {
            return Err(unexpected);
        }
        match PacketId::try_from(header.packet_type) {
            Ok(id) => Ok(id == PacketId::True),
            Err(()) => Err(unexpected),
        }
    }

    /// Writes a raw frame and waits for its acknowledgement.
    pub fn request(&mut self, packet_type: u8, body: &[u8]) -> Result<bool, ClientError> {
        self.send_frame(packet_type, body)?;
        self.read_ack()
    }

    /// Writes a command frame and waits for its acknowledgement.
    pub fn send_command(&mut self, command: &Command) -> Result<bool, ClientError> {
        self.stream.write_all(&command.encode())?;
        debug!("sent {command:?}");
        self.read_ack()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
