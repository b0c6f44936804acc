//! Per-connection state: socket, frame assembly and the acknowledgement queue.
//!
//! Reads never consume a partial chunk.  Each step peeks at the socket for the
//! number of bytes the assembler expects next (3 for a header, `size` for a
//! body) and only receives once that many are available.  A slow sender and a
//! truncated frame therefore look the same: the step reports
//! [`ReadOutcome::Pending`] and the bytes stay in the kernel buffer until more
//! arrive.  Once the peer has half-closed, the receiver treats a pending step
//! as the end of the connection.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;

use marvin_core::{Frame, FrameAssembler};
use mio::net::TcpStream;

/// Result of one read step on a connection.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    /// A complete frame was assembled.
    Frame(Frame),
    /// A header with a non-empty body was stored; its body is read next.
    HeaderBuffered,
    /// Fewer bytes than expected are available; nothing was consumed.
    Pending,
    /// The peer closed the connection (zero bytes available on a readable socket).
    Closed,
}

/// Result of flushing the acknowledgement queue.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FlushOutcome {
    /// Every queued response was written.
    Drained,
    /// The socket would block; the remainder stays queued in order.
    Blocked,
}

/// State for one accepted connection.
pub(crate) struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    assembler: FrameAssembler,
    responses: VecDeque<Vec<u8>>,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        Self {
            stream,
            addr,
            assembler: FrameAssembler::new(),
            responses: VecDeque::new(),
        }
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub(crate) fn is_awaiting_body(&self) -> bool {
        self.assembler.is_awaiting_body()
    }

    pub(crate) fn pending_responses(&self) -> usize {
        self.responses.len()
    }

    /// Performs one read step: probe for the expected byte count, and if it is
    /// all there, receive it and advance the assembler.
    ///
    /// # Errors
    ///
    /// Propagates socket errors other than `WouldBlock`/`Interrupted`.  An
    /// assembler error (which would indicate a short receive after a
    /// successful probe) is reported as `InvalidData`.
    pub(crate) fn read_step(&mut self) -> io::Result<ReadOutcome> {
        let expected = self.assembler.expected_len();
        let mut buf = vec![0u8; expected];

        let available = match self.stream.peek(&mut buf) {
            Ok(n) => n,
            Err(e) if is_retryable(&e) => return Ok(ReadOutcome::Pending),
            Err(e) => return Err(e),
        };
        if available == 0 {
            return Ok(ReadOutcome::Closed);
        }
        if available < expected {
            return Ok(ReadOutcome::Pending);
        }

        self.stream.read_exact(&mut buf)?;
        match self.assembler.advance(&buf) {
            Ok(Some(frame)) => Ok(ReadOutcome::Frame(frame)),
            Ok(None) => Ok(ReadOutcome::HeaderBuffered),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }

    /// Appends an encoded response to the back of the queue.
    pub(crate) fn queue_response(&mut self, bytes: Vec<u8>) {
        self.responses.push_back(bytes);
    }

    /// Writes queued responses in order until the queue is empty or the socket
    /// would block.  A short write leaves the unsent tail at the front.
    pub(crate) fn flush(&mut self) -> io::Result<FlushOutcome> {
        while let Some(front) = self.responses.front_mut() {
            match self.stream.write(front) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) if n == front.len() => {
                    self.responses.pop_front();
                }
                Ok(n) => {
                    front.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(FlushOutcome::Blocked),
                Err(e) => return Err(e),
            }
        }
        Ok(FlushOutcome::Drained)
    }
}

/// Returns `true` for errors that mean "nothing to do right now".
fn is_retryable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
