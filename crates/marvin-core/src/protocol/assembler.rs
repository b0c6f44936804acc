//! Per-connection frame assembly.
//!
//! A connection alternates between two states:
//!
//! ```text
//!            header.size > 0                 body bytes
//! AwaitingHeader ───────────────▶ AwaitingBody ──────────▶ frame
//!       │                                                    ▲
//!       └──────────── header.size == 0 ──────────────────────┘
//! ```
//!
//! The assembler never buffers partial data.  The caller asks for
//! [`FrameAssembler::expected_len`], waits until at least that many bytes are
//! available on the transport, and then feeds exactly that many bytes to
//! [`FrameAssembler::advance`].  This keeps the state machine independent of
//! sockets and makes "not enough bytes yet" the caller's concern.

use crate::protocol::header::{Frame, PacketHeader, ProtocolError, HEADER_SIZE};

/// Where a connection is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssemblyState {
    /// No header buffered; the next bytes are a header.
    #[default]
    AwaitingHeader,
    /// A header with a non-empty body has been read; the next bytes are its body.
    AwaitingBody(PacketHeader),
}

/// Header/body state machine for one connection.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    state: AssemblyState,
}

impl FrameAssembler {
    /// Creates an assembler waiting for a header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Returns `true` while a header is buffered and its body is outstanding.
    pub fn is_awaiting_body(&self) -> bool {
        matches!(self.state, AssemblyState::AwaitingBody(_))
    }

    /// Number of bytes the next call to [`advance`](Self::advance) must receive.
    ///
    /// This is [`HEADER_SIZE`] while awaiting a header, otherwise the buffered
    /// header's declared body size (always > 0).
    pub fn expected_len(&self) -> usize {
        match self.state {
            AssemblyState::AwaitingHeader => HEADER_SIZE,
            AssemblyState::AwaitingBody(header) => header.body_len(),
        }
    }

    /// Feeds exactly [`expected_len`](Self::expected_len) bytes and advances
    /// the state machine.
    ///
    /// Returns `Some(frame)` when a frame is complete: immediately for a
    /// header declaring size 0, or once the body of a buffered header arrives.
    /// Returns `None` after buffering a header whose body is still outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ChunkLengthMismatch`] if `bytes` is not exactly
    /// the expected length.  The state is left unchanged in that case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use marvin_core::FrameAssembler;
    ///
    /// let mut asm = FrameAssembler::new();
    /// assert!(asm.advance(&[0x03, 0x00, 0x02]).unwrap().is_none());
    /// assert_eq!(asm.expected_len(), 2);
    ///
    /// let frame = asm.advance(&[0x05, 0xFA]).unwrap().unwrap();
    /// assert_eq!(frame.body, vec![0x05, 0xFA]);
    /// assert_eq!(asm.expected_len(), 3);
    /// ```
    pub fn advance(&mut self, bytes: &[u8]) -> Result<Option<Frame>, ProtocolError> {
        let expected = self.expected_len();
        if bytes.len() != expected {
            return Err(ProtocolError::ChunkLengthMismatch {
                expected,
                got: bytes.len(),
            });
        }

        match self.state {
            AssemblyState::AwaitingHeader => {
                let header = PacketHeader::decode(bytes)?;
                if header.size == 0 {
                    return Ok(Some(Frame {
                        header,
                        body: Vec::new(),
                    }));
                }
                self.state = AssemblyState::AwaitingBody(header);
                Ok(None)
            }
            AssemblyState::AwaitingBody(header) => {
                self.state = AssemblyState::AwaitingHeader;
                Ok(Some(Frame {
                    header,
                    body: bytes.to_vec(),
                }))
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assembler_expects_header() {
        let asm = FrameAssembler::new();
        assert_eq!(asm.state(), AssemblyState::AwaitingHeader);
        assert_eq!(asm.expected_len(), HEADER_SIZE);
        assert!(!asm.is_awaiting_body());
    }

    #[test]
    fn test_zero_size_header_completes_frame_immediately() {
        // Arrange
        let mut asm = FrameAssembler::new();

        // Act
        let frame = asm.advance(&[0x04, 0x00, 0x00]).unwrap();

        // Assert
        let frame = frame.expect("size-0 header must complete a frame");
        assert_eq!(frame.header, PacketHeader::new(4, 0));
        assert!(frame.body.is_empty());
        assert_eq!(asm.state(), AssemblyState::AwaitingHeader);
    }

    #[test]
    fn test_header_with_body_moves_to_awaiting_body() {
        let mut asm = FrameAssembler::new();

        let result = asm.advance(&[0x02, 0x00, 0x02]).unwrap();

        assert!(result.is_none());
        assert_eq!(asm.state(), AssemblyState::AwaitingBody(PacketHeader::new(2, 2)));
        assert_eq!(asm.expected_len(), 2);
    }

    #[test]
    fn test_body_completes_frame_and_clears_header() {
        let mut asm = FrameAssembler::new();
        asm.advance(&[0x03, 0x00, 0x02]).unwrap();

        let frame = asm.advance(&[0x05, 0xFA]).unwrap().unwrap();

        assert_eq!(frame.header, PacketHeader::new(3, 2));
        assert_eq!(frame.body, vec![0x05, 0xFA]);
        assert!(!asm.is_awaiting_body());
    }

    #[test]
    fn test_wrong_chunk_length_is_rejected_without_state_change() {
        let mut asm = FrameAssembler::new();
        asm.advance(&[0x03, 0x00, 0x04]).unwrap();

        let result = asm.advance(&[0x01, 0x02]);

        assert_eq!(
            result,
            Err(ProtocolError::ChunkLengthMismatch {
                expected: 4,
                got: 2
            })
        );
        assert_eq!(asm.expected_len(), 4);
    }

    #[test]
    fn test_consecutive_frames_are_independent() {
        let mut asm = FrameAssembler::new();
        let mut frames = Vec::new();

        for chunk in [&[0x02, 0x00, 0x01][..], &[0x07], &[0x04, 0x00, 0x00], &[0x03, 0x00, 0x01], &[0x09]] {
            if let Some(frame) = asm.advance(chunk).unwrap() {
                frames.push(frame);
            }
        }

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].body, vec![0x07]);
        assert!(frames[1].body.is_empty());
        assert_eq!(frames[2].header.packet_type, 3);
    }
}
