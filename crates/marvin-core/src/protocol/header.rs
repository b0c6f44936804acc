//! Binary codec for the marvin packet header and whole frames.
//!
//! Wire format:
//! ```text
//! [type:1][size:2][body:size]
//! ```
//! Header size: 3 bytes. `size` is big-endian and counts body bytes only.
//!
//! The server answers every frame with a bare header (size 0) whose type is
//! [`PacketId::True`] when the frame was handled and [`PacketId::False`]
//! otherwise.

use thiserror::Error;

/// Total size of the packet header in bytes.
pub const HEADER_SIZE: usize = 3;

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The header declares more body bytes than are available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// A body does not fit in the 16-bit size field.
    #[error("body of {0} bytes exceeds the 65535-byte frame limit")]
    BodyTooLarge(usize),

    /// A frame assembler was fed a chunk that is not exactly the expected length.
    #[error("chunk length mismatch: expected exactly {expected} bytes, got {got}")]
    ChunkLengthMismatch { expected: usize, got: usize },

    /// The packet type byte is not a recognized command.
    #[error("unknown packet type: 0x{0:02X}")]
    UnknownPacketType(u8),

    /// The body could not be parsed for its declared packet type.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Packet identifiers ────────────────────────────────────────────────────────

/// Acknowledgement packet types sent by the server.
///
/// Command packet types start at 2; see
/// [`crate::protocol::commands::CommandId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketId {
    False = 0,
    True = 1,
}

impl TryFrom<u8> for PacketId {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketId::False),
            1 => Ok(PacketId::True),
            _ => Err(()),
        }
    }
}

impl From<bool> for PacketId {
    fn from(value: bool) -> Self {
        if value {
            PacketId::True
        } else {
            PacketId::False
        }
    }
}

// ── Header ────────────────────────────────────────────────────────────────────

/// 3-byte header prepended to every frame on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHeader {
    /// Identifies how the body is to be interpreted.
    pub packet_type: u8,
    /// Number of body bytes that follow the header.
    pub size: u16,
}

impl PacketHeader {
    /// Creates a header from its two fields.
    pub const fn new(packet_type: u8, size: u16) -> Self {
        Self { packet_type, size }
    }

    /// Returns the acknowledgement header for a handled (`true`) or rejected
    /// (`false`) frame.  Acknowledgements never carry a body.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use marvin_core::{PacketHeader, PacketId};
    ///
    /// let ack = PacketHeader::ack(true);
    /// assert_eq!(ack.packet_type, PacketId::True as u8);
    /// assert_eq!(ack.size, 0);
    /// ```
    pub fn ack(handled: bool) -> Self {
        Self::new(PacketId::from(handled) as u8, 0)
    }

    /// Number of body bytes announced by this header.
    pub fn body_len(&self) -> usize {
        self.size as usize
    }

    /// Encodes the header into its 3-byte wire representation.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let size = self.size.to_be_bytes();
        [self.packet_type, size[0], size[1]]
    }

    /// Decodes a header from the first 3 bytes of `bytes`.
    ///
    /// Extra trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InsufficientData`] if fewer than
    /// [`HEADER_SIZE`] bytes are given.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use marvin_core::PacketHeader;
    ///
    /// let header = PacketHeader::decode(&[0x03, 0x00, 0x02]).unwrap();
    /// assert_eq!(header, PacketHeader::new(3, 2));
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::InsufficientData {
                needed: HEADER_SIZE,
                available: bytes.len(),
            });
        }
        Ok(Self {
            packet_type: bytes[0],
            size: u16::from_be_bytes([bytes[1], bytes[2]]),
        })
    }
}

// ── Frames ────────────────────────────────────────────────────────────────────

/// A header together with exactly `header.size` body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: PacketHeader,
    pub body: Vec<u8>,
}

/// Encodes a complete frame: a header declaring `body.len()` followed by `body`.
///
/// # Errors
///
/// Returns [`ProtocolError::BodyTooLarge`] if `body` does not fit the 16-bit
/// size field.
///
/// # Examples
///
/// ```rust
/// use marvin_core::{decode_frame, encode_frame};
///
/// let bytes = encode_frame(3, &[0x05, 0xFA]).unwrap();
/// assert_eq!(bytes, vec![0x03, 0x00, 0x02, 0x05, 0xFA]);
///
/// let (frame, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(frame.header.packet_type, 3);
/// assert_eq!(frame.body, vec![0x05, 0xFA]);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(packet_type: u8, body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let size = u16::try_from(body.len()).map_err(|_| ProtocolError::BodyTooLarge(body.len()))?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&PacketHeader::new(packet_type, size).encode());
    buf.extend_from_slice(body);
    Ok(buf)
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the frame and the total number of bytes consumed (header + body),
/// so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] when the header itself is
/// truncated and [`ProtocolError::PayloadLengthMismatch`] when the body is.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), ProtocolError> {
    let header = PacketHeader::decode(bytes)?;
    let total = HEADER_SIZE + header.body_len();
    if bytes.len() < total {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: header.body_len(),
            available: bytes.len() - HEADER_SIZE,
        });
    }
    let body = bytes[HEADER_SIZE..total].to_vec();
    Ok((Frame { header, body }, total))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encodes_size_big_endian() {
        let bytes = PacketHeader::new(0x07, 0x1234).encode();
        assert_eq!(bytes, [0x07, 0x12, 0x34]);
    }

    #[test]
    fn test_header_decode_reads_type_and_size() {
        let header = PacketHeader::decode(&[0xFF, 0xFF, 0xFE]).unwrap();
        assert_eq!(header.packet_type, 0xFF);
        assert_eq!(header.size, 0xFFFE);
    }

    #[test]
    fn test_header_decode_ignores_trailing_bytes() {
        let header = PacketHeader::decode(&[0x02, 0x00, 0x02, 0xAA, 0xBB]).unwrap();
        assert_eq!(header, PacketHeader::new(2, 2));
    }

    #[test]
    fn test_header_decode_empty_returns_insufficient_data() {
        let result = PacketHeader::decode(&[]);
        assert_eq!(
            result,
            Err(ProtocolError::InsufficientData {
                needed: 3,
                available: 0
            })
        );
    }

    #[test]
    fn test_header_decode_two_bytes_returns_insufficient_data() {
        let result = PacketHeader::decode(&[0x01, 0x00]);
        assert!(matches!(result, Err(ProtocolError::InsufficientData { available: 2, .. })));
    }

    #[test]
    fn test_ack_true_is_type_one_size_zero() {
        assert_eq!(PacketHeader::ack(true).encode(), [0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_ack_false_is_type_zero_size_zero() {
        assert_eq!(PacketHeader::ack(false).encode(), [0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_packet_id_try_from_rejects_command_types() {
        assert_eq!(PacketId::try_from(0), Ok(PacketId::False));
        assert_eq!(PacketId::try_from(1), Ok(PacketId::True));
        assert_eq!(PacketId::try_from(2), Err(()));
    }

    #[test]
    fn test_encode_frame_rejects_oversized_body() {
        let body = vec![0u8; u16::MAX as usize + 1];
        assert_eq!(
            encode_frame(2, &body),
            Err(ProtocolError::BodyTooLarge(u16::MAX as usize + 1))
        );
    }

    #[test]
    fn test_encode_frame_accepts_max_body() {
        let body = vec![0xAB; u16::MAX as usize];
        let bytes = encode_frame(9, &body).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + u16::MAX as usize);
        assert_eq!(&bytes[..3], &[0x09, 0xFF, 0xFF]);
    }

    #[test]
    fn test_decode_frame_round_trips_type_three_body() {
        let bytes = encode_frame(3, &[0x05, 0xFA]).unwrap();
        let (frame, consumed) = decode_frame(&bytes).unwrap();
        assert_eq!(frame.header, PacketHeader::new(3, 2));
        assert_eq!(frame.body, vec![0x05, 0xFA]);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_decode_frame_with_zero_size_has_empty_body() {
        let (frame, consumed) = decode_frame(&[0x04, 0x00, 0x00]).unwrap();
        assert!(frame.body.is_empty());
        assert_eq!(consumed, HEADER_SIZE);
    }

    #[test]
    fn test_decode_frame_truncated_body_returns_mismatch() {
        let result = decode_frame(&[0x03, 0x00, 0x04, 0x01]);
        assert_eq!(
            result,
            Err(ProtocolError::PayloadLengthMismatch {
                declared: 4,
                available: 1
            })
        );
    }

    #[test]
    fn test_decode_frame_consumes_only_first_frame() {
        let mut bytes = encode_frame(2, &[0x00, 0x1E]).unwrap();
        bytes.extend_from_slice(&encode_frame(4, &[]).unwrap());
        let (first, consumed) = decode_frame(&bytes).unwrap();
        assert_eq!(first.header.packet_type, 2);
        let (second, _) = decode_frame(&bytes[consumed..]).unwrap();
        assert_eq!(second.header.packet_type, 4);
    }
}
