//! Protocol module containing the framing codec, frame assembly and the
//! command payload schema.

pub mod assembler;
pub mod commands;
pub mod header;

pub use assembler::{AssemblyState, FrameAssembler};
pub use commands::{Command, CommandId, MotorSettings, MotorSpeed};
pub use header::{decode_frame, encode_frame, Frame, PacketHeader, PacketId, ProtocolError, HEADER_SIZE};
