//! Motor command payloads carried inside frame bodies.
//!
//! The framing layer treats bodies as opaque bytes.  This module gives
//! `header.packet_type` plus body a meaning for the robot's motor controller:
//!
//! | Type | Command         | Body                                   |
//! |------|-----------------|----------------------------------------|
//! | 0x02 | `MotorSettings` | `stop_distance: u16` (big-endian)      |
//! | 0x03 | `MotorSpeed`    | `speed_left: i8`, `speed_right: i8`    |
//! | 0x04 | `MotorStop`     | empty                                  |
//!
//! Types 0x00 and 0x01 are reserved for acknowledgements
//! ([`crate::protocol::header::PacketId`]).

use crate::protocol::header::{PacketHeader, ProtocolError};

/// Command packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandId {
    MotorSettings = 0x02,
    MotorSpeed = 0x03,
    MotorStop = 0x04,
}

impl TryFrom<u8> for CommandId {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x02 => Ok(CommandId::MotorSettings),
            0x03 => Ok(CommandId::MotorSpeed),
            0x04 => Ok(CommandId::MotorStop),
            _ => Err(()),
        }
    }
}

/// MOTOR_SPEED (0x03): signed speed for each drive motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorSpeed {
    pub speed_left: i8,
    pub speed_right: i8,
}

impl MotorSpeed {
    /// Encoded body size in bytes.
    pub const SIZE: usize = 2;
}

/// MOTOR_SETTINGS (0x02): obstacle distance at which the motors stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorSettings {
    pub stop_distance: u16,
}

impl MotorSettings {
    /// Encoded body size in bytes.
    pub const SIZE: usize = 2;
}

/// A decoded command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MotorSettings(MotorSettings),
    MotorSpeed(MotorSpeed),
    MotorStop,
}

impl Command {
    /// Returns the packet type used on the wire for this command.
    pub fn command_id(&self) -> CommandId {
        match self {
            Command::MotorSettings(_) => CommandId::MotorSettings,
            Command::MotorSpeed(_) => CommandId::MotorSpeed,
            Command::MotorStop => CommandId::MotorStop,
        }
    }

    /// Decodes a command from a frame's header and body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownPacketType`] for a type that is not a
    /// [`CommandId`], and [`ProtocolError::MalformedPayload`] when the body
    /// length does not match the command's fixed size.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use marvin_core::{Command, MotorSpeed, PacketHeader};
    ///
    /// let cmd = Command::decode(&PacketHeader::new(3, 2), &[0x05, 0xFA]).unwrap();
    /// assert_eq!(cmd, Command::MotorSpeed(MotorSpeed { speed_left: 5, speed_right: -6 }));
    /// ```
    pub fn decode(header: &PacketHeader, body: &[u8]) -> Result<Self, ProtocolError> {
        let id = CommandId::try_from(header.packet_type)
            .map_err(|_| ProtocolError::UnknownPacketType(header.packet_type))?;
        match id {
            CommandId::MotorSettings => {
                require_exact_len(body, MotorSettings::SIZE, "MotorSettings")?;
                Ok(Command::MotorSettings(MotorSettings {
                    stop_distance: u16::from_be_bytes([body[0], body[1]]),
                }))
            }
            CommandId::MotorSpeed => {
                require_exact_len(body, MotorSpeed::SIZE, "MotorSpeed")?;
                Ok(Command::MotorSpeed(MotorSpeed {
                    speed_left: i8::from_be_bytes([body[0]]),
                    speed_right: i8::from_be_bytes([body[1]]),
                }))
            }
            CommandId::MotorStop => {
                require_exact_len(body, 0, "MotorStop")?;
                Ok(Command::MotorStop)
            }
        }
    }

    /// Encodes the command body (without header).
    pub fn encode_body(&self) -> Vec<u8> {
        match self {
            Command::MotorSettings(m) => m.stop_distance.to_be_bytes().to_vec(),
            Command::MotorSpeed(m) => vec![m.speed_left as u8, m.speed_right as u8],
            Command::MotorStop => Vec::new(),
        }
    }

    /// Encodes the command as a complete frame (header + body).
    pub fn encode(&self) -> Vec<u8> {
        let body = self.encode_body();
        let mut buf = PacketHeader::new(self.command_id() as u8, body.len() as u16)
            .encode()
            .to_vec();
        buf.extend_from_slice(&body);
        buf
    }
}

fn require_exact_len(body: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if body.len() != needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need exactly {needed} bytes, got {}",
            body.len()
        )))
    } else {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::header::decode_frame;

    fn round_trip(cmd: Command) -> Command {
        let bytes = cmd.encode();
        let (frame, consumed) = decode_frame(&bytes).expect("decode frame");
        assert_eq!(consumed, bytes.len());
        Command::decode(&frame.header, &frame.body).expect("decode command")
    }

    #[test]
    fn test_motor_speed_round_trip_with_negative_speed() {
        let cmd = Command::MotorSpeed(MotorSpeed {
            speed_left: -128,
            speed_right: 127,
        });
        assert_eq!(round_trip(cmd), cmd);
    }

    #[test]
    fn test_motor_settings_round_trip() {
        let cmd = Command::MotorSettings(MotorSettings { stop_distance: 0xBEEF });
        assert_eq!(round_trip(cmd), cmd);
    }

    #[test]
    fn test_motor_stop_encodes_as_bare_header() {
        assert_eq!(Command::MotorStop.encode(), vec![0x04, 0x00, 0x00]);
        assert_eq!(round_trip(Command::MotorStop), Command::MotorStop);
    }

    #[test]
    fn test_motor_settings_body_is_big_endian() {
        let cmd = Command::MotorSettings(MotorSettings { stop_distance: 300 });
        assert_eq!(cmd.encode_body(), vec![0x01, 0x2C]);
    }

    #[test]
    fn test_decode_unknown_type_returns_error() {
        let result = Command::decode(&PacketHeader::new(0x7F, 0), &[]);
        assert_eq!(result, Err(ProtocolError::UnknownPacketType(0x7F)));
    }

    #[test]
    fn test_decode_ack_type_is_not_a_command() {
        let result = Command::decode(&PacketHeader::new(0x01, 0), &[]);
        assert_eq!(result, Err(ProtocolError::UnknownPacketType(0x01)));
    }

    #[test]
    fn test_decode_motor_speed_short_body_is_malformed() {
        let result = Command::decode(&PacketHeader::new(0x03, 1), &[0x01]);
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_decode_motor_stop_with_body_is_malformed() {
        let result = Command::decode(&PacketHeader::new(0x04, 1), &[0x00]);
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_command_id_matches_wire_type() {
        assert_eq!(Command::MotorStop.command_id() as u8, 0x04);
        assert_eq!(CommandId::try_from(0x02), Ok(CommandId::MotorSettings));
        assert_eq!(CommandId::try_from(0x05), Err(()));
    }
}
