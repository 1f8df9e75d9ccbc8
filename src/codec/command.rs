//! Outbound commands sent back to the game
//!
//!   0x10 Turn:    sequence number u32, direction u8 (1 left, 2 straight, 3 right)
//!   0x11 Pairing: rider id u32, sequence number u32
//!
//! Both use the same `[tag][version]` header as inbound payloads and are
//! written length-prefixed.

use bytes::Bytes;

use crate::codec::frame::encode_frame;
use crate::codec::message::PAYLOAD_VERSION;
use crate::codec::reader::BinaryReader;
use crate::codec::writer::BinaryWriter;
use crate::error::{Error, Result};
use crate::state::TurnDirection;

pub const TAG_TURN: u8 = 0x10;
pub const TAG_PAIRING: u8 = 0x11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundCommand {
    Turn {
        direction: TurnDirection,
        sequence_number: u32,
    },
    InitialPairing {
        rider_id: u32,
        sequence_number: u32,
    },
}

impl OutboundCommand {
    pub fn payload(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::with_capacity(10);
        match *self {
            Self::Turn { direction, sequence_number } => {
                writer.write_u8(TAG_TURN);
                writer.write_u8(PAYLOAD_VERSION);
                writer.write_u32(sequence_number);
                writer.write_u8(direction.wire_code());
            }
            Self::InitialPairing { rider_id, sequence_number } => {
                writer.write_u8(TAG_PAIRING);
                writer.write_u8(PAYLOAD_VERSION);
                writer.write_u32(rider_id);
                writer.write_u32(sequence_number);
            }
        }
        writer.into_vec()
    }

    /// Length-prefixed bytes ready for the transport
    pub fn encode(&self) -> Result<Bytes> {
        encode_frame(&self.payload())
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(payload);
        let tag = reader.read_u8()?;
        let version = reader.read_u8()?;
        if version != PAYLOAD_VERSION {
            return Err(Error::UnsupportedVersion { tag, version });
        }
        match tag {
            TAG_TURN => {
                let sequence_number = reader.read_u32()?;
                let code = reader.read_u8()?;
                let direction = TurnDirection::from_wire_code(code)
                    .ok_or_else(|| Error::InvalidPayload(format!("invalid turn direction: {code}")))?;
                Ok(Self::Turn { direction, sequence_number })
            }
            TAG_PAIRING => Ok(Self::InitialPairing {
                rider_id: reader.read_u32()?,
                sequence_number: reader.read_u32()?,
            }),
            other => Err(Error::UnknownMessageTag(other)),
        }
    }
}
