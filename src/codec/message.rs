//! Inbound message payloads
//!
//! # Payload layout
//!
//! ## Header (2 bytes):
//!   Byte 0: Tag (message kind)
//!   Byte 1: Version (always 1)
//!
//! ## Bodies (big-endian):
//!   0x01 RiderPosition:    latitude f64, longitude f64, altitude f64
//!   0x02 CommandAvailable: sequence number u32, command type (u16 length + UTF-8)
//!   0x03 ActivityDetails:  rider id u32, activity id u64 (0 = no activity)
//!   0x04 Ping:             rider id u32
//!
//! Trailing bytes after a body are ignored so newer senders can append fields.

use crate::codec::reader::BinaryReader;
use crate::codec::writer::BinaryWriter;
use crate::error::{Error, Result};

pub const PAYLOAD_VERSION: u8 = 1;

/// Message tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    RiderPosition = 0x01,
    CommandAvailable = 0x02,
    ActivityDetails = 0x03,
    Ping = 0x04,
}

impl MessageTag {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::RiderPosition),
            0x02 => Some(Self::CommandAvailable),
            0x03 => Some(Self::ActivityDetails),
            0x04 => Some(Self::Ping),
            _ => None,
        }
    }
}

/// A classified message from the game
#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    RiderPosition {
        latitude: f64,
        longitude: f64,
        altitude: f64,
    },
    CommandAvailable {
        command_type: String,
        sequence_number: u32,
    },
    ActivityDetails {
        rider_id: u32,
        activity_id: u64,
    },
    Ping {
        rider_id: u32,
    },
}

impl GameMessage {
    /// Classify a frame payload
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(payload);
        let raw_tag = reader.read_u8()?;
        let version = reader.read_u8()?;

        let tag = MessageTag::from_u8(raw_tag).ok_or(Error::UnknownMessageTag(raw_tag))?;
        if version != PAYLOAD_VERSION {
            return Err(Error::UnsupportedVersion { tag: raw_tag, version });
        }

        let message = match tag {
            MessageTag::RiderPosition => {
                let latitude = reader.read_f64()?;
                let longitude = reader.read_f64()?;
                let altitude = reader.read_f64()?;
                if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                    return Err(Error::InvalidPayload(format!(
                        "position out of range: {latitude}, {longitude}"
                    )));
                }
                if !altitude.is_finite() {
                    return Err(Error::InvalidPayload(format!("altitude not finite: {altitude}")));
                }
                Self::RiderPosition { latitude, longitude, altitude }
            }
            MessageTag::CommandAvailable => {
                let sequence_number = reader.read_u32()?;
                let command_type = reader.read_string()?;
                Self::CommandAvailable { command_type, sequence_number }
            }
            MessageTag::ActivityDetails => Self::ActivityDetails {
                rider_id: reader.read_u32()?,
                activity_id: reader.read_u64()?,
            },
            MessageTag::Ping => Self::Ping { rider_id: reader.read_u32()? },
        };

        Ok(message)
    }

    pub fn tag(&self) -> MessageTag {
        match self {
            Self::RiderPosition { .. } => MessageTag::RiderPosition,
            Self::CommandAvailable { .. } => MessageTag::CommandAvailable,
            Self::ActivityDetails { .. } => MessageTag::ActivityDetails,
            Self::Ping { .. } => MessageTag::Ping,
        }
    }

    /// Serialize to a payload (without the length prefix)
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = BinaryWriter::with_capacity(32);
        writer.write_u8(self.tag() as u8);
        writer.write_u8(PAYLOAD_VERSION);

        match self {
            Self::RiderPosition { latitude, longitude, altitude } => {
                writer.write_f64(*latitude);
                writer.write_f64(*longitude);
                writer.write_f64(*altitude);
            }
            Self::CommandAvailable { command_type, sequence_number } => {
                writer.write_u32(*sequence_number);
                writer.write_string(command_type)?;
            }
            Self::ActivityDetails { rider_id, activity_id } => {
                writer.write_u32(*rider_id);
                writer.write_u64(*activity_id);
            }
            Self::Ping { rider_id } => writer.write_u32(*rider_id),
        }

        Ok(writer.into_vec())
    }
}
