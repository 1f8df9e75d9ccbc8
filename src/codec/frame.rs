//! Length-prefixed framing
//!
//! Every message on the companion stream is sent as:
//!
//!   `[u16 BE payload length][payload]`
//!
//! Reads from the transport land on arbitrary boundaries, so the decoder
//! buffers whatever it cannot decode yet and picks up again on the next push.
//! A payload of a single byte cannot hold a tag and a version and is dropped.

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::codec::writer::BinaryWriter;
use crate::error::{Error, Result};

/// Size of the length prefix
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Largest payload a frame can describe
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Incremental frame decoder
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }

    /// Append received bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet decoded
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete payload, or `None` if more data is needed
    pub fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            if self.buf.len() < LENGTH_PREFIX_LEN {
                return None;
            }

            let len = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;
            if self.buf.len() < LENGTH_PREFIX_LEN + len {
                trace!(need = len, have = self.buf.len() - LENGTH_PREFIX_LEN, "partial frame");
                return None;
            }

            self.buf.advance(LENGTH_PREFIX_LEN);
            let payload = self.buf.split_to(len).freeze();

            if len == 1 {
                debug!(byte = payload[0], "dropping single-byte frame");
                continue;
            }

            return Some(payload);
        }
    }

    /// Push `data` and drain every payload that became complete
    pub fn decode(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.push(data);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Close the decoder at end of stream
    ///
    /// Leftover bytes mean the stream ended inside a frame.
    pub fn finish(self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(Error::MalformedStream { remaining: self.buf.len() })
        }
    }
}

/// Prefix `payload` with its big-endian length
pub fn encode_frame(payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::FrameTooLarge { len: payload.len(), max: MAX_PAYLOAD_LEN });
    }
    let mut writer = BinaryWriter::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    writer.write_u16(payload.len() as u16);
    writer.write_bytes(payload);
    Ok(Bytes::from(writer.into_vec()))
}
