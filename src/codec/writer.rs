use byteorder::{BigEndian, ByteOrder};

use crate::codec::reader::MAX_STRING_LEN;
use crate::error::{Error, Result};

/// Big-endian writer for outbound payloads and frames
pub struct BinaryWriter {
    data: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity) }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, v);
        self.write_bytes(&buf);
    }

    pub fn write_u32(&mut self, v: u32) {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, v);
        self.write_bytes(&buf);
    }

    pub fn write_u64(&mut self, v: u64) {
        let mut buf = [0u8; 8];
        BigEndian::write_u64(&mut buf, v);
        self.write_bytes(&buf);
    }

    pub fn write_f64(&mut self, v: f64) {
        let mut buf = [0u8; 8];
        BigEndian::write_f64(&mut buf, v);
        self.write_bytes(&buf);
    }

    /// Write a string prefixed with its u16 byte length
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        if s.len() > MAX_STRING_LEN {
            return Err(Error::StringTooLong { len: s.len(), max: MAX_STRING_LEN });
        }
        self.write_u16(s.len() as u16);
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::reader::BinaryReader;

    #[test]
    fn test_big_endian_layout() {
        let mut writer = BinaryWriter::new();
        writer.write_u16(0x0102);
        writer.write_u32(0xDEADBEEF);
        assert_eq!(writer.as_slice(), &[0x01, 0x02, 0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_roundtrip_string_and_float() {
        let mut writer = BinaryWriter::new();
        writer.write_string("turnleft").unwrap();
        writer.write_f64(166.95);

        let data = writer.into_vec();
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_string().unwrap(), "turnleft");
        assert_eq!(reader.read_f64().unwrap(), 166.95);
    }

    #[test]
    fn test_string_too_long() {
        let long = "x".repeat(MAX_STRING_LEN + 1);
        let mut writer = BinaryWriter::new();
        assert!(matches!(
            writer.write_string(&long),
            Err(Error::StringTooLong { .. })
        ));
        assert!(writer.is_empty());
    }
}
