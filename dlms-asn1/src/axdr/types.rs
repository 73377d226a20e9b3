//! A-XDR types for DLMS/COSEM

use dlms_core::{DlmsError, DlmsResult};

/// A-XDR tag values for different data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxdrTag {
    Null = 0x00,
    Array = 0x01,
    Structure = 0x02,
    Boolean = 0x03,
    BitString = 0x04,
    Integer32 = 0x05,
    Unsigned32 = 0x06,
    OctetString = 0x09,
    VisibleString = 0x0A,
    Utf8String = 0x0C,
    Bcd = 0x0D,
    Integer8 = 0x0F,
    Integer16 = 0x10,
    Unsigned8 = 0x11,
    Unsigned16 = 0x12,
    CompactArray = 0x13,
    Integer64 = 0x14,
    Unsigned64 = 0x15,
    Enumerate = 0x16,
    Float32 = 0x17,
    Float64 = 0x18,
    DateTime = 0x19,
    Date = 0x1A,
    Time = 0x1B,
    DontCare = 0xFF,
}

impl AxdrTag {
    /// Get tag from u8 value
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        let tag = match value {
            0x00 => AxdrTag::Null,
            0x01 => AxdrTag::Array,
            0x02 => AxdrTag::Structure,
            0x03 => AxdrTag::Boolean,
            0x04 => AxdrTag::BitString,
            0x05 => AxdrTag::Integer32,
            0x06 => AxdrTag::Unsigned32,
            0x09 => AxdrTag::OctetString,
            0x0A => AxdrTag::VisibleString,
            0x0C => AxdrTag::Utf8String,
            0x0D => AxdrTag::Bcd,
            0x0F => AxdrTag::Integer8,
            0x10 => AxdrTag::Integer16,
            0x11 => AxdrTag::Unsigned8,
            0x12 => AxdrTag::Unsigned16,
            0x13 => AxdrTag::CompactArray,
            0x14 => AxdrTag::Integer64,
            0x15 => AxdrTag::Unsigned64,
            0x16 => AxdrTag::Enumerate,
            0x17 => AxdrTag::Float32,
            0x18 => AxdrTag::Float64,
            0x19 => AxdrTag::DateTime,
            0x1A => AxdrTag::Date,
            0x1B => AxdrTag::Time,
            0xFF => AxdrTag::DontCare,
            _ => {
                return Err(DlmsError::InvalidData(format!(
                    "Unknown A-XDR tag: 0x{:02X}",
                    value
                )));
            }
        };
        Ok(tag)
    }

    /// Convert tag to u8 value
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Variable-length quantity used for octet-string, array and structure lengths
///
/// Lengths below 128 take one byte; longer ones are prefixed with
/// `0x80 | n` followed by `n` big-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthEncoding(pub usize);

impl LengthEncoding {
    /// Encode length to bytes
    pub fn encode(&self) -> Vec<u8> {
        let len = self.0;
        if len < 0x80 {
            return vec![len as u8];
        }
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect();
        let mut result = Vec::with_capacity(bytes.len() + 1);
        result.push(0x80 | bytes.len() as u8);
        result.extend_from_slice(&bytes);
        result
    }

    /// Decode length from bytes, returning the length and the bytes consumed
    pub fn decode(bytes: &[u8]) -> DlmsResult<(Self, usize)> {
        let first_byte = *bytes
            .first()
            .ok_or_else(|| DlmsError::InvalidData("Not enough bytes for length".to_string()))?;
        if first_byte & 0x80 == 0 {
            return Ok((LengthEncoding(first_byte as usize), 1));
        }

        let length_of_length = (first_byte & 0x7F) as usize;
        if length_of_length == 0 || length_of_length > 4 {
            return Err(DlmsError::InvalidData(format!(
                "Invalid length-of-length: {}",
                length_of_length
            )));
        }
        let Some(len_bytes) = bytes.get(1..1 + length_of_length) else {
            return Err(DlmsError::InvalidData(
                "Not enough bytes for long length".to_string(),
            ));
        };
        let len = len_bytes
            .iter()
            .fold(0usize, |acc, &byte| (acc << 8) | byte as usize);
        Ok((LengthEncoding(len), 1 + length_of_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_encoding_short() {
        assert_eq!(LengthEncoding(10).encode(), vec![10]);
        assert_eq!(LengthEncoding::decode(&[10, 0xAA]).unwrap(), (LengthEncoding(10), 1));
    }

    #[test]
    fn test_length_encoding_long() {
        assert_eq!(LengthEncoding(200).encode(), vec![0x81, 200]);
        assert_eq!(LengthEncoding(256).encode(), vec![0x82, 0x01, 0x00]);
        let (decoded, consumed) = LengthEncoding::decode(&[0x82, 0x01, 0x00]).unwrap();
        assert_eq!(decoded, LengthEncoding(256));
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_length_encoding_truncated() {
        assert!(LengthEncoding::decode(&[]).is_err());
        assert!(LengthEncoding::decode(&[0x82, 0x01]).is_err());
        assert!(LengthEncoding::decode(&[0x85, 0, 0, 0, 0, 1]).is_err());
    }

    #[test]
    fn test_unknown_tag() {
        assert!(AxdrTag::from_u8(0x07).is_err());
        assert_eq!(AxdrTag::from_u8(0x12).unwrap(), AxdrTag::Unsigned16);
    }
}
