//! A-XDR decoder for DLMS/COSEM

use crate::axdr::types::{AxdrTag, LengthEncoding};
use dlms_core::{CosemDateTime, DataObject, DlmsError, DlmsResult};

/// Nesting limit for arrays and structures
const MAX_DEPTH: usize = 32;

/// A-XDR decoder for decoding DLMS/COSEM data types
pub struct AxdrDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> AxdrDecoder<'a> {
    /// Create a new decoder
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Decode a tagged DataObject
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` on an unknown tag, truncated input, a compact
    /// array or nesting deeper than the decoder accepts.
    pub fn decode_data_object(&mut self) -> DlmsResult<DataObject> {
        self.decode_nested(0)
    }

    fn decode_nested(&mut self, depth: usize) -> DlmsResult<DataObject> {
        if depth > MAX_DEPTH {
            return Err(DlmsError::InvalidData(
                "A-XDR data nested too deeply".to_string(),
            ));
        }

        let tag = AxdrTag::from_u8(self.decode_u8()?)?;
        let value = match tag {
            AxdrTag::Null | AxdrTag::DontCare => DataObject::Null,
            AxdrTag::Boolean => DataObject::Boolean(self.decode_u8()? != 0x00),
            AxdrTag::Integer8 => DataObject::Integer8(self.decode_u8()? as i8),
            AxdrTag::Integer16 => DataObject::Integer16(i16::from_be_bytes(self.read_array()?)),
            AxdrTag::Integer32 => DataObject::Integer32(i32::from_be_bytes(self.read_array()?)),
            AxdrTag::Integer64 => DataObject::Integer64(i64::from_be_bytes(self.read_array()?)),
            AxdrTag::Unsigned8 => DataObject::Unsigned8(self.decode_u8()?),
            AxdrTag::Unsigned16 => DataObject::Unsigned16(self.decode_u16()?),
            AxdrTag::Unsigned32 => DataObject::Unsigned32(self.decode_u32()?),
            AxdrTag::Unsigned64 => DataObject::Unsigned64(u64::from_be_bytes(self.read_array()?)),
            AxdrTag::Float32 => {
                DataObject::Float32(f32::from_bits(u32::from_be_bytes(self.read_array()?)))
            }
            AxdrTag::Float64 => {
                DataObject::Float64(f64::from_bits(u64::from_be_bytes(self.read_array()?)))
            }
            AxdrTag::Enumerate => DataObject::Enumerate(self.decode_u8()?),
            AxdrTag::Bcd => DataObject::Bcd(self.decode_u8()?),
            AxdrTag::OctetString => DataObject::OctetString(self.decode_octet_string()?),
            AxdrTag::VisibleString => DataObject::VisibleString(self.decode_octet_string()?),
            AxdrTag::Utf8String => DataObject::Utf8String(self.decode_octet_string()?),
            AxdrTag::BitString => {
                let bits = self.decode_length()?;
                let bytes = self.read_bytes(bits.div_ceil(8))?.to_vec();
                DataObject::BitString { bits, bytes }
            }
            AxdrTag::Array | AxdrTag::Structure => {
                let count = self.decode_length()?;
                // Each element takes at least one byte.
                if count > self.remaining() {
                    return Err(DlmsError::InvalidData(format!(
                        "A-XDR sequence of {} elements exceeds the {} remaining bytes",
                        count,
                        self.remaining()
                    )));
                }
                let mut elements = Vec::with_capacity(count);
                for _ in 0..count {
                    elements.push(self.decode_nested(depth + 1)?);
                }
                if tag == AxdrTag::Array {
                    DataObject::Array(elements)
                } else {
                    DataObject::Structure(elements)
                }
            }
            AxdrTag::CompactArray => {
                return Err(DlmsError::InvalidData(
                    "CompactArray decoding is not supported".to_string(),
                ));
            }
            AxdrTag::Date => DataObject::Date(self.read_bytes(5)?.to_vec()),
            AxdrTag::Time => DataObject::Time(self.read_bytes(4)?.to_vec()),
            AxdrTag::DateTime => {
                DataObject::DateTime(CosemDateTime::decode(self.read_bytes(CosemDateTime::LENGTH)?)?)
            }
        };
        Ok(value)
    }

    /// Decode a u8
    pub fn decode_u8(&mut self) -> DlmsResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Decode a u16 (big-endian)
    pub fn decode_u16(&mut self) -> DlmsResult<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Decode a u32 (big-endian)
    pub fn decode_u32(&mut self) -> DlmsResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Decode a variable-length quantity
    pub fn decode_length(&mut self) -> DlmsResult<usize> {
        let (LengthEncoding(len), consumed) = LengthEncoding::decode(&self.buffer[self.position..])?;
        self.position += consumed;
        Ok(len)
    }

    /// Decode an octet string (length prefix + content, no tag)
    pub fn decode_octet_string(&mut self) -> DlmsResult<Vec<u8>> {
        let len = self.decode_length()?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// Borrow the next `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> DlmsResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| {
                DlmsError::InvalidData(format!(
                    "Unexpected end of A-XDR data: need {} byte(s) at offset {}, have {}",
                    len,
                    self.position,
                    self.remaining()
                ))
            })?;
        let bytes = &self.buffer[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> DlmsResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Get the current position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// The bytes not yet consumed
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.position..]
    }
}
