//! BER (Basic Encoding Rules) TLV helpers
//!
//! ACSE APDUs are BER encoded, unlike the A-XDR used by xDLMS. Only the
//! single-byte tags and definite lengths that DLMS/COSEM uses are handled.
//!
//! ```text
//! [Tag] [Length] [Value]
//! ```

use dlms_core::{DlmsError, DlmsResult};

/// Universal OCTET STRING tag
pub const OCTET_STRING: u8 = 0x04;
/// Universal OBJECT IDENTIFIER tag
pub const OBJECT_IDENTIFIER: u8 = 0x06;
/// Universal INTEGER tag
pub const INTEGER: u8 = 0x02;

/// Encode a BER definite length
pub fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.push(0x82);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
}

/// Append a TLV triplet
pub fn encode_tlv(tag: u8, value: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    encode_length(value.len(), out);
    out.extend_from_slice(value);
}

/// Build a TLV triplet as a new buffer
pub fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 4);
    encode_tlv(tag, value, &mut out);
    out
}

/// Sequential reader over BER TLV triplets
pub struct BerReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Read the next TLV, `None` when the input is exhausted
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the length runs past the end of the input or
    /// uses an unsupported form.
    pub fn next_tlv(&mut self) -> DlmsResult<Option<(u8, &'a [u8])>> {
        if self.position >= self.data.len() {
            return Ok(None);
        }
        let tag = self.data[self.position];
        self.position += 1;

        let first = *self
            .data
            .get(self.position)
            .ok_or_else(|| DlmsError::InvalidData(format!("BER tag 0x{:02X} has no length", tag)))?;
        self.position += 1;
        let len = if first & 0x80 == 0 {
            first as usize
        } else {
            let count = (first & 0x7F) as usize;
            if count == 0 || count > 2 {
                return Err(DlmsError::InvalidData(format!(
                    "Unsupported BER length form 0x{:02X}",
                    first
                )));
            }
            let bytes = self
                .data
                .get(self.position..self.position + count)
                .ok_or_else(|| DlmsError::InvalidData("Truncated BER length".to_string()))?;
            self.position += count;
            bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize)
        };

        let value = self
            .data
            .get(self.position..self.position + len)
            .ok_or_else(|| {
                DlmsError::InvalidData(format!(
                    "BER value of tag 0x{:02X} needs {} byte(s), {} available",
                    tag,
                    len,
                    self.data.len() - self.position
                ))
            })?;
        self.position += len;
        Ok(Some((tag, value)))
    }

    /// Read the next TLV and require a specific tag
    pub fn expect(&mut self, tag: u8) -> DlmsResult<&'a [u8]> {
        match self.next_tlv()? {
            Some((found, value)) if found == tag => Ok(value),
            Some((found, _)) => Err(DlmsError::InvalidData(format!(
                "Expected BER tag 0x{:02X}, found 0x{:02X}",
                tag, found
            ))),
            None => Err(DlmsError::InvalidData(format!(
                "Expected BER tag 0x{:02X}, found end of data",
                tag
            ))),
        }
    }
}
