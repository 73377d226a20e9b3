//! Short Name (SN) Addressing PDU types for DLMS/COSEM
//!
//! With SN referencing an attribute is addressed by a 2-byte variable name
//! derived from the object's base name, and read with ReadRequest instead
//! of GET.
//!
//! | SN PDU | LN PDU Equivalent | Tag |
//! |--------|------------------|-----|
//! | ReadRequest | GetRequest | 0x05 |
//! | ReadResponse | GetResponse | 0x0C |

use crate::pdu::tag;
use crate::service::{BlockAssembler, GetOutcome};
use dlms_asn1::{AxdrDecoder, AxdrEncoder};
use dlms_core::{DataObject, DlmsError, DlmsResult};

/// Short Name address (2 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortName(pub u16);

impl ShortName {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Variable name of attribute `index` of the object with this base name
    ///
    /// Attributes are 8 apart, attribute 1 sits at the base name itself.
    #[must_use]
    pub const fn attribute(&self, index: u8) -> Self {
        Self(self.0.wrapping_add((index.saturating_sub(1) as u16) * 8))
    }

    #[must_use]
    pub const fn value(&self) -> u16 {
        self.0
    }
}

impl From<u16> for ShortName {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// SN ReadRequest with a single variable access specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRequest {
    /// Read a variable by name
    VariableName(ShortName),
    /// Ask for the block following `block_number`
    BlockNumberAccess(u16),
}

impl ReadRequest {
    /// Encode to A-XDR format
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = AxdrEncoder::with_capacity(5);
        encoder.encode_u8(tag::READ_REQUEST);
        encoder.encode_u8(0x01);
        match self {
            ReadRequest::VariableName(name) => {
                encoder.encode_u8(0x02);
                encoder.encode_u16(name.value());
            }
            ReadRequest::BlockNumberAccess(block_number) => {
                encoder.encode_u8(0x05);
                encoder.encode_u16(*block_number);
            }
        }
        encoder.into_bytes()
    }
}

/// One item of a ReadResponse
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResponse {
    Data(DataObject),
    DataAccessError(u8),
    DataBlockResult {
        last_block: bool,
        block_number: u16,
        raw_data: Vec<u8>,
    },
}

impl ReadResponse {
    /// Decode a ReadResponse carrying exactly one item
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut decoder = AxdrDecoder::new(data);
        let pdu_tag = decoder.decode_u8()?;
        if pdu_tag != tag::READ_RESPONSE {
            return Err(DlmsError::InvalidData(format!(
                "Expected ReadResponse tag 0x0C, got 0x{:02X}",
                pdu_tag
            )));
        }
        let count = decoder.decode_length()?;
        if count != 1 {
            return Err(DlmsError::InvalidData(format!(
                "Expected one ReadResponse item, got {}",
                count
            )));
        }
        match decoder.decode_u8()? {
            0x00 => Ok(ReadResponse::Data(decoder.decode_data_object()?)),
            0x01 => Ok(ReadResponse::DataAccessError(decoder.decode_u8()?)),
            0x02 => Ok(ReadResponse::DataBlockResult {
                last_block: decoder.decode_u8()? != 0,
                block_number: decoder.decode_u16()?,
                raw_data: decoder.decode_octet_string()?,
            }),
            other => Err(DlmsError::InvalidData(format!(
                "Unsupported ReadResponse choice: {}",
                other
            ))),
        }
    }

    /// Encode to A-XDR format
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = AxdrEncoder::new();
        encoder.encode_u8(tag::READ_RESPONSE);
        encoder.encode_u8(0x01);
        match self {
            ReadResponse::Data(data) => {
                encoder.encode_u8(0x00);
                encoder.encode_data_object(data);
            }
            ReadResponse::DataAccessError(code) => {
                encoder.encode_u8(0x01);
                encoder.encode_u8(*code);
            }
            ReadResponse::DataBlockResult {
                last_block,
                block_number,
                raw_data,
            } => {
                encoder.encode_u8(0x02);
                encoder.encode_u8(u8::from(*last_block));
                encoder.encode_u16(*block_number);
                encoder.encode_octet_string(raw_data);
            }
        }
        encoder.into_bytes()
    }
}

/// READ service for short name referencing
#[derive(Debug, Clone, Default)]
pub struct ReadService {
    blocks: BlockAssembler,
}

impl ReadService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_request(&mut self, name: ShortName) -> ReadRequest {
        self.blocks.reset();
        ReadRequest::VariableName(name)
    }

    pub fn next_request(&self, block_number: u16) -> ReadRequest {
        ReadRequest::BlockNumberAccess(block_number)
    }

    /// Fold a response into the read in progress
    pub fn process_response(&mut self, response: &ReadResponse) -> DlmsResult<GetOutcome> {
        match response {
            ReadResponse::Data(data) => Ok(GetOutcome::Complete(data.clone())),
            ReadResponse::DataAccessError(code) => {
                self.blocks.reset();
                Ok(GetOutcome::Failed(*code))
            }
            ReadResponse::DataBlockResult {
                last_block,
                block_number,
                raw_data,
            } => {
                self.blocks.push(u32::from(*block_number), raw_data)?;
                if *last_block {
                    Ok(GetOutcome::Complete(self.blocks.finish()?))
                } else {
                    Ok(GetOutcome::NextBlock(u32::from(*block_number)))
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.blocks.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_short_name() {
        let base = ShortName::new(0x2BC0);
        assert_eq!(base.attribute(1), ShortName::new(0x2BC0));
        assert_eq!(base.attribute(2), ShortName::new(0x2BC8));
    }

    #[test]
    fn test_read_request_encoding() {
        assert_eq!(
            ReadRequest::VariableName(ShortName::new(0x2BC8)).encode(),
            vec![0x05, 0x01, 0x02, 0x2B, 0xC8]
        );
        assert_eq!(
            ReadRequest::BlockNumberAccess(1).encode(),
            vec![0x05, 0x01, 0x05, 0x00, 0x01]
        );
    }

    #[test]
    fn test_read_response_decoding() {
        assert_eq!(
            ReadResponse::decode(&[0x0C, 0x01, 0x00, 0x12, 0x00, 0xE6]).unwrap(),
            ReadResponse::Data(DataObject::Unsigned16(230))
        );
        assert_eq!(
            ReadResponse::decode(&[0x0C, 0x01, 0x01, 0x03]).unwrap(),
            ReadResponse::DataAccessError(3)
        );
        assert!(ReadResponse::decode(&[0x0C, 0x02, 0x01, 0x03, 0x01, 0x03]).is_err());
    }

    #[test]
    fn test_block_read() {
        let mut service = ReadService::new();
        service.read_request(ShortName::new(0x2BC8));
        let first = ReadResponse::DataBlockResult {
            last_block: false,
            block_number: 1,
            raw_data: vec![0x12],
        };
        assert_eq!(service.process_response(&first).unwrap(), GetOutcome::NextBlock(1));
        let last = ReadResponse::DataBlockResult {
            last_block: true,
            block_number: 2,
            raw_data: vec![0x00, 0xE6],
        };
        assert_eq!(
            service.process_response(&last).unwrap(),
            GetOutcome::Complete(DataObject::Unsigned16(230))
        );
    }
}
