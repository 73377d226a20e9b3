//! Wrapper session layer for DLMS/COSEM over TCP/UDP (IEC 62056-47)
//!
//! Every APDU is prefixed with an 8-byte header; there is no link
//! establishment and no disconnect frame.

use crate::framing::FrameStatus;
use dlms_core::{DlmsError, DlmsResult};

/// Wrapper header length
pub const WRAPPER_HEADER_LENGTH: usize = 8;

const WRAPPER_VERSION: u16 = 0x0001;

/// Wrapper header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperHeader {
    source_wport: u16,
    destination_wport: u16,
    length: u16,
}

impl WrapperHeader {
    pub fn new(source_wport: u16, destination_wport: u16, length: u16) -> Self {
        Self {
            source_wport,
            destination_wport,
            length,
        }
    }

    /// Encode header to bytes (big-endian)
    pub fn encode(&self) -> [u8; WRAPPER_HEADER_LENGTH] {
        let mut result = [0u8; WRAPPER_HEADER_LENGTH];
        result[0..2].copy_from_slice(&WRAPPER_VERSION.to_be_bytes());
        result[2..4].copy_from_slice(&self.source_wport.to_be_bytes());
        result[4..6].copy_from_slice(&self.destination_wport.to_be_bytes());
        result[6..8].copy_from_slice(&self.length.to_be_bytes());
        result
    }

    /// Decode header from bytes
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        if data.len() < WRAPPER_HEADER_LENGTH {
            return Err(DlmsError::InvalidData(format!(
                "Wrapper header too short: expected {}, got {}",
                WRAPPER_HEADER_LENGTH,
                data.len()
            )));
        }

        let version = u16::from_be_bytes([data[0], data[1]]);
        if version != WRAPPER_VERSION {
            return Err(DlmsError::FrameInvalid(format!(
                "Header version was {}, this stack is only compatible to version 1",
                version
            )));
        }

        Ok(Self {
            source_wport: u16::from_be_bytes([data[2], data[3]]),
            destination_wport: u16::from_be_bytes([data[4], data[5]]),
            length: u16::from_be_bytes([data[6], data[7]]),
        })
    }

    pub fn source_wport(&self) -> u16 {
        self.source_wport
    }

    pub fn destination_wport(&self) -> u16 {
        self.destination_wport
    }

    /// Get payload length
    pub fn payload_length(&self) -> u16 {
        self.length
    }
}

/// Client-side wrapper framing between one client and one logical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperFraming {
    client_wport: u16,
    server_wport: u16,
}

impl WrapperFraming {
    pub fn new(client_wport: u16, server_wport: u16) -> Self {
        Self {
            client_wport,
            server_wport,
        }
    }

    /// Prefix an APDU with the wrapper header
    pub fn wrap(&self, apdu: &[u8]) -> DlmsResult<Vec<u8>> {
        let length = u16::try_from(apdu.len()).map_err(|_| {
            DlmsError::InvalidData(format!("APDU of {} bytes exceeds wrapper length", apdu.len()))
        })?;
        let mut frame = Vec::with_capacity(WRAPPER_HEADER_LENGTH + apdu.len());
        frame.extend_from_slice(&WrapperHeader::new(self.client_wport, self.server_wport, length).encode());
        frame.extend_from_slice(apdu);
        Ok(frame)
    }

    /// Strip the header from a complete server frame
    ///
    /// # Errors
    ///
    /// `FrameInvalid` when the frame is not addressed to this client or the
    /// payload is shorter than the header announces.
    pub fn unwrap(&self, frame: &[u8]) -> DlmsResult<Vec<u8>> {
        let header = WrapperHeader::decode(frame)?;
        if header.destination_wport != self.client_wport {
            return Err(DlmsError::FrameInvalid(format!(
                "Frame addressed to wport {}, expected {}",
                header.destination_wport, self.client_wport
            )));
        }
        let end = WRAPPER_HEADER_LENGTH + header.length as usize;
        frame
            .get(WRAPPER_HEADER_LENGTH..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                DlmsError::FrameInvalid(format!(
                    "Wrapper payload truncated: {} of {} byte(s)",
                    frame.len() - WRAPPER_HEADER_LENGTH,
                    header.length
                ))
            })
    }

    /// Whether `data` holds a complete wrapper frame
    pub fn frame_status(data: &[u8]) -> DlmsResult<FrameStatus> {
        if data.len() < WRAPPER_HEADER_LENGTH {
            return Ok(FrameStatus::Incomplete {
                missing: WRAPPER_HEADER_LENGTH - data.len(),
            });
        }
        let total = WRAPPER_HEADER_LENGTH + WrapperHeader::decode(data)?.length as usize;
        if data.len() < total {
            Ok(FrameStatus::Incomplete {
                missing: total - data.len(),
            })
        } else {
            Ok(FrameStatus::Complete)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_prefixes_header() {
        let framing = WrapperFraming::new(0x10, 0x01);
        assert_eq!(
            framing.wrap(&[0xC0, 0x01]).unwrap(),
            vec![0x00, 0x01, 0x00, 0x10, 0x00, 0x01, 0x00, 0x02, 0xC0, 0x01]
        );
    }

    #[test]
    fn test_frame_status_counts_missing_payload() {
        let frame = [0x00, 0x01, 0x00, 0x01, 0x00, 0x10, 0x00, 0x05, 0xC4, 0x01];
        assert_eq!(
            WrapperFraming::frame_status(&frame[..3]).unwrap(),
            FrameStatus::Incomplete { missing: 5 }
        );
        assert_eq!(
            WrapperFraming::frame_status(&frame).unwrap(),
            FrameStatus::Incomplete { missing: 3 }
        );
        assert!(WrapperFraming::frame_status(&[0x00, 0x02, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_unwrap_checks_destination() {
        let framing = WrapperFraming::new(0x10, 0x01);
        let reply = [0x00, 0x01, 0x00, 0x01, 0x00, 0x10, 0x00, 0x01, 0x0E];
        assert_eq!(framing.unwrap(&reply).unwrap(), vec![0x0E]);

        let other = WrapperFraming::new(0x20, 0x01);
        assert!(other.unwrap(&reply).is_err());
    }
}
