//! HDLC frame structure and encoding/decoding
//!
//! ```text
//! 7E | format(2) | dst | src | control | [HCS(2) | information] | FCS(2) | 7E
//! ```
//!
//! The format field is `1010 S LLL LLLLLLLL`: frame type 3, segmentation
//! bit and an 11-bit length counted without the flags.

use crate::framing::FrameStatus;
use crate::hdlc::address::HdlcAddress;
use crate::hdlc::fcs;
use dlms_core::{DlmsError, DlmsResult};

/// HDLC frame flag
pub const FLAG: u8 = 0x7E;

/// LLC header prefixed to client APDUs
pub const LLC_REQUEST: [u8; 3] = [0xE6, 0xE6, 0x00];

/// LLC header prefixed to server APDUs
pub const LLC_RESPONSE: [u8; 3] = [0xE6, 0xE7, 0x00];

const FORMAT_TYPE: u8 = 0xA0;
const SEGMENTATION_BIT: u8 = 0x08;
const POLL_FINAL: u8 = 0x10;
/// Smallest frame: flag, format(2), two 1-byte addresses, control, FCS(2), flag
const MIN_FRAME_LENGTH: usize = 9;

/// HDLC frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Information,
    ReceiveReady,
    ReceiveNotReady,
    SetNormalResponseMode,
    Disconnect,
    UnnumberedAcknowledge,
    DisconnectMode,
    FrameReject,
    UnnumberedInformation,
    InvalidType,
}

impl FrameType {
    /// Get frame type from control byte
    pub fn from_control_byte(control_byte: u8) -> Self {
        match control_byte {
            x if x & 0x01 == 0x00 => FrameType::Information,
            x if x & 0x0F == 0x01 => FrameType::ReceiveReady,
            x if x & 0x0F == 0x05 => FrameType::ReceiveNotReady,
            x if x & 0xEF == 0x83 => FrameType::SetNormalResponseMode,
            x if x & 0xEF == 0x43 => FrameType::Disconnect,
            x if x & 0xEF == 0x63 => FrameType::UnnumberedAcknowledge,
            x if x & 0xEF == 0x0F => FrameType::DisconnectMode,
            x if x & 0xEF == 0x87 => FrameType::FrameReject,
            x if x & 0xEF == 0x03 => FrameType::UnnumberedInformation,
            _ => FrameType::InvalidType,
        }
    }
}

/// Control byte builders, all with the poll bit set
pub mod control {
    use super::POLL_FINAL;

    pub const SNRM: u8 = 0x83 | POLL_FINAL;
    pub const DISC: u8 = 0x43 | POLL_FINAL;
    pub const UA: u8 = 0x63 | POLL_FINAL;
    pub const DM: u8 = 0x0F | POLL_FINAL;

    /// I-frame with send sequence `ns` and receive sequence `nr`
    pub fn information(ns: u8, nr: u8) -> u8 {
        ((nr & 0x07) << 5) | POLL_FINAL | ((ns & 0x07) << 1)
    }

    /// RR frame acknowledging up to `nr`
    pub fn receive_ready(nr: u8) -> u8 {
        ((nr & 0x07) << 5) | POLL_FINAL | 0x01
    }
}

/// HDLC frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcFrame {
    pub destination: HdlcAddress,
    pub source: HdlcAddress,
    pub control: u8,
    /// More segments of the same APDU follow
    pub segmented: bool,
    pub information: Vec<u8>,
}

impl HdlcFrame {
    pub fn new(destination: HdlcAddress, source: HdlcAddress, control: u8) -> Self {
        Self {
            destination,
            source,
            control,
            segmented: false,
            information: Vec::new(),
        }
    }

    pub fn with_information(mut self, information: Vec<u8>, segmented: bool) -> Self {
        self.information = information;
        self.segmented = segmented;
        self
    }

    pub fn frame_type(&self) -> FrameType {
        FrameType::from_control_byte(self.control)
    }

    /// N(S) of an I-frame
    pub fn send_sequence(&self) -> u8 {
        (self.control >> 1) & 0x07
    }

    /// N(R) of an I, RR or RNR frame
    pub fn receive_sequence(&self) -> u8 {
        (self.control >> 5) & 0x07
    }

    /// Encode to bytes, flags included
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the frame does not fit the 11-bit length field.
    pub fn encode(&self) -> DlmsResult<Vec<u8>> {
        let dst = self.destination.encode();
        let src = self.source.encode();
        let info_len = if self.information.is_empty() {
            0
        } else {
            self.information.len() + 2
        };
        let length = 2 + dst.len() + src.len() + 1 + info_len + 2;
        if length > 0x7FF {
            return Err(DlmsError::InvalidData(format!(
                "HDLC frame length {} exceeds 2047",
                length
            )));
        }

        let mut frame = Vec::with_capacity(length + 2);
        frame.push(FLAG);
        let segmentation = if self.segmented { SEGMENTATION_BIT } else { 0 };
        frame.push(FORMAT_TYPE | segmentation | ((length >> 8) as u8 & 0x07));
        frame.push(length as u8);
        frame.extend_from_slice(&dst);
        frame.extend_from_slice(&src);
        frame.push(self.control);
        if !self.information.is_empty() {
            let hcs = fcs::checksum(&frame[1..]);
            frame.extend_from_slice(&hcs);
            frame.extend_from_slice(&self.information);
        }
        let fcs = fcs::checksum(&frame[1..]);
        frame.extend_from_slice(&fcs);
        frame.push(FLAG);
        Ok(frame)
    }

    /// Decode one complete frame, flags included
    ///
    /// # Errors
    ///
    /// Returns `FrameInvalid` on a bad flag, format, length, HCS or FCS.
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let start = data
            .iter()
            .position(|b| *b == FLAG)
            .ok_or_else(|| DlmsError::FrameInvalid("No HDLC opening flag".to_string()))?;
        let data = &data[start..];
        let length = match frame_length(data)? {
            Some(length) if data.len() >= length => length,
            _ => {
                return Err(DlmsError::FrameInvalid(format!(
                    "Truncated HDLC frame of {} byte(s)",
                    data.len()
                )));
            }
        };
        if data[length - 1] != FLAG {
            return Err(DlmsError::FrameInvalid("No HDLC closing flag".to_string()));
        }

        let body = &data[1..length - 1];
        fcs::verify(body)?;
        let segmented = body[0] & SEGMENTATION_BIT != 0;

        let (destination, dst_len) = HdlcAddress::decode(&body[2..])?;
        let (source, src_len) = HdlcAddress::decode(&body[2 + dst_len..])?;
        let control_pos = 2 + dst_len + src_len;
        let control = *body
            .get(control_pos)
            .ok_or_else(|| DlmsError::FrameInvalid("HDLC frame has no control field".to_string()))?;

        // Remaining: FCS only, or HCS + information + FCS.
        let rest = &body[control_pos + 1..];
        let information = if rest.len() > 2 {
            if rest.len() < 4 {
                return Err(DlmsError::FrameInvalid("Truncated HDLC header check".to_string()));
            }
            fcs::verify(&body[..control_pos + 3])?;
            rest[2..rest.len() - 2].to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            destination,
            source,
            control,
            segmented,
            information,
        })
    }
}

/// Full frame length including both flags, once the format field is available
fn frame_length(data: &[u8]) -> DlmsResult<Option<usize>> {
    if data.len() < 3 {
        return Ok(None);
    }
    if data[1] & 0xF0 != FORMAT_TYPE {
        return Err(DlmsError::FrameInvalid(format!(
            "Unknown HDLC frame format 0x{:02X}",
            data[1]
        )));
    }
    let length = (((data[1] & 0x07) as usize) << 8) | data[2] as usize;
    if length + 2 < MIN_FRAME_LENGTH {
        return Err(DlmsError::FrameInvalid(format!(
            "HDLC frame length {} is too short",
            length
        )));
    }
    Ok(Some(length + 2))
}

/// Whether `data` holds a complete HDLC frame
///
/// Bytes before the opening flag are ignored.
pub fn frame_status(data: &[u8]) -> DlmsResult<FrameStatus> {
    let Some(start) = data.iter().position(|b| *b == FLAG) else {
        return Ok(FrameStatus::Incomplete { missing: MIN_FRAME_LENGTH });
    };
    let data = &data[start..];
    match frame_length(data)? {
        None => Ok(FrameStatus::Incomplete {
            missing: MIN_FRAME_LENGTH - data.len(),
        }),
        Some(length) if data.len() < length => Ok(FrameStatus::Incomplete {
            missing: length - data.len(),
        }),
        Some(_) => Ok(FrameStatus::Complete),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HdlcAddress {
        HdlcAddress::new(0x10).unwrap()
    }

    fn server() -> HdlcAddress {
        HdlcAddress::new_with_physical(1, 0).unwrap()
    }

    #[test]
    fn test_encode_snrm() {
        let frame = HdlcFrame::new(server(), client(), control::SNRM);
        assert_eq!(
            frame.encode().unwrap(),
            vec![0x7E, 0xA0, 0x07, 0x03, 0x21, 0x93, 0x0F, 0x01, 0x7E]
        );
    }

    #[test]
    fn test_information_frame_decodes_back() {
        let mut info = LLC_RESPONSE.to_vec();
        info.extend_from_slice(&[0xC4, 0x01, 0xC1, 0x00, 0x11, 0x05]);
        let frame = HdlcFrame::new(client(), server(), control::information(0, 1))
            .with_information(info.clone(), true);
        let encoded = frame.encode().unwrap();
        assert_eq!(encoded[1] & SEGMENTATION_BIT, SEGMENTATION_BIT);

        let decoded = HdlcFrame::decode(&encoded).unwrap();
        assert_eq!(decoded.frame_type(), FrameType::Information);
        assert_eq!(decoded.receive_sequence(), 1);
        assert_eq!(decoded.send_sequence(), 0);
        assert!(decoded.segmented);
        assert_eq!(decoded.information, info);
    }

    #[test]
    fn test_decode_rejects_corrupted_fcs() {
        let mut encoded = HdlcFrame::new(server(), client(), control::DISC).encode().unwrap();
        encoded[5] ^= 0xFF;
        assert!(HdlcFrame::decode(&encoded).is_err());
    }

    #[test]
    fn test_frame_status_reports_missing_bytes() {
        let encoded = HdlcFrame::new(server(), client(), control::SNRM).encode().unwrap();
        assert_eq!(frame_status(&encoded).unwrap(), FrameStatus::Complete);
        assert_eq!(
            frame_status(&encoded[..4]).unwrap(),
            FrameStatus::Incomplete { missing: 5 }
        );
        assert_eq!(
            frame_status(&encoded[..1]).unwrap(),
            FrameStatus::Incomplete { missing: 8 }
        );
        assert!(frame_status(&[0x7E, 0x10, 0x00]).is_err());
    }

    #[test]
    fn test_control_bytes() {
        assert_eq!(control::DISC, 0x53);
        assert_eq!(control::UA, 0x73);
        assert_eq!(control::information(0, 0), 0x10);
        assert_eq!(control::information(1, 1), 0x32);
        assert_eq!(control::receive_ready(1), 0x31);
        assert_eq!(FrameType::from_control_byte(0x1F), FrameType::DisconnectMode);
    }
}
