//! HDLC link parameters negotiated with SNRM/UA
//!
//! The UA information field is `81 80 len` followed by parameter TLVs:
//!
//! | id | meaning (server view)          |
//! |----|--------------------------------|
//! | 05 | maximum information field, tx  |
//! | 06 | maximum information field, rx  |
//! | 07 | window size, tx                |
//! | 08 | window size, rx                |

use dlms_core::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};

const FORMAT_IDENTIFIER: u8 = 0x81;
const GROUP_IDENTIFIER: u8 = 0x80;
const MAX_INFO_TX: u8 = 0x05;
const MAX_INFO_RX: u8 = 0x06;
const WINDOW_TX: u8 = 0x07;
const WINDOW_RX: u8 = 0x08;

/// Link parameters from the client's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdlcParameters {
    /// Largest information field the client may send
    pub max_information_field_length_tx: u16,
    /// Largest information field the server will send
    pub max_information_field_length_rx: u16,
    pub window_size_tx: u8,
    pub window_size_rx: u8,
}

impl Default for HdlcParameters {
    fn default() -> Self {
        Self {
            max_information_field_length_tx: 128,
            max_information_field_length_rx: 128,
            window_size_tx: 1,
            window_size_rx: 1,
        }
    }
}

impl HdlcParameters {
    /// Apply the parameters a server returned in its UA frame
    ///
    /// An empty information field keeps the defaults.
    pub fn negotiate(&mut self, ua_information: &[u8]) -> DlmsResult<()> {
        if ua_information.is_empty() {
            return Ok(());
        }
        if ua_information.len() < 3
            || ua_information[0] != FORMAT_IDENTIFIER
            || ua_information[1] != GROUP_IDENTIFIER
        {
            return Err(DlmsError::FrameInvalid(format!(
                "Invalid UA parameter header {:02X?}",
                &ua_information[..ua_information.len().min(3)]
            )));
        }
        let group_len = ua_information[2] as usize;
        let group = ua_information.get(3..3 + group_len).ok_or_else(|| {
            DlmsError::FrameInvalid("UA parameter group is truncated".to_string())
        })?;

        let mut pos = 0;
        while pos + 2 <= group.len() {
            let id = group[pos];
            let len = group[pos + 1] as usize;
            let value = group.get(pos + 2..pos + 2 + len).ok_or_else(|| {
                DlmsError::FrameInvalid(format!("UA parameter 0x{:02X} is truncated", id))
            })?;
            let value = value.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
            match id {
                // The server's transmit limit bounds what we receive and vice versa.
                MAX_INFO_TX => self.max_information_field_length_rx = clamp_u16(value),
                MAX_INFO_RX => self.max_information_field_length_tx = clamp_u16(value),
                WINDOW_TX => self.window_size_rx = value.min(7) as u8,
                WINDOW_RX => self.window_size_tx = value.min(7) as u8,
                _ => {}
            }
            pos += 2 + len;
        }

        if self.max_information_field_length_tx < 32 {
            return Err(DlmsError::FrameInvalid(format!(
                "Negotiated maximum information field {} is too small",
                self.max_information_field_length_tx
            )));
        }
        Ok(())
    }

    /// Encode the UA information field that grants these parameters to a client
    pub fn encode_ua(&self) -> Vec<u8> {
        let mut group = Vec::with_capacity(20);
        group.extend_from_slice(&[MAX_INFO_TX, 0x02]);
        group.extend_from_slice(&self.max_information_field_length_rx.to_be_bytes());
        group.extend_from_slice(&[MAX_INFO_RX, 0x02]);
        group.extend_from_slice(&self.max_information_field_length_tx.to_be_bytes());
        group.extend_from_slice(&[WINDOW_TX, 0x04, 0, 0, 0, self.window_size_rx]);
        group.extend_from_slice(&[WINDOW_RX, 0x04, 0, 0, 0, self.window_size_tx]);

        let mut info = vec![FORMAT_IDENTIFIER, GROUP_IDENTIFIER, group.len() as u8];
        info.extend_from_slice(&group);
        info
    }
}

fn clamp_u16(value: u32) -> u16 {
    value.min(u16::MAX as u32) as u16
}
