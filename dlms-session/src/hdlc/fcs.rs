//! Frame Check Sequence (FCS) calculation for HDLC
//!
//! CRC-16/X.25 as used for both the header check sequence (HCS) and the
//! frame check sequence of IEC 62056-46 frames.

use dlms_core::{DlmsError, DlmsResult};

const INITIAL_FCS: u16 = 0xFFFF;
const GOOD_FCS: u16 = 0xF0B8;
const KEY: u16 = 0x8408; // Bit-reversed 1021

/// Precomputed FCS table
static FCS_TABLE: once_cell::sync::Lazy<[u16; 256]> = once_cell::sync::Lazy::new(|| {
    let mut table = [0u16; 256];
    for (b, entry) in table.iter_mut().enumerate() {
        let mut v = b as u16;
        for _ in 0..8 {
            v = if v & 1 == 1 { (v >> 1) ^ KEY } else { v >> 1 };
        }
        *entry = v;
    }
    table
});

/// Frame Check Sequence calculator
#[derive(Debug, Clone)]
pub struct FcsCalc {
    fcs_value: u16,
}

impl FcsCalc {
    pub fn new() -> Self {
        Self {
            fcs_value: INITIAL_FCS,
        }
    }

    /// Update the FCS value with multiple bytes
    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.fcs_value =
                (self.fcs_value >> 8) ^ FCS_TABLE[((self.fcs_value ^ byte as u16) & 0xFF) as usize];
        }
    }

    /// Get the check sequence in transmission order (least significant byte first)
    pub fn fcs_value_bytes(&self) -> [u8; 2] {
        (self.fcs_value ^ 0xFFFF).to_le_bytes()
    }

    /// Validate a run of bytes that ends with its own check sequence
    pub fn validate(&self) -> DlmsResult<()> {
        if self.fcs_value != GOOD_FCS {
            Err(DlmsError::FrameInvalid(format!(
                "FCS has wrong value: 0x{:04X}, expected 0x{:04X}",
                self.fcs_value, GOOD_FCS
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for FcsCalc {
    fn default() -> Self {
        Self::new()
    }
}

/// Check sequence of `data`, ready to append
pub fn checksum(data: &[u8]) -> [u8; 2] {
    let mut calc = FcsCalc::new();
    calc.update_bytes(data);
    calc.fcs_value_bytes()
}

/// Verify that `data` ends with a correct check sequence
pub fn verify(data: &[u8]) -> DlmsResult<()> {
    let mut calc = FcsCalc::new();
    calc.update_bytes(data);
    calc.validate()
}
