//! HDLC address types
//!
//! Every address byte carries 7 address bits; the least significant bit
//! marks the last byte of the address.

use dlms_core::{DlmsError, DlmsResult};
use std::fmt;

/// Reserved HDLC addresses
pub mod reserved {
    /// Client management process
    pub const CLIENT_MANAGEMENT_PROCESS: u16 = 0x01;
    /// Client public client
    pub const CLIENT_PUBLIC_CLIENT: u16 = 0x10;
    /// Server upper management logical device
    pub const SERVER_UPPER_MANAGEMENT_LOGICAL_DEVICE: u16 = 0x01;
}

const ONE_BYTE_UPPER_BOUND: u16 = 0x7F;
const TWO_BYTE_UPPER_BOUND: u16 = 0x3FFF;

/// HDLC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HdlcAddress {
    byte_length: usize,
    logical_id: u16,
    physical_id: u16,
}

impl HdlcAddress {
    /// Create a one-byte address, as used for clients
    pub fn new(logical_id: u16) -> DlmsResult<Self> {
        if logical_id > ONE_BYTE_UPPER_BOUND {
            return Err(DlmsError::InvalidData(format!(
                "One byte address exceeded upper bound of 0x{:02X}",
                ONE_BYTE_UPPER_BOUND
            )));
        }
        Ok(Self {
            byte_length: 1,
            logical_id,
            physical_id: 0,
        })
    }

    /// Create a server address from upper (logical) and lower (physical) parts
    ///
    /// Without a physical part the address takes one byte; otherwise two
    /// or four bytes depending on the larger of the two parts.
    pub fn new_with_physical(logical_id: u16, physical_id: u16) -> DlmsResult<Self> {
        let logical_size = Self::address_size_of(logical_id)?;
        let physical_size = Self::address_size_of(physical_id)?;
        let byte_length = if physical_id == 0 && logical_size == 1 {
            1
        } else {
            logical_size.max(physical_size) * 2
        };

        Ok(Self {
            byte_length,
            logical_id,
            physical_id,
        })
    }

    fn address_size_of(address: u16) -> DlmsResult<usize> {
        if address <= ONE_BYTE_UPPER_BOUND {
            Ok(1)
        } else if address <= TWO_BYTE_UPPER_BOUND {
            Ok(2)
        } else {
            Err(DlmsError::InvalidData(format!(
                "Address 0x{:X} is out of upper bound 0x{:X}",
                address, TWO_BYTE_UPPER_BOUND
            )))
        }
    }

    pub fn logical_id(&self) -> u16 {
        self.logical_id
    }

    pub fn physical_id(&self) -> u16 {
        self.physical_id
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Encode address to bytes
    pub fn encode(&self) -> Vec<u8> {
        let parts: Vec<u16> = match self.byte_length {
            1 => vec![self.logical_id],
            2 => vec![self.logical_id, self.physical_id],
            _ => vec![
                self.logical_id >> 7,
                self.logical_id & 0x7F,
                self.physical_id >> 7,
                self.physical_id & 0x7F,
            ],
        };
        let mut result: Vec<u8> = parts.iter().map(|p| ((p & 0x7F) << 1) as u8).collect();
        if let Some(last) = result.last_mut() {
            *last |= 1;
        }
        result
    }

    /// Decode an address from the start of `data`
    ///
    /// # Returns
    ///
    /// The address and the number of bytes it occupied.
    pub fn decode(data: &[u8]) -> DlmsResult<(Self, usize)> {
        let length = data
            .iter()
            .position(|b| b & 0x01 == 0x01)
            .map(|i| i + 1)
            .ok_or_else(|| DlmsError::FrameInvalid("HDLC address has no end bit".to_string()))?;

        let part = |i: usize| (data[i] >> 1) as u16;
        let address = match length {
            1 => Self {
                byte_length: 1,
                logical_id: part(0),
                physical_id: 0,
            },
            2 => Self {
                byte_length: 2,
                logical_id: part(0),
                physical_id: part(1),
            },
            4 => Self {
                byte_length: 4,
                logical_id: (part(0) << 7) | part(1),
                physical_id: (part(2) << 7) | part(3),
            },
            _ => {
                return Err(DlmsError::FrameInvalid(format!(
                    "Received HdlcAddress has an invalid byte length of {}",
                    length
                )));
            }
        };
        Ok((address, length))
    }
}

impl fmt::Display for HdlcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.logical_id)?;
        if self.byte_length > 1 {
            write!(f, "-{:X}", self.physical_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_address() {
        let addr = HdlcAddress::new(reserved::CLIENT_PUBLIC_CLIENT).unwrap();
        assert_eq!(addr.encode(), vec![0x21]);
        assert!(HdlcAddress::new(0x80).is_err());
    }

    #[test]
    fn test_server_address_forms() {
        assert_eq!(HdlcAddress::new_with_physical(1, 0).unwrap().encode(), vec![0x03]);
        assert_eq!(
            HdlcAddress::new_with_physical(1, 0x11).unwrap().encode(),
            vec![0x02, 0x23]
        );
        assert_eq!(
            HdlcAddress::new_with_physical(1, 0x1234).unwrap().encode(),
            vec![0x00, 0x02, 0x48, 0x69]
        );
    }

    #[test]
    fn test_decode_four_byte_address() {
        let addr = HdlcAddress::new_with_physical(1, 0x1234).unwrap();
        let (decoded, used) = HdlcAddress::decode(&[0x00, 0x02, 0x48, 0x69, 0x10]).unwrap();
        assert_eq!(decoded, addr);
        assert_eq!(used, 4);
        assert!(HdlcAddress::decode(&[0x02, 0x04, 0x03]).is_err());
    }
}
