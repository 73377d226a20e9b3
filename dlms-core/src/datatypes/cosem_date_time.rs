//! COSEM DateTime type for DLMS/COSEM protocol

use crate::datatypes::data_object::DataObject;
use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const DEVIATION_NOT_SPECIFIED: i16 = i16::MIN;
const NOT_SPECIFIED: u8 = 0xFF;

/// Class representing a COSEM DateTime (12-byte octet string form)
///
/// Fields keep their wire values; `0xFF` (`0xFFFF` for the year) means
/// "not specified".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosemDateTime {
    year: u16,
    month: u8,
    day_of_month: u8,
    day_of_week: u8,
    hour: u8,
    minute: u8,
    second: u8,
    hundredths: u8,
    deviation: i16,
    clock_status: u8,
}

impl CosemDateTime {
    pub const LENGTH: usize = 12;

    /// Constructs a COSEM DateTime with unspecified weekday, hundredths and deviation
    pub fn new(year: u16, month: u8, day_of_month: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day_of_month,
            day_of_week: NOT_SPECIFIED,
            hour,
            minute,
            second,
            hundredths: NOT_SPECIFIED,
            deviation: DEVIATION_NOT_SPECIFIED,
            clock_status: 0,
        }
    }

    /// Decode a COSEM DateTime from a byte array
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the slice is not exactly 12 bytes long.
    pub fn decode(octet_string: &[u8]) -> DlmsResult<Self> {
        if octet_string.len() != Self::LENGTH {
            return Err(DlmsError::InvalidData(format!(
                "Array has an invalid length. Expected {}, got {}",
                Self::LENGTH,
                octet_string.len()
            )));
        }

        Ok(Self {
            year: u16::from_be_bytes([octet_string[0], octet_string[1]]),
            month: octet_string[2],
            day_of_month: octet_string[3],
            day_of_week: octet_string[4],
            hour: octet_string[5],
            minute: octet_string[6],
            second: octet_string[7],
            hundredths: octet_string[8],
            deviation: i16::from_be_bytes([octet_string[9], octet_string[10]]),
            clock_status: octet_string[11],
        })
    }

    /// Interpret an attribute value as a date-time
    ///
    /// Meters return the clock time either as a 12-byte octet-string or as
    /// an already typed date-time value.
    pub fn from_data(value: &DataObject) -> DlmsResult<Self> {
        match value {
            DataObject::DateTime(dt) => Ok(dt.clone()),
            DataObject::OctetString(bytes) => Self::decode(bytes),
            other => Err(DlmsError::InvalidData(format!(
                "Expected date-time, got {:?}",
                other.get_type()
            ))),
        }
    }

    /// Encode to the 12-byte wire form
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(Self::LENGTH);
        result.extend_from_slice(&self.year.to_be_bytes());
        result.extend_from_slice(&[
            self.month,
            self.day_of_month,
            self.day_of_week,
            self.hour,
            self.minute,
            self.second,
            self.hundredths,
        ]);
        result.extend_from_slice(&self.deviation.to_be_bytes());
        result.push(self.clock_status);
        result
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day_of_month(&self) -> u8 {
        self.day_of_month
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    /// Deviation from UTC in minutes, `None` when not specified
    pub fn deviation(&self) -> Option<i16> {
        (self.deviation != DEVIATION_NOT_SPECIFIED).then_some(self.deviation)
    }

    /// Raw clock status byte
    pub fn clock_status(&self) -> u8 {
        self.clock_status
    }
}

impl fmt::Display for CosemDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field(f: &mut fmt::Formatter<'_>, value: u8) -> fmt::Result {
            if value == NOT_SPECIFIED {
                write!(f, "**")
            } else {
                write!(f, "{:02}", value)
            }
        }

        if self.year == 0xFFFF {
            write!(f, "****")?;
        } else {
            write!(f, "{:04}", self.year)?;
        }
        write!(f, "-")?;
        field(f, self.month)?;
        write!(f, "-")?;
        field(f, self.day_of_month)?;
        write!(f, " ")?;
        field(f, self.hour)?;
        write!(f, ":")?;
        field(f, self.minute)?;
        write!(f, ":")?;
        field(f, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_clock_octet_string() {
        let bytes = [
            0x07, 0xE8, 0x01, 0x0F, 0x01, 0x0E, 0x1E, 0x2D, 0x00, 0xFF, 0xC4, 0x00,
        ];
        let dt = CosemDateTime::from_data(&DataObject::OctetString(bytes.to_vec())).unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day_of_month(), 15);
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.deviation(), Some(-60));
        assert_eq!(dt.to_string(), "2024-01-15 14:30:45");
        assert_eq!(dt.encode(), bytes.to_vec());
    }

    #[test]
    fn test_unspecified_fields() {
        let dt = CosemDateTime::new(0xFFFF, 0xFF, 1, 0, 0, 0);
        assert_eq!(dt.deviation(), None);
        assert_eq!(dt.to_string(), "****-**-01 00:00:00");
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(CosemDateTime::decode(&[0u8; 11]).is_err());
        assert!(CosemDateTime::from_data(&DataObject::Unsigned8(1)).is_err());
    }
}
