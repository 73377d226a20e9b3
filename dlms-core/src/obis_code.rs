use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OBIS (Object Identification System) code for identifying COSEM objects
///
/// OBIS codes are 6-byte identifiers used in DLMS/COSEM to uniquely identify
/// objects in a logical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObisCode {
    bytes: [u8; 6],
}

impl ObisCode {
    /// Association LN object used for HLS replies
    pub const ASSOCIATION_LN: ObisCode = ObisCode { bytes: [0, 0, 40, 0, 0, 255] };

    /// Create a new OBIS code from individual bytes
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            bytes: [a, b, c, d, e, f],
        }
    }

    /// Create an OBIS code from its 6-byte wire form
    pub fn from_bytes(bytes: &[u8]) -> DlmsResult<Self> {
        let bytes: [u8; 6] = bytes.try_into().map_err(|_| {
            DlmsError::InvalidData(format!("OBIS code must be 6 bytes, got {}", bytes.len()))
        })?;
        Ok(Self { bytes })
    }

    /// Parse an OBIS code from string format
    ///
    /// Supports formats like:
    /// - "1.0.1.8.0.255"
    /// - "1-0:1.8.0*255"
    /// - "1-0:1.8.0" (F defaults to 255)
    pub fn from_string(s: &str) -> DlmsResult<Self> {
        let s = s.trim();
        if s.contains(':') {
            Self::parse_extended_format(s)
        } else {
            Self::parse_dot_format(s)
        }
    }

    fn parse_dot_format(s: &str) -> DlmsResult<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 6 {
            return Err(DlmsError::InvalidData(format!(
                "Invalid OBIS code format: {}",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = Self::parse_byte(part)?;
        }
        Ok(Self { bytes })
    }

    fn parse_extended_format(s: &str) -> DlmsResult<Self> {
        let invalid = || DlmsError::InvalidData(format!("Invalid OBIS code format: {}", s));

        let (medium, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (a, b) = medium.split_once('-').ok_or_else(invalid)?;
        let (cde, f) = match rest.split_once('*') {
            Some((cde, f)) => (cde, Some(f)),
            None => (rest, None),
        };
        let cde: Vec<&str> = cde.split('.').collect();
        if cde.len() != 3 {
            return Err(invalid());
        }

        Ok(Self::new(
            Self::parse_byte(a)?,
            Self::parse_byte(b)?,
            Self::parse_byte(cde[0])?,
            Self::parse_byte(cde[1])?,
            Self::parse_byte(cde[2])?,
            match f {
                Some(f) => Self::parse_byte(f)?,
                None => 255,
            },
        ))
    }

    fn parse_byte(part: &str) -> DlmsResult<u8> {
        part.trim()
            .parse::<u8>()
            .map_err(|_| DlmsError::InvalidData(format!("Invalid byte value: {}", part)))
    }

    /// Get the OBIS code as a byte array
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }

    /// Get the OBIS code as a copied byte array
    pub fn to_bytes(&self) -> [u8; 6] {
        self.bytes
    }

    /// Get the A value (first byte)
    pub fn a(&self) -> u8 {
        self.bytes[0]
    }

    /// Get the F value (sixth byte)
    pub fn f(&self) -> u8 {
        self.bytes[5]
    }
}

impl FromStr for ObisCode {
    type Err = DlmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl TryFrom<String> for ObisCode {
    type Error = DlmsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_string(&value)
    }
}

impl From<ObisCode> for String {
    fn from(code: ObisCode) -> Self {
        code.to_string()
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}",
            self.bytes[0], self.bytes[1], self.bytes[2],
            self.bytes[3], self.bytes[4], self.bytes[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obis_code_new() {
        let code = ObisCode::new(1, 0, 1, 8, 0, 255);
        assert_eq!(code.a(), 1);
        assert_eq!(code.f(), 255);
    }

    #[test]
    fn test_obis_code_from_string() {
        let code = ObisCode::from_string("1.0.1.8.0.255").unwrap();
        assert_eq!(code, ObisCode::new(1, 0, 1, 8, 0, 255));
    }

    #[test]
    fn test_obis_code_extended_format() {
        assert_eq!(
            "1-0:1.8.0*255".parse::<ObisCode>().unwrap(),
            ObisCode::new(1, 0, 1, 8, 0, 255)
        );
        assert_eq!(
            "0-0:1.0.1".parse::<ObisCode>().unwrap(),
            ObisCode::new(0, 0, 1, 0, 1, 255)
        );
    }

    #[test]
    fn test_obis_code_rejects_garbage() {
        assert!(ObisCode::from_string("1.0.1.8.0").is_err());
        assert!(ObisCode::from_string("1.0.1.8.0.256").is_err());
        assert!(ObisCode::from_string("1-0:1.8*255").is_err());
        assert!(ObisCode::from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_obis_code_display() {
        let code = ObisCode::new(0, 0, 40, 0, 0, 255);
        assert_eq!(format!("{}", code), "0.0.40.0.0.255");
        assert_eq!(code, ObisCode::ASSOCIATION_LN);
    }
}
