//! Data object types for DLMS/COSEM protocol

use crate::datatypes::cosem_date_time::CosemDateTime;
use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Container class holding data received from or sent to the meter
///
/// Stores numbers, lists, byte arrays, bit strings or date/time values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataObject {
    /// Null data
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer 8-bit
    Integer8(i8),
    /// Integer 16-bit
    Integer16(i16),
    /// Integer 32-bit
    Integer32(i32),
    /// Integer 64-bit
    Integer64(i64),
    /// Unsigned integer 8-bit
    Unsigned8(u8),
    /// Unsigned integer 16-bit
    Unsigned16(u16),
    /// Unsigned integer 32-bit
    Unsigned32(u32),
    /// Unsigned integer 64-bit
    Unsigned64(u64),
    /// Float 32-bit
    Float32(f32),
    /// Float 64-bit
    Float64(f64),
    /// Enumeration (8-bit)
    Enumerate(u8),
    /// BCD (Binary Coded Decimal)
    Bcd(u8),
    /// Octet string
    OctetString(Vec<u8>),
    /// Visible string
    VisibleString(Vec<u8>),
    /// UTF-8 string
    Utf8String(Vec<u8>),
    /// Bit string, `bits` significant bits packed MSB first into `bytes`
    BitString { bits: usize, bytes: Vec<u8> },
    /// Array of DataObjects
    Array(Vec<DataObject>),
    /// Structure (ordered list of DataObjects)
    Structure(Vec<DataObject>),
    /// Date (5 raw bytes)
    Date(Vec<u8>),
    /// Time (4 raw bytes)
    Time(Vec<u8>),
    /// Date and time
    DateTime(CosemDateTime),
}

/// Type enumeration for DataObject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataObjectType {
    NullData,
    Array,
    Structure,
    Boolean,
    BitString,
    DoubleLong,
    DoubleLongUnsigned,
    OctetString,
    Utf8String,
    VisibleString,
    Bcd,
    Integer,
    LongInteger,
    Unsigned,
    LongUnsigned,
    Long64,
    Long64Unsigned,
    Enumerate,
    Float32,
    Float64,
    DateTime,
    Date,
    Time,
}

impl DataObject {
    /// Get the type of this DataObject
    pub fn get_type(&self) -> DataObjectType {
        match self {
            DataObject::Null => DataObjectType::NullData,
            DataObject::Boolean(_) => DataObjectType::Boolean,
            DataObject::Integer8(_) => DataObjectType::Integer,
            DataObject::Integer16(_) => DataObjectType::LongInteger,
            DataObject::Integer32(_) => DataObjectType::DoubleLong,
            DataObject::Integer64(_) => DataObjectType::Long64,
            DataObject::Unsigned8(_) => DataObjectType::Unsigned,
            DataObject::Unsigned16(_) => DataObjectType::LongUnsigned,
            DataObject::Unsigned32(_) => DataObjectType::DoubleLongUnsigned,
            DataObject::Unsigned64(_) => DataObjectType::Long64Unsigned,
            DataObject::Float32(_) => DataObjectType::Float32,
            DataObject::Float64(_) => DataObjectType::Float64,
            DataObject::Enumerate(_) => DataObjectType::Enumerate,
            DataObject::Bcd(_) => DataObjectType::Bcd,
            DataObject::OctetString(_) => DataObjectType::OctetString,
            DataObject::VisibleString(_) => DataObjectType::VisibleString,
            DataObject::Utf8String(_) => DataObjectType::Utf8String,
            DataObject::BitString { .. } => DataObjectType::BitString,
            DataObject::Array(_) => DataObjectType::Array,
            DataObject::Structure(_) => DataObjectType::Structure,
            DataObject::Date(_) => DataObjectType::Date,
            DataObject::Time(_) => DataObjectType::Time,
            DataObject::DateTime(_) => DataObjectType::DateTime,
        }
    }

    /// Check whether the value is NULL_DATA
    pub fn is_null(&self) -> bool {
        matches!(self, DataObject::Null)
    }

    /// Get the value as a boolean
    pub fn as_bool(&self) -> DlmsResult<bool> {
        match self {
            DataObject::Boolean(b) => Ok(*b),
            _ => Err(self.type_mismatch("Boolean")),
        }
    }

    /// Get any integral value widened to i64
    ///
    /// Unsigned 64-bit values above `i64::MAX` are rejected.
    pub fn as_i64(&self) -> DlmsResult<i64> {
        match self {
            DataObject::Integer8(v) => Ok(i64::from(*v)),
            DataObject::Integer16(v) => Ok(i64::from(*v)),
            DataObject::Integer32(v) => Ok(i64::from(*v)),
            DataObject::Integer64(v) => Ok(*v),
            DataObject::Unsigned8(v) | DataObject::Enumerate(v) | DataObject::Bcd(v) => {
                Ok(i64::from(*v))
            }
            DataObject::Unsigned16(v) => Ok(i64::from(*v)),
            DataObject::Unsigned32(v) => Ok(i64::from(*v)),
            DataObject::Unsigned64(v) => i64::try_from(*v)
                .map_err(|_| DlmsError::InvalidData(format!("Value {} exceeds i64", v))),
            _ => Err(self.type_mismatch("integer")),
        }
    }

    /// Get the value as an octet string
    pub fn as_octet_string(&self) -> DlmsResult<&[u8]> {
        match self {
            DataObject::OctetString(s) => Ok(s),
            _ => Err(self.type_mismatch("OctetString")),
        }
    }

    /// Get the value as an array
    pub fn as_array(&self) -> DlmsResult<&[DataObject]> {
        match self {
            DataObject::Array(a) => Ok(a),
            _ => Err(self.type_mismatch("Array")),
        }
    }

    /// Get the value as a structure
    pub fn as_structure(&self) -> DlmsResult<&[DataObject]> {
        match self {
            DataObject::Structure(s) => Ok(s),
            _ => Err(self.type_mismatch("Structure")),
        }
    }

    fn type_mismatch(&self, expected: &str) -> DlmsError {
        DlmsError::InvalidData(format!(
            "Expected {}, got {:?}",
            expected,
            self.get_type()
        ))
    }
}

impl fmt::Display for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataObject::Null => write!(f, "NULL_DATA"),
            DataObject::Boolean(b) => write!(f, "BOOLEAN: {}", b),
            DataObject::Integer8(i) => write!(f, "INTEGER: {}", i),
            DataObject::Integer16(i) => write!(f, "LONG_INTEGER: {}", i),
            DataObject::Integer32(i) => write!(f, "DOUBLE_LONG: {}", i),
            DataObject::Integer64(i) => write!(f, "LONG64: {}", i),
            DataObject::Unsigned8(u) => write!(f, "UNSIGNED: {}", u),
            DataObject::Unsigned16(u) => write!(f, "LONG_UNSIGNED: {}", u),
            DataObject::Unsigned32(u) => write!(f, "DOUBLE_LONG_UNSIGNED: {}", u),
            DataObject::Unsigned64(u) => write!(f, "LONG64_UNSIGNED: {}", u),
            DataObject::Float32(fl) => write!(f, "FLOAT32: {}", fl),
            DataObject::Float64(fl) => write!(f, "FLOAT64: {}", fl),
            DataObject::Enumerate(e) => write!(f, "ENUMERATE: {}", e),
            DataObject::Bcd(b) => write!(f, "BCD: {}", b),
            DataObject::OctetString(s) => {
                write!(f, "OCTET_STRING:")?;
                for byte in s {
                    write!(f, " {:02X}", byte)?;
                }
                Ok(())
            }
            DataObject::VisibleString(s) => {
                write!(f, "VISIBLE_STRING: {}", String::from_utf8_lossy(s))
            }
            DataObject::Utf8String(s) => {
                write!(f, "UTF8_STRING: {}", String::from_utf8_lossy(s))
            }
            DataObject::BitString { bits, .. } => write!(f, "BIT_STRING: {} bit(s)", bits),
            DataObject::Array(arr) => {
                write!(f, "ARRAY: {} element(s)", arr.len())?;
                for (i, elem) in arr.iter().enumerate() {
                    write!(f, "\n  [{}]: {}", i, elem)?;
                }
                Ok(())
            }
            DataObject::Structure(s) => {
                write!(f, "STRUCTURE: {} element(s)", s.len())?;
                for (i, elem) in s.iter().enumerate() {
                    write!(f, "\n  [{}]: {}", i, elem)?;
                }
                Ok(())
            }
            DataObject::Date(d) => write!(f, "DATE: {:02X?}", d),
            DataObject::Time(t) => write!(f, "TIME: {:02X?}", t),
            DataObject::DateTime(dt) => write!(f, "DATE_TIME: {}", dt),
        }
    }
}
