//! Client-side COSEM object model
//!
//! A [`CosemObject`] is the target of attribute reads: the session merges
//! each decoded attribute value back into the object it was read for.

use crate::datatypes::DataObject;
use crate::error::{DlmsError, DlmsResult};
use crate::obis_code::ObisCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Interface class identifiers used by the client
pub mod class_id {
    pub const DATA: u16 = 1;
    pub const REGISTER: u16 = 3;
    pub const CLOCK: u16 = 8;
    pub const ASSOCIATION_SN: u16 = 12;
    pub const ASSOCIATION_LN: u16 = 15;
}

/// Addressing information needed to build a request for an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    pub class_id: u16,
    pub logical_name: ObisCode,
    /// Base name for short name referencing
    pub short_name: Option<u16>,
}

/// COSEM object as seen by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosemObject {
    class_id: u16,
    logical_name: ObisCode,
    short_name: Option<u16>,
    attributes: BTreeMap<u8, DataObject>,
}

impl CosemObject {
    /// Create an object of any interface class
    pub fn new(class_id: u16, logical_name: ObisCode) -> Self {
        Self {
            class_id,
            logical_name,
            short_name: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Register object (class 3)
    pub fn register(logical_name: ObisCode) -> Self {
        Self::new(class_id::REGISTER, logical_name)
    }

    /// Clock object (class 8)
    pub fn clock(logical_name: ObisCode) -> Self {
        Self::new(class_id::CLOCK, logical_name)
    }

    /// Set the base name used with short name referencing
    pub fn with_short_name(mut self, short_name: u16) -> Self {
        self.short_name = Some(short_name);
        self
    }

    pub fn class_id(&self) -> u16 {
        self.class_id
    }

    pub fn logical_name(&self) -> ObisCode {
        self.logical_name
    }

    pub fn short_name(&self) -> Option<u16> {
        self.short_name
    }

    pub fn identity(&self) -> ObjectIdentity {
        ObjectIdentity {
            class_id: self.class_id,
            logical_name: self.logical_name,
            short_name: self.short_name,
        }
    }

    /// Last value read for an attribute
    pub fn attribute(&self, index: u8) -> Option<&DataObject> {
        self.attributes.get(&index)
    }

    /// Store a decoded attribute value
    pub fn set_attribute(&mut self, index: u8, value: DataObject) {
        self.attributes.insert(index, value);
    }

    /// Scaler and unit of a register, if attribute 3 has been read
    pub fn scaler_unit(&self) -> DlmsResult<Option<ScalerUnit>> {
        if self.class_id != class_id::REGISTER {
            return Ok(None);
        }
        self.attribute(3).map(ScalerUnit::from_data).transpose()
    }
}

/// Scaling factor and unit of measurement of a register value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalerUnit {
    /// The value is multiplied by 10^scaler
    pub scaler: i8,
    /// Unit code, e.g. 0x1E = Wh
    pub unit: u8,
}

impl ScalerUnit {
    pub fn new(scaler: i8, unit: u8) -> Self {
        Self { scaler, unit }
    }

    /// Interpret a `structure { scaler: integer, unit: enum }` value
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` when the value is not a two-element structure
    /// of integral values or the scaler does not fit an `i8`.
    pub fn from_data(value: &DataObject) -> DlmsResult<Self> {
        let elements = value.as_structure()?;
        if elements.len() != 2 {
            return Err(DlmsError::InvalidData(format!(
                "ScalerUnit structure must have 2 elements, got {}",
                elements.len()
            )));
        }
        let scaler = i8::try_from(elements[0].as_i64()?)
            .map_err(|_| DlmsError::InvalidData("ScalerUnit scaler out of range".to_string()))?;
        let unit = u8::try_from(elements[1].as_i64()?)
            .map_err(|_| DlmsError::InvalidData("ScalerUnit unit out of range".to_string()))?;
        Ok(Self::new(scaler, unit))
    }

    /// Apply scaling to a raw value
    pub fn scale_value(&self, value: f64) -> f64 {
        value * 10_f64.powi(i32::from(self.scaler))
    }
}

/// Common unit codes
pub mod units {
    pub const WATT: u8 = 27;
    pub const WATT_HOUR: u8 = 30;
    pub const AMPERE: u8 = 33;
    pub const VOLT: u8 = 35;
    pub const HERTZ: u8 = 44;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_scaler_unit() {
        let mut register = CosemObject::register(ObisCode::new(1, 0, 1, 8, 0, 255));
        assert_eq!(register.scaler_unit().unwrap(), None);

        register.set_attribute(
            3,
            DataObject::Structure(vec![DataObject::Integer8(-2), DataObject::Enumerate(30)]),
        );
        let scaler_unit = register.scaler_unit().unwrap().unwrap();
        assert_eq!(scaler_unit, ScalerUnit::new(-2, units::WATT_HOUR));
        assert!((scaler_unit.scale_value(12345.0) - 123.45).abs() < 1e-9);
    }

    #[test]
    fn test_scaler_unit_rejects_malformed() {
        assert!(ScalerUnit::from_data(&DataObject::Unsigned8(1)).is_err());
        assert!(ScalerUnit::from_data(&DataObject::Structure(vec![DataObject::Integer8(1)])).is_err());
        assert!(
            ScalerUnit::from_data(&DataObject::Structure(vec![
                DataObject::Integer16(300),
                DataObject::Enumerate(30),
            ]))
            .is_err()
        );
    }

    #[test]
    fn test_identity_carries_short_name() {
        let clock = CosemObject::clock(ObisCode::new(0, 0, 1, 0, 0, 255)).with_short_name(0x2BC0);
        let identity = clock.identity();
        assert_eq!(identity.class_id, class_id::CLOCK);
        assert_eq!(identity.short_name, Some(0x2BC0));
    }
}
