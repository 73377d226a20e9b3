//! Core types and utilities for DLMS/COSEM protocol
//!
//! This crate provides fundamental types, error handling, and utilities
//! used throughout the DLMS/COSEM implementation.

pub mod cosem;
pub mod datatypes;
pub mod error;
pub mod obis_code;

pub use cosem::{CosemObject, ObjectIdentity, ScalerUnit};
pub use datatypes::{CosemDateTime, DataObject, DataObjectType};
pub use error::{DlmsError, DlmsResult};
pub use obis_code::ObisCode;
