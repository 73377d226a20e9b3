//! Data types used in DLMS/COSEM protocol

pub mod cosem_date_time;
pub mod data_object;

pub use cosem_date_time::CosemDateTime;
pub use data_object::{DataObject, DataObjectType};
