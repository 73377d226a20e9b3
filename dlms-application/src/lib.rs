//! Application layer module for DLMS/COSEM protocol
//!
//! This crate provides the xDLMS APDUs and the GET/ACTION/READ services
//! a reading client needs.

pub mod pdu;
pub mod service;
pub mod sn_pdu;

pub use pdu::{
    ActionRequest, ActionResponse, Conformance, ConfirmedServiceError, CosemAttributeDescriptor,
    CosemMethodDescriptor, ExceptionResponse, GetDataResult, GetRequest, GetResponse,
    InitiateRequest, InitiateResponse, InvokeIdAndPriority,
};
pub use service::{ActionService, BlockAssembler, GetOutcome, GetService};
pub use sn_pdu::{ReadRequest, ReadResponse, ReadService, ShortName};
