//! Service layer for DLMS/COSEM application layer
//!
//! - **GET Service**: attribute reads with block transfer
//! - **ACTION Service**: method invocation, used for the HLS reply

pub mod action;
pub mod get;

pub use action::ActionService;
pub use get::{BlockAssembler, GetOutcome, GetService};
