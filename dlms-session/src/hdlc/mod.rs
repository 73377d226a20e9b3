//! HDLC session layer module (IEC 62056-46)

pub mod address;
pub mod fcs;
pub mod frame;
pub mod link;
pub mod parameters;

pub use address::{reserved, HdlcAddress};
pub use fcs::FcsCalc;
pub use frame::{frame_status, FrameType, HdlcFrame, FLAG, LLC_REQUEST, LLC_RESPONSE};
pub use link::{HdlcLink, LinkPayload};
pub use parameters::HdlcParameters;
