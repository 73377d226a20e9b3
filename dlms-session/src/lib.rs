//! Session layer module for DLMS/COSEM protocol
//!
//! Link framing for the two interface types: HDLC, with SNRM/UA set-up,
//! segmentation and sequencing, and the TCP wrapper header.

pub mod framing;
pub mod hdlc;
pub mod wrapper;

pub use framing::FrameStatus;
pub use hdlc::*;
pub use wrapper::{WrapperFraming, WrapperHeader, WRAPPER_HEADER_LENGTH};
