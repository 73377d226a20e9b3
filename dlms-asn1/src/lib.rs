//! ASN.1 processing module for DLMS/COSEM protocol
//!
//! - [`axdr`]: A-XDR encoding of `DataObject` values, used by xDLMS APDUs
//! - [`ber`]: BER TLV helpers
//! - [`iso_acse`]: AARQ/AARE/RLRQ/RLRE association APDUs

pub mod axdr;
pub mod ber;
pub mod iso_acse;

pub use axdr::{AxdrDecoder, AxdrEncoder, AxdrTag, LengthEncoding};
pub use ber::BerReader;
pub use iso_acse::{AAREApdu, AARQApdu, AcseServiceUser, RLREApdu, RLRQApdu};
