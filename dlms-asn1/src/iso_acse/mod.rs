//! ISO-ACSE APDUs for DLMS/COSEM
//!
//! - **AARQ**: Association Request (Application tag 0)
//! - **AARE**: Association Response (Application tag 1)
//! - **RLRQ**: Release Request (Application tag 2)
//! - **RLRE**: Release Response (Application tag 3)
//!
//! All ISO-ACSE PDUs are BER encoded. The xDLMS Initiate PDUs they carry in
//! `user-information` are A-XDR and are passed through as opaque bytes.

pub mod pdu;

pub use pdu::{AAREApdu, AARQApdu, AcseServiceUser, RLREApdu, RLRQApdu};

/// DLMS application context name prefix {2 16 756 5 8 1}, BER encoded
pub const APPLICATION_CONTEXT_PREFIX: [u8; 6] = [0x60, 0x85, 0x74, 0x05, 0x08, 0x01];

/// DLMS authentication mechanism name prefix {2 16 756 5 8 2}, BER encoded
pub const MECHANISM_NAME_PREFIX: [u8; 6] = [0x60, 0x85, 0x74, 0x05, 0x08, 0x02];

/// Application context: logical name referencing, no ciphering
pub const CONTEXT_LN_NO_CIPHERING: u8 = 1;
/// Application context: short name referencing, no ciphering
pub const CONTEXT_SN_NO_CIPHERING: u8 = 2;

/// `authentication-required` diagnostic of the ACSE service user
pub const DIAGNOSTIC_AUTHENTICATION_REQUIRED: u8 = 14;
