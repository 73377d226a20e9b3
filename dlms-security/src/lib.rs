//! Security module for DLMS/COSEM protocol
//!
//! This crate provides the authentication mechanisms used while
//! establishing an association.

pub mod authentication;

pub use authentication::{
    generate_challenge, AuthenticationMechanism, ChallengeContext, ChallengeResponder, HlsGmac,
    HlsSha256,
};
