//! Transport layer module for DLMS/COSEM protocol
//!
//! This crate provides the [`Transport`] contract used by the exchange
//! engine and its TCP and serial implementations.

pub mod serial;
pub mod stream;
pub mod tcp;
pub mod transport;

pub use serial::{SerialSettings, SerialTransport};
pub use stream::{receive_from, StreamAccessor};
pub use tcp::{TcpSettings, TcpTransport};
pub use transport::{ExchangeLock, ReceiveParams, Transport};
