//! DLMS/COSEM client implementation
//!
//! This crate drives one meter session: settings, the exchange engine that
//! moves request/reply frames with retries, the [`ProtocolCodec`] contract
//! with its DLMS implementation, and the session state machine.
//!
//! ```rust,no_run
//! use dlms_client::{ClientSettings, InterfaceType, Session};
//! use dlms_core::{CosemObject, ObisCode};
//!
//! # async fn run() -> dlms_core::DlmsResult<()> {
//! let settings = ClientSettings::builder()
//!     .tcp("10.0.0.5", 4059)
//!     .interface(InterfaceType::Wrapper)
//!     .build()?;
//! let mut session = Session::from_settings(&settings)?;
//! session.open().await?;
//! session.initialize_connection().await?;
//! let mut energy = CosemObject::register(ObisCode::new(1, 0, 1, 8, 0, 255));
//! let value = session.read(&mut energy, 2).await?;
//! println!("{:?}", value);
//! session.close().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod dlms_codec;
pub mod exchange;
pub mod session;
pub mod settings;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use codec::{Continuation, ProtocolCodec, Reply};
pub use dlms_codec::DlmsCodec;
pub use exchange::{ExchangeEngine, ExchangePolicy, LogTraceSink, TraceSink};
pub use session::{Session, SessionState};
pub use settings::{
    ClientSettings, ClientSettingsBuilder, GmacKeys, InterfaceType, MediaSettings, Referencing,
    ServiceClass,
};
