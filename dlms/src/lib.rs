//! DLMS/COSEM client sessions and a concurrent session driver
//!
//! # Architecture
//!
//! The library is organized as a workspace with multiple crates:
//!
//! - `dlms-core`: Error type, OBIS codes, data objects and the COSEM object model
//! - `dlms-asn1`: A-XDR encoding/decoding and the ACSE APDUs
//! - `dlms-transport`: Transport contract and the TCP and serial transports
//! - `dlms-session`: Link framing (HDLC, Wrapper)
//! - `dlms-security`: Authentication mechanisms (LLS, HLS SHA-256, HLS GMAC)
//! - `dlms-application`: xDLMS APDUs (Initiate, GET, ACTION, SN READ)
//! - `dlms-client`: Protocol codec, exchange engine and session state machine
//! - `dlms-loadtest`: Orchestrator running many sessions with bounded parallelism
//!
//! # Usage
//!
//! ```no_run
//! use dlms::client::{ClientSettings, Session};
//! use dlms::{CosemObject, ObisCode};
//!
//! # async fn read() -> dlms::DlmsResult<()> {
//! let settings = ClientSettings::builder().tcp("10.0.0.5", 4059).build()?;
//! let mut session = Session::from_settings(&settings)?;
//! session.open().await?;
//! session.initialize_connection().await?;
//! let mut register = CosemObject::register(ObisCode::new(1, 0, 1, 8, 0, 255));
//! let value = session.read(&mut register, 2).await;
//! session.close().await;
//! println!("{:?}", value?);
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use dlms_core::{CosemDateTime, CosemObject, DataObject, DlmsError, DlmsResult, ObisCode, ScalerUnit};

// Re-export client API
pub mod client {
    pub use dlms_client::*;
}

// Re-export the session driver
pub mod loadtest {
    pub use dlms_loadtest::*;
}

pub mod transport {
    pub use dlms_transport::*;
}

pub mod security {
    pub use dlms_security::*;
}

pub mod session {
    pub use dlms_session::*;
}

pub mod application {
    pub use dlms_application::*;
}

pub mod asn1 {
    pub use dlms_asn1::*;
}
