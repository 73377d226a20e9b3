//! Client configuration
//!
//! [`ClientSettings`] describes one endpoint: the medium, the framing and
//! the association parameters. It is plain data with serde derives so an
//! embedding application can load it from its own configuration files.
//!
//! ```rust,no_run
//! use dlms_client::{ClientSettings, InterfaceType};
//! use dlms_security::AuthenticationMechanism;
//!
//! let settings = ClientSettings::builder()
//!     .tcp("10.0.0.5", 4059)
//!     .interface(InterfaceType::Wrapper)
//!     .authentication(AuthenticationMechanism::Low)
//!     .password(b"12345678")
//!     .build()?;
//! # Ok::<(), dlms_core::DlmsError>(())
//! ```

use crate::exchange::ExchangePolicy;
use dlms_core::{DlmsError, DlmsResult};
use dlms_security::AuthenticationMechanism;
use dlms_transport::{SerialSettings, SerialTransport, TcpSettings, TcpTransport, Transport};
use serde::{Deserialize, Serialize};

/// Link framing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterfaceType {
    #[default]
    Hdlc,
    Wrapper,
}

/// Object addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Referencing {
    #[default]
    LogicalName,
    ShortName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ServiceClass {
    #[default]
    Confirmed,
    Unconfirmed,
}

/// Physical medium
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSettings {
    Tcp(TcpSettings),
    Serial { port_name: String, baud_rate: u32 },
}

impl MediaSettings {
    /// Create an unopened transport for this medium
    pub fn create_transport(&self) -> Box<dyn Transport> {
        match self {
            MediaSettings::Tcp(settings) => Box::new(TcpTransport::new(settings.clone())),
            MediaSettings::Serial {
                port_name,
                baud_rate,
            } => Box::new(SerialTransport::new(SerialSettings::new(
                port_name.clone(),
                *baud_rate,
            ))),
        }
    }
}

/// Keys for HLS GMAC
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GmacKeys {
    pub block_cipher_key: Vec<u8>,
    pub authentication_key: Vec<u8>,
    pub invocation_counter: u32,
}

/// Everything needed to talk to one meter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub media: MediaSettings,
    pub interface_type: InterfaceType,
    pub referencing: Referencing,
    /// Client SAP / wrapper port
    pub client_address: u16,
    /// Server logical device / wrapper port
    pub server_address: u16,
    /// HDLC physical address, 0 when unused
    pub server_physical_address: u16,
    pub authentication: AuthenticationMechanism,
    /// LLS password or HLS shared secret
    pub password: Vec<u8>,
    /// Client system title, required for HLS
    pub system_title: Vec<u8>,
    pub gmac: Option<GmacKeys>,
    pub service_class: ServiceClass,
    pub max_receive_pdu_size: u16,
    pub exchange: ExchangePolicy,
    /// Report every frame to the trace sink
    pub trace: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            media: MediaSettings::Tcp(TcpSettings::new("127.0.0.1", 4059)),
            interface_type: InterfaceType::Hdlc,
            referencing: Referencing::LogicalName,
            client_address: 0x10,
            server_address: 0x01,
            server_physical_address: 0,
            authentication: AuthenticationMechanism::None,
            password: Vec::new(),
            system_title: b"RSTCLNT0".to_vec(),
            gmac: None,
            service_class: ServiceClass::Confirmed,
            max_receive_pdu_size: 0xFFFF,
            exchange: ExchangePolicy::default(),
            trace: false,
        }
    }
}

impl ClientSettings {
    pub fn builder() -> ClientSettingsBuilder {
        ClientSettingsBuilder::new()
    }

    /// Same settings bound to another TCP port
    ///
    /// # Errors
    ///
    /// `InvalidData` for a serial medium, which has no port number.
    pub fn with_port(&self, port: u16) -> DlmsResult<Self> {
        match &self.media {
            MediaSettings::Tcp(tcp) => {
                let mut settings = self.clone();
                settings.media = MediaSettings::Tcp(TcpSettings {
                    port,
                    ..tcp.clone()
                });
                Ok(settings)
            }
            MediaSettings::Serial { port_name, .. } => Err(DlmsError::InvalidData(format!(
                "Serial endpoint {} cannot be bound to port {}",
                port_name, port
            ))),
        }
    }

    /// Human readable endpoint
    pub fn endpoint(&self) -> String {
        match &self.media {
            MediaSettings::Tcp(tcp) => format!("{}:{}", tcp.host, tcp.port),
            MediaSettings::Serial { port_name, .. } => port_name.clone(),
        }
    }

    /// Check the combination of options
    pub fn validate(&self) -> DlmsResult<()> {
        if self.authentication.is_high_level() {
            if self.referencing == Referencing::ShortName {
                return Err(DlmsError::InvalidData(
                    "High level authentication requires logical name referencing".to_string(),
                ));
            }
            if self.system_title.len() != 8 {
                return Err(DlmsError::InvalidData(format!(
                    "System title must be 8 bytes, got {}",
                    self.system_title.len()
                )));
            }
        }
        if self.authentication == AuthenticationMechanism::HighGmac && self.gmac.is_none() {
            return Err(DlmsError::InvalidData(
                "HLS GMAC requires block cipher and authentication keys".to_string(),
            ));
        }
        if self.authentication == AuthenticationMechanism::HighSha256 && self.password.is_empty() {
            return Err(DlmsError::InvalidData(
                "HLS SHA-256 requires a shared secret".to_string(),
            ));
        }
        if self.exchange.max_attempts == 0 {
            return Err(DlmsError::InvalidData(
                "At least one attempt per exchange is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ClientSettings`]
#[derive(Debug, Clone, Default)]
pub struct ClientSettingsBuilder {
    settings: ClientSettings,
}

impl ClientSettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure TCP transport
    pub fn tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.settings.media = MediaSettings::Tcp(TcpSettings::new(host, port));
        self
    }

    /// Configure Serial transport
    pub fn serial(mut self, port_name: impl Into<String>, baud_rate: u32) -> Self {
        self.settings.media = MediaSettings::Serial {
            port_name: port_name.into(),
            baud_rate,
        };
        self
    }

    pub fn interface(mut self, interface_type: InterfaceType) -> Self {
        self.settings.interface_type = interface_type;
        self
    }

    pub fn referencing(mut self, referencing: Referencing) -> Self {
        self.settings.referencing = referencing;
        self
    }

    pub fn client_address(mut self, address: u16) -> Self {
        self.settings.client_address = address;
        self
    }

    pub fn server_address(mut self, logical: u16, physical: u16) -> Self {
        self.settings.server_address = logical;
        self.settings.server_physical_address = physical;
        self
    }

    pub fn authentication(mut self, mechanism: AuthenticationMechanism) -> Self {
        self.settings.authentication = mechanism;
        self
    }

    pub fn password(mut self, password: &[u8]) -> Self {
        self.settings.password = password.to_vec();
        self
    }

    pub fn system_title(mut self, system_title: &[u8]) -> Self {
        self.settings.system_title = system_title.to_vec();
        self
    }

    pub fn gmac_keys(mut self, block_cipher_key: &[u8], authentication_key: &[u8]) -> Self {
        self.settings.gmac = Some(GmacKeys {
            block_cipher_key: block_cipher_key.to_vec(),
            authentication_key: authentication_key.to_vec(),
            invocation_counter: 0,
        });
        self
    }

    pub fn service_class(mut self, service_class: ServiceClass) -> Self {
        self.settings.service_class = service_class;
        self
    }

    pub fn max_pdu_size(mut self, size: u16) -> Self {
        self.settings.max_receive_pdu_size = size;
        self
    }

    pub fn exchange_policy(mut self, policy: ExchangePolicy) -> Self {
        self.settings.exchange = policy;
        self
    }

    pub fn trace(mut self, enabled: bool) -> Self {
        self.settings.trace = enabled;
        self
    }

    /// Validate and return the settings
    pub fn build(self) -> DlmsResult<ClientSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_port_overrides_only_the_port() {
        let base = ClientSettings::builder().tcp("10.0.0.5", 55555).build().unwrap();
        let derived = base.with_port(55556).unwrap();
        assert_eq!(derived.endpoint(), "10.0.0.5:55556");
        assert_eq!(base.endpoint(), "10.0.0.5:55555");
        assert_eq!(derived.client_address, base.client_address);
    }

    #[test]
    fn test_serial_has_no_port() {
        let base = ClientSettings::builder().serial("/dev/ttyUSB0", 9600).build().unwrap();
        assert!(base.with_port(1).is_err());
        assert_eq!(base.endpoint(), "/dev/ttyUSB0");
    }

    #[test]
    fn test_hls_with_short_names_is_rejected() {
        let result = ClientSettings::builder()
            .referencing(Referencing::ShortName)
            .authentication(AuthenticationMechanism::HighSha256)
            .password(b"secret")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_gmac_requires_keys() {
        let builder = ClientSettings::builder().authentication(AuthenticationMechanism::HighGmac);
        assert!(builder.clone().build().is_err());
        assert!(builder.gmac_keys(&[0; 16], &[1; 16]).build().is_ok());
    }
}
