//! Per-slot endpoint derivation

use dlms_client::{ClientSettings, MediaSettings};
use dlms_core::{DlmsError, DlmsResult};

/// Settings for session `index`: the base settings with TCP port `base + index`
///
/// # Errors
///
/// `InvalidData` if the port overflows, or for a serial medium with
/// `index > 0` since a serial port cannot be offset.
pub fn derive_endpoint(base: &ClientSettings, index: usize) -> DlmsResult<ClientSettings> {
    match &base.media {
        MediaSettings::Tcp(tcp) => {
            let port = u16::try_from(index)
                .ok()
                .and_then(|offset| tcp.port.checked_add(offset))
                .ok_or_else(|| {
                    DlmsError::InvalidData(format!(
                        "Port {} + {} is out of range",
                        tcp.port, index
                    ))
                })?;
            base.with_port(port)
        }
        MediaSettings::Serial { port_name, .. } if index > 0 => Err(DlmsError::InvalidData(
            format!("Serial port {} cannot host session {}", port_name, index),
        )),
        MediaSettings::Serial { .. } => Ok(base.clone()),
    }
}

/// Display name of session `index`, also when its settings cannot be derived
pub fn endpoint_name(base: &ClientSettings, index: usize) -> String {
    derive_endpoint(base, index)
        .map(|settings| settings.endpoint())
        .unwrap_or_else(|_| format!("{}#{}", base.endpoint(), index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ports_follow_index() {
        let base = ClientSettings::builder().tcp("10.0.0.5", 55555).build().unwrap();
        let names: Vec<String> = (0..3).map(|i| endpoint_name(&base, i)).collect();
        assert_eq!(names, ["10.0.0.5:55555", "10.0.0.5:55556", "10.0.0.5:55557"]);
    }

    #[test]
    fn test_port_overflow() {
        let base = ClientSettings::builder().tcp("10.0.0.5", 65535).build().unwrap();
        assert!(derive_endpoint(&base, 0).is_ok());
        assert!(derive_endpoint(&base, 1).is_err());
    }

    #[test]
    fn test_serial_hosts_one_session() {
        let base = ClientSettings::builder().serial("/dev/ttyUSB0", 9600).build().unwrap();
        assert_eq!(derive_endpoint(&base, 0).unwrap(), base);
        assert!(derive_endpoint(&base, 1).is_err());
        assert_eq!(endpoint_name(&base, 1), "/dev/ttyUSB0#1");
    }
}
