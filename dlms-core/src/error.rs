use thiserror::Error;

/// Main error type for DLMS/COSEM client operations
#[derive(Error, Debug)]
pub enum DlmsError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The device answered with a non-zero result or diagnostic code
    #[error("Device reported error code 0x{0:02X}")]
    ErrorCode(u8),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Timeout")]
    Timeout,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Frame invalid: {0}")]
    FrameInvalid(String),
}

impl DlmsError {
    /// Device error code carried by this error, if any
    pub fn error_code(&self) -> Option<u8> {
        match self {
            DlmsError::ErrorCode(code) => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias for DLMS/COSEM operations
pub type DlmsResult<T> = Result<T, DlmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_message_contains_hex_code() {
        let err = DlmsError::ErrorCode(0x0E);
        assert!(err.to_string().contains("0x0E"));
        assert_eq!(err.error_code(), Some(0x0E));
    }
}
