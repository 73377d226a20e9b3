//! Run configuration

use dlms_client::ClientSettings;
use dlms_core::cosem::class_id;
use dlms_core::{CosemObject, DlmsError, DlmsResult, ObisCode};
use serde::{Deserialize, Serialize};

/// One attribute read performed by every session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSpec {
    pub class_id: u16,
    pub logical_name: ObisCode,
    pub attribute: u8,
    /// Base name for short name referencing
    #[serde(default)]
    pub short_name: Option<u16>,
}

impl ReadSpec {
    pub fn new(class_id: u16, logical_name: ObisCode, attribute: u8) -> Self {
        Self {
            class_id,
            logical_name,
            attribute,
            short_name: None,
        }
    }

    /// Fresh client-side object to read into
    pub fn object(&self) -> CosemObject {
        let object = CosemObject::new(self.class_id, self.logical_name);
        match self.short_name {
            Some(short_name) => object.with_short_name(short_name),
            None => object,
        }
    }
}

/// Energy register scaler/unit and value,
/// then the clock time
pub fn default_reads() -> Vec<ReadSpec> {
    let energy = ObisCode::new(1, 0, 1, 8, 0, 255);
    vec![
        ReadSpec::new(class_id::REGISTER, energy, 3),
        ReadSpec::new(class_id::REGISTER, energy, 2),
        ReadSpec::new(class_id::CLOCK, ObisCode::new(0, 0, 1, 0, 1, 255), 2),
    ]
}

/// Everything a run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Settings of the first endpoint; session `i` uses port `base + i`
    pub base: ClientSettings,
    pub session_count: usize,
    /// Maximum number of sessions running at once
    pub concurrency: usize,
    /// Connect, initialize and close once before the measured session, on by default
    pub warm_up: bool,
    pub reads: Vec<ReadSpec>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base: ClientSettings::default(),
            session_count: 1,
            concurrency: 1,
            warm_up: true,
            reads: default_reads(),
        }
    }
}

impl RunConfig {
    /// `session_count` sessions, all allowed to run at once
    pub fn new(base: ClientSettings, session_count: usize) -> Self {
        Self {
            base,
            session_count,
            concurrency: session_count.max(1),
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_reads(mut self, reads: Vec<ReadSpec>) -> Self {
        self.reads = reads;
        self
    }

    pub fn with_warm_up(mut self, warm_up: bool) -> Self {
        self.warm_up = warm_up;
        self
    }

    /// # Errors
    ///
    /// `InvalidData` for a zero concurrency bound or invalid base settings.
    pub fn validate(&self) -> DlmsResult<()> {
        if self.concurrency == 0 {
            return Err(DlmsError::InvalidData(
                "Concurrency bound must be at least 1".to_string(),
            ));
        }
        self.base.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reads() {
        let reads = default_reads();
        assert_eq!(reads.len(), 3);
        assert_eq!(reads[0].attribute, 3);
        assert_eq!(reads[2].object().class_id(), class_id::CLOCK);
    }

    #[test]
    fn test_concurrency_defaults_to_session_count() {
        let config = RunConfig::new(ClientSettings::default(), 10);
        assert_eq!(config.concurrency, 10);
        assert!(config.warm_up);
        assert!(config.validate().is_ok());
        assert!(config.with_concurrency(0).validate().is_err());
    }
}
