//! Result of checking whether received bytes form a whole frame

/// Completeness of the bytes accumulated for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Complete,
    /// At least `missing` more bytes are needed
    Incomplete { missing: usize },
}

impl FrameStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, FrameStatus::Complete)
    }
}
