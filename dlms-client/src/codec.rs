//! Contract between the exchange engine and a protocol codec
//!
//! A codec owns everything protocol specific for one association: link
//! framing, APDU encoding, reply parsing and block reassembly. The engine
//! and the session only move frames.

use dlms_core::{DataObject, DlmsResult, ObjectIdentity};
use dlms_session::FrameStatus;
use dlms_transport::ReceiveParams;
use std::time::Duration;

/// What the next request must be to continue a partial reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// The link layer delivered one segment; ask for the next one
    LinkSegment,
    /// The application sent block `n`; ask for the block after it
    DataBlock(u32),
}

/// One parsed reply frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    /// Complete frame as received
    pub frame: Vec<u8>,
    /// Reassembled APDU; empty while segments are outstanding or when the
    /// frame carried none
    pub payload: Vec<u8>,
    /// Decoded attribute or method return value, once complete
    pub value: Option<DataObject>,
    pub continuation: Option<Continuation>,
    /// Non-zero when the device reported a failure
    pub error_code: u8,
}

impl Reply {
    pub fn new(frame: Vec<u8>) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }

    pub fn is_partial(&self) -> bool {
        self.continuation.is_some()
    }
}

/// Stateful encoder/decoder for one association
pub trait ProtocolCodec: Send {
    /// Receive rule for this framing
    fn receive_params(&self, wait_time: Duration, min_count: usize) -> ReceiveParams;

    /// Link establishment frame, if the framing has one
    fn build_link_request(&mut self) -> DlmsResult<Option<Vec<u8>>>;

    fn parse_link_reply(&mut self, reply: &Reply) -> DlmsResult<()>;

    /// Frames carrying the association request, sent in order
    fn build_association_requests(&mut self) -> DlmsResult<Vec<Vec<u8>>>;

    fn parse_association_reply(&mut self, reply: &Reply) -> DlmsResult<()>;

    /// Whether the association needs a challenge-response pass
    fn requires_authentication(&self) -> bool;

    fn build_authentication_requests(&mut self) -> DlmsResult<Vec<Vec<u8>>>;

    /// Verify the server's answer to the client challenge
    ///
    /// # Errors
    ///
    /// `AuthenticationFailed` on mismatch.
    fn parse_authentication_reply(&mut self, reply: &Reply) -> DlmsResult<()>;

    fn build_read_request(&mut self, object: &ObjectIdentity, attribute: u8) -> DlmsResult<Vec<Vec<u8>>>;

    fn build_continuation(&mut self, continuation: &Continuation) -> DlmsResult<Vec<u8>>;

    /// Whether the accumulated bytes form a complete frame
    fn try_assemble_frame(&self, data: &[u8]) -> DlmsResult<FrameStatus>;

    fn parse_reply(&mut self, frame: &[u8]) -> DlmsResult<Reply>;

    /// Frames releasing the association; empty if the framing has none
    fn build_release_request(&mut self) -> DlmsResult<Vec<Vec<u8>>>;

    fn build_disconnect_request(&mut self) -> DlmsResult<Option<Vec<u8>>>;

    /// Forget all association and link state
    fn reset(&mut self);
}
