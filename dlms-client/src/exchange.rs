//! Exchange engine: one request, one complete reply
//!
//! The engine holds the transport's exchange lock for the whole
//! request/reply pair, feeds received bytes to the codec until it reports a
//! complete frame, and retries the full request when a receive times out.

use crate::codec::{Continuation, ProtocolCodec, Reply};
use bytes::BytesMut;
use dlms_core::{DlmsError, DlmsResult};
use dlms_session::FrameStatus;
use dlms_transport::Transport;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Timeout and retry policy of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangePolicy {
    /// Number of times a request is sent before giving up
    pub max_attempts: u32,
    /// Budget of a single receive call
    pub wait_time: Duration,
    /// Read-count hint for delimiter-less framing at the start of an attempt
    pub min_read_count: usize,
}

impl Default for ExchangePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_time: Duration::from_secs(10),
            min_read_count: 5,
        }
    }
}

impl ExchangePolicy {
    /// Same policy without retries, used during teardown
    pub fn single_attempt(&self) -> Self {
        Self {
            max_attempts: 1,
            ..*self
        }
    }
}

/// Observer of every frame crossing the transport
#[cfg_attr(test, mockall::automock)]
pub trait TraceSink: Send + Sync {
    fn frame_sent(&self, endpoint: &str, frame: &[u8]);
    fn frame_received(&self, endpoint: &str, frame: &[u8]);
}

/// Writes frames as hex at `trace` level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn frame_sent(&self, endpoint: &str, frame: &[u8]) {
        trace!("{} TX: {}", endpoint, to_hex(frame));
    }

    fn frame_received(&self, endpoint: &str, frame: &[u8]) {
        trace!("{} RX: {}", endpoint, to_hex(frame));
    }
}

/// Space separated upper case hex
pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Drives request/reply exchanges for one session
#[derive(Clone, Default)]
pub struct ExchangeEngine {
    policy: ExchangePolicy,
    trace: Option<Arc<dyn TraceSink>>,
}

impl std::fmt::Debug for ExchangeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeEngine")
            .field("policy", &self.policy)
            .field("tracing", &self.trace.is_some())
            .finish()
    }
}

impl ExchangeEngine {
    pub fn new(policy: ExchangePolicy) -> Self {
        Self {
            policy,
            trace: None,
        }
    }

    /// Report every frame to `sink`
    pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn policy(&self) -> &ExchangePolicy {
        &self.policy
    }

    /// Engine for teardown exchanges: one attempt, same tracing
    pub fn for_teardown(&self) -> Self {
        Self {
            policy: self.policy.single_attempt(),
            trace: self.trace.clone(),
        }
    }

    /// Send `request` and wait for one complete, successful reply
    ///
    /// # Errors
    ///
    /// - `InvalidData` for an empty request
    /// - `Connection` if the transport is not open or fails
    /// - `Transport` once every attempt timed out
    /// - `ErrorCode` if the device reported a failure
    pub async fn send_and_receive(
        &self,
        transport: &mut dyn Transport,
        codec: &mut dyn ProtocolCodec,
        request: &[u8],
    ) -> DlmsResult<Reply> {
        if request.is_empty() {
            return Err(DlmsError::InvalidData("Request frame is empty".to_string()));
        }
        if !transport.is_open() {
            return Err(DlmsError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Transport is not open",
            )));
        }

        let endpoint = transport.describe();
        let lock = transport.exchange_lock();
        let _guard = lock.acquire().await;
        let mut buffer = BytesMut::with_capacity(256);

        for attempt in 1..=self.policy.max_attempts {
            buffer.clear();
            let mut params = codec.receive_params(self.policy.wait_time, self.policy.min_read_count);

            if let Some(sink) = &self.trace {
                sink.frame_sent(&endpoint, request);
            }
            transport.send(request).await?;

            loop {
                if !transport.receive(&params, &mut buffer).await? || buffer.is_empty() {
                    warn!(
                        "{}: no complete reply within {:?} (attempt {}/{}, {} byte(s) buffered)",
                        endpoint,
                        self.policy.wait_time,
                        attempt,
                        self.policy.max_attempts,
                        buffer.len()
                    );
                    break;
                }

                match codec.try_assemble_frame(&buffer)? {
                    FrameStatus::Complete => {
                        if let Some(sink) = &self.trace {
                            sink.frame_received(&endpoint, &buffer);
                        }
                        let reply = codec.parse_reply(&buffer)?;
                        if reply.error_code != 0 {
                            debug!("{}: device reported error 0x{:02X}", endpoint, reply.error_code);
                            return Err(DlmsError::ErrorCode(reply.error_code));
                        }
                        return Ok(reply);
                    }
                    FrameStatus::Incomplete { missing } => {
                        if params.terminator.is_none() {
                            params.min_count = missing.max(1);
                        }
                    }
                }
            }
        }

        Err(DlmsError::Transport("no reply within time budget".to_string()))
    }

    /// Request the continuation of a partial reply
    pub async fn continue_block(
        &self,
        transport: &mut dyn Transport,
        codec: &mut dyn ProtocolCodec,
        continuation: &Continuation,
    ) -> DlmsResult<Reply> {
        let request = codec.build_continuation(continuation)?;
        self.send_and_receive(transport, codec, &request).await
    }

    /// Send `request` and follow continuations until the reply is whole
    pub async fn read_data_block(
        &self,
        transport: &mut dyn Transport,
        codec: &mut dyn ProtocolCodec,
        request: &[u8],
    ) -> DlmsResult<Reply> {
        let mut reply = self.send_and_receive(transport, codec, request).await?;
        while let Some(continuation) = reply.continuation {
            reply = self.continue_block(transport, codec, &continuation).await?;
        }
        Ok(reply)
    }
}
