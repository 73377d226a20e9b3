//! Transport contract consumed by the exchange engine

use async_trait::async_trait;
use bytes::BytesMut;
use dlms_core::DlmsResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// How a single `receive` call decides it has read enough
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveParams {
    /// Keep draining bytes that are already available once the rule is met
    pub all_data: bool,
    /// End-of-frame byte, `None` for delimiter-less framing
    pub terminator: Option<u8>,
    /// Minimum number of bytes this call must read
    pub min_count: usize,
    /// Budget for the whole call
    pub wait_time: Duration,
}

impl ReceiveParams {
    /// Rule for framing with an explicit end-of-frame delimiter
    pub fn terminated(terminator: u8, wait_time: Duration) -> Self {
        Self {
            all_data: false,
            terminator: Some(terminator),
            min_count: 1,
            wait_time,
        }
    }

    /// Rule for delimiter-less framing
    pub fn counted(min_count: usize, wait_time: Duration) -> Self {
        Self {
            all_data: true,
            terminator: None,
            min_count,
            wait_time,
        }
    }
}

/// Exclusion primitive scoping one request/reply exchange on an endpoint
///
/// Clones share the same lock.
#[derive(Debug, Clone, Default)]
pub struct ExchangeLock(Arc<Mutex<()>>);

impl ExchangeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other exchange is running on this endpoint
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        self.0.clone().lock_owned().await
    }
}

/// Byte-stream endpoint to a meter
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether `open` succeeded and `close` has not been called since
    fn is_open(&self) -> bool;

    /// Open the physical connection
    ///
    /// # Errors
    ///
    /// Fails if the transport is already open or the endpoint is unreachable.
    async fn open(&mut self) -> DlmsResult<()>;

    /// Close the physical connection. Closing a closed transport is a no-op.
    async fn close(&mut self) -> DlmsResult<()>;

    /// Send a complete frame
    async fn send(&mut self, data: &[u8]) -> DlmsResult<()>;

    /// Append received bytes to `reply` until `params` is satisfied
    ///
    /// # Returns
    ///
    /// `Ok(false)` when `wait_time` elapsed first. Bytes read before the
    /// timeout stay in `reply`.
    async fn receive(&mut self, params: &ReceiveParams, reply: &mut BytesMut) -> DlmsResult<bool>;

    /// Lock shared by every exchange on this transport
    fn exchange_lock(&self) -> ExchangeLock;

    /// Human readable endpoint, e.g. `tcp://10.0.0.5:4059`
    fn describe(&self) -> String;
}
