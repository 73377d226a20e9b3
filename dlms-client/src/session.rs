//! Session state machine
//!
//! A [`Session`] owns one transport and one codec for its whole life and
//! walks them through link establishment, association, authentication and
//! attribute reads:
//!
//! ```text
//! Idle -> LinkEstablishing -> Associating -> Authenticating -> Ready <-> Exchanging
//!                                                                 |
//!                          (any failure) Faulted      Closing -> Closed
//! ```
//!
//! Operations called in the wrong state fail with `InvalidData` and leave
//! the state alone. Any failure during a transition moves the session to
//! `Faulted`; the owner is still expected to call [`Session::close`].

use crate::codec::{ProtocolCodec, Reply};
use crate::dlms_codec::DlmsCodec;
use crate::exchange::{ExchangeEngine, LogTraceSink};
use crate::settings::ClientSettings;
use dlms_core::{CosemObject, DataObject, DlmsError, DlmsResult};
use dlms_transport::Transport;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

/// Protocol state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    LinkEstablishing,
    Associating,
    Authenticating,
    Ready,
    Exchanging,
    Closing,
    Closed,
    /// A transition failed; only `close` is meaningful
    Faulted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One conversation with one meter
pub struct Session {
    transport: Box<dyn Transport>,
    codec: Box<dyn ProtocolCodec>,
    engine: ExchangeEngine,
    state: SessionState,
    reached_ready: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.transport.describe())
            .field("state", &self.state)
            .field("engine", &self.engine)
            .finish()
    }
}

impl Session {
    pub fn new(transport: Box<dyn Transport>, codec: Box<dyn ProtocolCodec>, engine: ExchangeEngine) -> Self {
        Self {
            transport,
            codec,
            engine,
            state: SessionState::Idle,
            reached_ready: false,
        }
    }

    /// Session with the transport and [`DlmsCodec`] described by `settings`
    ///
    /// # Errors
    ///
    /// `InvalidData` when the settings are inconsistent.
    pub fn from_settings(settings: &ClientSettings) -> DlmsResult<Self> {
        let codec = DlmsCodec::new(settings)?;
        let mut engine = ExchangeEngine::new(settings.exchange);
        if settings.trace {
            engine = engine.with_trace(Arc::new(LogTraceSink));
        }
        Ok(Self::new(
            settings.media.create_transport(),
            Box::new(codec),
            engine,
        ))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    fn expect_state(&self, expected: SessionState, operation: &str) -> DlmsResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DlmsError::InvalidData(format!(
                "{} requires state {}, session is {}",
                operation, expected, self.state
            )))
        }
    }

    fn settle<T>(&mut self, result: DlmsResult<T>, next: SessionState) -> DlmsResult<T> {
        match result {
            Ok(value) => {
                self.state = next;
                if next == SessionState::Ready {
                    self.reached_ready = true;
                }
                Ok(value)
            }
            Err(e) => {
                warn!("{}: session faulted: {}", self.transport.describe(), e);
                self.state = SessionState::Faulted;
                Err(e)
            }
        }
    }

    /// Open the transport unless it already is
    pub async fn open(&mut self) -> DlmsResult<()> {
        if matches!(
            self.state,
            SessionState::Closing | SessionState::Closed | SessionState::Faulted
        ) {
            return Err(DlmsError::InvalidData(format!(
                "Cannot open a session in state {}",
                self.state
            )));
        }
        if self.transport.is_open() {
            return Ok(());
        }
        let result = self.transport.open().await;
        let state = self.state;
        self.settle(result, state)
    }

    /// Exchange the link request, if the framing has one
    pub async fn establish_link(&mut self) -> DlmsResult<()> {
        self.expect_state(SessionState::Idle, "establish_link")?;
        self.state = SessionState::LinkEstablishing;
        let result = self.exchange_link().await;
        self.settle(result, SessionState::Associating)
    }

    async fn exchange_link(&mut self) -> DlmsResult<()> {
        if let Some(frame) = self.codec.build_link_request()? {
            let reply = self
                .engine
                .send_and_receive(self.transport.as_mut(), self.codec.as_mut(), &frame)
                .await?;
            self.codec.parse_link_reply(&reply)?;
            debug!("{}: link established", self.transport.describe());
        }
        Ok(())
    }

    /// Send the association request and evaluate the response
    pub async fn associate(&mut self) -> DlmsResult<()> {
        self.expect_state(SessionState::Associating, "associate")?;
        let result = self.exchange_association().await;
        let next = if self.codec.requires_authentication() {
            SessionState::Authenticating
        } else {
            SessionState::Ready
        };
        self.settle(result, next)
    }

    /// Only the reply to the last request frame reaches
    /// `parse_association_reply`; earlier ones are link acknowledgements
    /// already consumed by `parse_reply`.
    async fn exchange_association(&mut self) -> DlmsResult<()> {
        let frames = self.codec.build_association_requests()?;
        let reply = self.drive(&frames).await?;
        self.codec.parse_association_reply(&reply)
    }

    /// Run the challenge-response pass of high level authentication
    pub async fn authenticate(&mut self) -> DlmsResult<()> {
        self.expect_state(SessionState::Authenticating, "authenticate")?;
        let result = self.exchange_authentication().await;
        self.settle(result, SessionState::Ready)
    }

    async fn exchange_authentication(&mut self) -> DlmsResult<()> {
        let frames = self.codec.build_authentication_requests()?;
        let reply = self.drive(&frames).await?;
        self.codec.parse_authentication_reply(&reply)
    }

    /// Link, associate and authenticate as required
    pub async fn initialize_connection(&mut self) -> DlmsResult<()> {
        self.establish_link().await?;
        self.associate().await?;
        if self.state == SessionState::Authenticating {
            self.authenticate().await?;
        }
        info!("{}: association ready", self.transport.describe());
        Ok(())
    }

    /// Read one attribute and store it in `object`
    ///
    /// # Errors
    ///
    /// `InvalidData` outside `Ready`; otherwise any exchange failure, after
    /// which the session is `Faulted`.
    pub async fn read(&mut self, object: &mut CosemObject, attribute: u8) -> DlmsResult<DataObject> {
        self.expect_state(SessionState::Ready, "read")?;
        self.state = SessionState::Exchanging;
        let result = self.exchange_read(object, attribute).await;
        let value = self.settle(result, SessionState::Ready)?;
        object.set_attribute(attribute, value.clone());
        Ok(value)
    }

    async fn exchange_read(&mut self, object: &CosemObject, attribute: u8) -> DlmsResult<DataObject> {
        let frames = self.codec.build_read_request(&object.identity(), attribute)?;
        let reply = self.drive(&frames).await?;
        reply.value.ok_or_else(|| {
            DlmsError::Protocol(format!(
                "No value returned for {} attribute {}",
                object.logical_name(),
                attribute
            ))
        })
    }

    /// Send `frames` in order, each with block continuation, and return the
    /// reply to the last one
    async fn drive(&mut self, frames: &[Vec<u8>]) -> DlmsResult<Reply> {
        let mut last = None;
        for frame in frames {
            last = Some(
                self.engine
                    .read_data_block(self.transport.as_mut(), self.codec.as_mut(), frame)
                    .await?,
            );
        }
        last.ok_or_else(|| DlmsError::InvalidData("Codec produced no request frames".to_string()))
    }

    /// Release the association and close the transport
    ///
    /// Safe from any state and idempotent. Release and disconnect are only
    /// attempted if the session was ever `Ready`; their failures are logged.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let endpoint = self.transport.describe();
        let release = self.reached_ready && self.transport.is_open();
        self.state = SessionState::Closing;

        if release {
            let teardown = self.engine.for_teardown();
            if let Err(e) = self.release(&teardown).await {
                warn!("{}: release failed: {}", endpoint, e);
            }
            if let Err(e) = self.disconnect(&teardown).await {
                warn!("{}: disconnect failed: {}", endpoint, e);
            }
        }

        if self.transport.is_open() {
            if let Err(e) = self.transport.close().await {
                warn!("{}: closing transport failed: {}", endpoint, e);
            }
        }
        self.codec.reset();
        self.state = SessionState::Closed;
        debug!("{}: session closed", endpoint);
    }

    async fn release(&mut self, teardown: &ExchangeEngine) -> DlmsResult<()> {
        for frame in self.codec.build_release_request()? {
            teardown
                .send_and_receive(self.transport.as_mut(), self.codec.as_mut(), &frame)
                .await?;
        }
        Ok(())
    }

    async fn disconnect(&mut self, teardown: &ExchangeEngine) -> DlmsResult<()> {
        if let Some(frame) = self.codec.build_disconnect_request()? {
            teardown
                .send_and_receive(self.transport.as_mut(), self.codec.as_mut(), &frame)
                .await?;
        }
        Ok(())
    }
}
