//! TCP transport implementation

use crate::stream::{receive_from, StreamAccessor};
use crate::transport::{ExchangeLock, ReceiveParams, Transport};
use async_trait::async_trait;
use bytes::BytesMut;
use dlms_core::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Wrapper for TcpStream that implements Debug
struct DebugTcpStream(TcpStream);

impl fmt::Debug for DebugTcpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpStream").finish()
    }
}

impl Deref for DebugTcpStream {
    type Target = TcpStream;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DebugTcpStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// TCP transport layer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpSettings {
    pub host: String,
    pub port: u16,
    /// Budget for establishing the connection
    pub connect_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Create TCP settings with a connect timeout
    pub fn with_timeout(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
            ..Self::new(host, port)
        }
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<DebugTcpStream>,
    settings: TcpSettings,
    lock: ExchangeLock,
}

impl TcpTransport {
    /// Create a new, unopened TCP transport
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            lock: ExchangeLock::new(),
        }
    }

    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }

    fn stream_mut(&mut self) -> DlmsResult<&mut DebugTcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            DlmsError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn read(&mut self, buf: &mut [u8]) -> DlmsResult<usize> {
        let stream = self.stream_mut()?;
        Ok(stream.read(buf).await?)
    }

    async fn write_all(&mut self, buf: &[u8]) -> DlmsResult<()> {
        let stream = self.stream_mut()?;
        Ok(stream.write_all(buf).await?)
    }

    async fn flush(&mut self) -> DlmsResult<()> {
        let stream = self.stream_mut()?;
        Ok(stream.flush().await?)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn open(&mut self) -> DlmsResult<()> {
        if self.stream.is_some() {
            return Err(DlmsError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let address = (self.settings.host.as_str(), self.settings.port);
        let stream = if let Some(timeout) = self.settings.connect_timeout {
            tokio::time::timeout(timeout, TcpStream::connect(address))
                .await
                .map_err(|_| DlmsError::Timeout)??
        } else {
            TcpStream::connect(address).await?
        };
        stream.set_nodelay(true)?;

        log::debug!("Connected to {}", self.describe());
        self.stream = Some(DebugTcpStream(stream));
        Ok(())
    }

    async fn close(&mut self) -> DlmsResult<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                log::debug!("Shutdown of {} failed: {}", self.describe(), e);
            }
        }
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> DlmsResult<()> {
        self.write_all(data).await?;
        self.flush().await
    }

    async fn receive(&mut self, params: &ReceiveParams, reply: &mut BytesMut) -> DlmsResult<bool> {
        receive_from(self, params, reply).await
    }

    fn exchange_lock(&self) -> ExchangeLock {
        self.lock.clone()
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.settings.host, self.settings.port)
    }
}
