//! Serial port transport implementation

use crate::stream::{receive_from, StreamAccessor};
use crate::transport::{ExchangeLock, ReceiveParams, Transport};
use async_trait::async_trait;
use bytes::BytesMut;
use dlms_core::{DlmsError, DlmsResult};
use std::fmt;
use std::ops::{Deref, DerefMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialStream;

/// Wrapper for SerialStream that implements Debug
struct DebugSerialStream(SerialStream);

impl fmt::Debug for DebugSerialStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialStream").finish()
    }
}

impl Deref for DebugSerialStream {
    type Target = SerialStream;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DebugSerialStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Serial port transport layer settings
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
    pub flow_control: tokio_serial::FlowControl,
}

impl SerialSettings {
    /// Create new serial settings, 8N1 without flow control
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            data_bits: tokio_serial::DataBits::Eight,
            stop_bits: tokio_serial::StopBits::One,
            parity: tokio_serial::Parity::None,
            flow_control: tokio_serial::FlowControl::None,
        }
    }
}

/// Serial port transport layer implementation
#[derive(Debug)]
pub struct SerialTransport {
    stream: Option<DebugSerialStream>,
    settings: SerialSettings,
    lock: ExchangeLock,
}

impl SerialTransport {
    /// Create a new, unopened serial transport
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            stream: None,
            settings,
            lock: ExchangeLock::new(),
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn stream_mut(&mut self) -> DlmsResult<&mut DebugSerialStream> {
        self.stream.as_mut().ok_or_else(|| {
            DlmsError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Serial stream not connected",
            ))
        })
    }
}

#[async_trait]
impl StreamAccessor for SerialTransport {
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
impl Transport for SerialTransport {
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

        let builder = tokio_serial::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .stop_bits(self.settings.stop_bits)
            .parity(self.settings.parity)
            .flow_control(self.settings.flow_control);

        let stream = SerialStream::open(&builder).map_err(|e| {
            DlmsError::Connection(std::io::Error::other(format!(
                "Failed to open serial port {}: {}",
                self.settings.port_name, e
            )))
        })?;

        log::debug!("Opened {}", self.describe());
        self.stream = Some(DebugSerialStream(stream));
        Ok(())
    }

    async fn close(&mut self) -> DlmsResult<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.flush().await {
                log::debug!("Flush of {} failed: {}", self.describe(), e);
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
        format!("serial://{}@{}", self.settings.port_name, self.settings.baud_rate)
    }
}
