//! Stream accessor trait and the shared receive rule

use crate::transport::ReceiveParams;
use async_trait::async_trait;
use bytes::BytesMut;
use dlms_core::{DlmsError, DlmsResult};
use std::time::Duration;
use tokio::time::Instant;

const READ_CHUNK: usize = 1024;

/// Stream accessor interface to access a physical stream to a remote meter
#[async_trait]
pub trait StreamAccessor: Send {
    /// Read available data, waiting for at least one byte
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF
    async fn read(&mut self, buf: &mut [u8]) -> DlmsResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, buf: &[u8]) -> DlmsResult<()>;

    /// Flush any buffered data
    async fn flush(&mut self) -> DlmsResult<()>;
}

/// Read from `stream` into `reply` following the receive rule
///
/// The call is satisfied once it has read at least `min_count` bytes and,
/// when a terminator is set, the last byte read is the terminator. With
/// `all_data` any bytes that are already buffered are drained as well.
///
/// # Returns
///
/// `Ok(false)` if `wait_time` elapsed before the rule was satisfied.
///
/// # Errors
///
/// Returns `Connection(UnexpectedEof)` when the peer closed the stream.
pub async fn receive_from<S>(
    stream: &mut S,
    params: &ReceiveParams,
    reply: &mut BytesMut,
) -> DlmsResult<bool>
where
    S: StreamAccessor + ?Sized,
{
    let deadline = Instant::now() + params.wait_time;
    let min_count = params.min_count.max(1);
    let mut chunk = [0u8; READ_CHUNK];
    let mut received = 0usize;

    loop {
        let satisfied = received >= min_count
            && params
                .terminator
                .is_none_or(|terminator| reply.last() == Some(&terminator));
        if satisfied {
            break;
        }

        let n = match tokio::time::timeout_at(deadline, stream.read(&mut chunk)).await {
            Ok(result) => result?,
            Err(_) => return Ok(false),
        };
        if n == 0 {
            return Err(eof());
        }
        reply.extend_from_slice(&chunk[..n]);
        received += n;
    }

    if params.all_data {
        // Drain without waiting: a zero timeout still polls the read once.
        while let Ok(result) = tokio::time::timeout(Duration::ZERO, stream.read(&mut chunk)).await {
            match result? {
                0 => break,
                n => reply.extend_from_slice(&chunk[..n]),
            }
        }
    }

    Ok(true)
}

fn eof() -> DlmsError {
    DlmsError::Connection(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "Connection closed by peer",
    ))
}
