//! Buffered reads over a block transport.
//!
//! Bytes read past a framing boundary (the end of a header block, a chunk
//! size line, a CONNECT reply) stay in one internal buffer and are served
//! before the socket is read again, so line-oriented and length-oriented
//! reads can be mixed freely without reordering bytes.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::stream::BoxedSocket;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Largest response header block accepted.
pub const MAX_HEADER_BYTES: usize = 128 * 1024;

/// Reads wait at most this long before the cancellation token is checked
/// again.
const READ_SLICE: Duration = Duration::from_millis(250);

const READ_CHUNK: usize = 16 * 1024;

/// Timeouts and cancellation applied to every read and write.
#[derive(Debug, Clone)]
pub struct IoSettings {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub cancel: CancellationToken,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(3600),
            write_timeout: Duration::from_secs(3600),
            cancel: CancellationToken::new(),
        }
    }
}

/// A socket plus the bytes already read from it but not yet consumed.
#[derive(Debug)]
pub struct BufferedStream {
    socket: BoxedSocket,
    leftover: BytesMut,
    settings: IoSettings,
}

impl BufferedStream {
    pub fn new(socket: BoxedSocket, settings: IoSettings) -> Self {
        Self {
            socket,
            leftover: BytesMut::new(),
            settings,
        }
    }

    pub fn is_tls(&self) -> bool {
        self.socket.is_tls()
    }

    pub fn set_settings(&mut self, settings: IoSettings) {
        self.settings = settings;
    }

    /// Number of buffered bytes not yet consumed.
    pub fn buffered(&self) -> usize {
        self.leftover.len()
    }

    /// Split into the raw socket and any buffered bytes.
    pub fn into_parts(self) -> (BoxedSocket, Bytes) {
        (self.socket, self.leftover.freeze())
    }

    /// One socket read appended to the buffer. Returns 0 at end of stream.
    ///
    /// The wait is sliced so cancellation is noticed between slices; the
    /// read budget spans all slices.
    async fn fill(&mut self) -> Result<usize, NetError> {
        let deadline = Instant::now() + self.settings.read_timeout;
        self.leftover.reserve(READ_CHUNK);
        loop {
            if self.settings.cancel.is_cancelled() {
                tracing::debug!("read cancelled");
                return Err(NetError::ReadTimeout);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(NetError::ReadTimeout);
            }
            let slice = READ_SLICE.min(deadline - now);
            if let Ok(res) =
                tokio::time::timeout(slice, self.socket.read_buf(&mut self.leftover)).await
            {
                let n = res.read_context()?;
                tokio::task::yield_now().await;
                return Ok(n);
            }
        }
    }

    /// Read up to the end of a response header block.
    ///
    /// Returns the block including its `CRLFCRLF` terminator. Anything after
    /// the terminator stays buffered for the body.
    pub async fn read_head(&mut self, limit: usize) -> Result<Bytes, NetError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = find_terminator(&self.leftover, scanned) {
                let end = pos + 4;
                if end > limit {
                    return Err(NetError::ResponseHeadersTooBig);
                }
                return Ok(self.leftover.split_to(end).freeze());
            }
            if self.leftover.len() > limit {
                return Err(NetError::ResponseHeadersTooBig);
            }
            // The terminator may straddle two reads.
            scanned = self.leftover.len().saturating_sub(3);

            if self.fill().await? == 0 {
                return Err(if self.leftover.is_empty() {
                    NetError::EmptyResponse
                } else {
                    NetError::InvalidHttpResponse
                });
            }
        }
    }

    /// Read one line, without its line ending.
    ///
    /// `None` means the stream ended cleanly before any byte of a new line.
    /// A line longer than `limit` fails with `overflow`.
    pub async fn read_line(
        &mut self,
        limit: usize,
        overflow: NetError,
    ) -> Result<Option<Bytes>, NetError> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.leftover[scanned..].iter().position(|&b| b == b'\n') {
                let pos = scanned + pos;
                if pos > limit {
                    return Err(overflow);
                }
                let mut line = self.leftover.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                return Ok(Some(line.freeze()));
            }
            if self.leftover.len() > limit {
                return Err(overflow);
            }
            scanned = self.leftover.len();

            if self.fill().await? == 0 {
                if self.leftover.is_empty() {
                    return Ok(None);
                }
                return Err(NetError::ConnectionClosed);
            }
        }
    }

    /// Append exactly `n` bytes to `out`, tolerating short reads.
    ///
    /// Ends with `ConnectionClosed` if the stream ends first; whatever did
    /// arrive is already in `out`.
    pub async fn read_exact_into(&mut self, out: &mut Vec<u8>, n: usize) -> Result<(), NetError> {
        out.try_reserve_exact(n)
            .map_err(|_| NetError::OutOfMemory)?;
        let mut remaining = n;
        loop {
            let take = remaining.min(self.leftover.len());
            out.extend_from_slice(&self.leftover.split_to(take));
            remaining -= take;
            if remaining == 0 {
                return Ok(());
            }
            if self.fill().await? == 0 {
                return Err(NetError::ConnectionClosed);
            }
        }
    }

    /// Append everything up to end of stream to `out`.
    pub async fn read_to_end_into(&mut self, out: &mut Vec<u8>) -> Result<(), NetError> {
        loop {
            out.try_reserve(self.leftover.len())
                .map_err(|_| NetError::OutOfMemory)?;
            out.extend_from_slice(&self.leftover.split());
            if self.fill().await? == 0 {
                return Ok(());
            }
        }
    }

    /// Write all of `data` and flush, within the write timeout.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), NetError> {
        let socket = &mut self.socket;
        let write = async move {
            socket.write_all(data).await?;
            socket.flush().await
        };
        tokio::time::timeout(self.settings.write_timeout, write)
            .await
            .map_err(|_| NetError::WriteTimeout)?
            .write_context()?;
        tokio::task::yield_now().await;
        Ok(())
    }

    /// Shut down the write side. Errors are ignored; the peer may be gone.
    pub async fn close(&mut self) {
        let _ = tokio::time::timeout(Duration::from_secs(1), self.socket.shutdown()).await;
        self.leftover.clear();
    }
}

fn find_terminator(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| p + from)
}
