//! Socket abstraction for plain and TLS-promoted connections.
//!
//! A connection starts as plain TCP and may be promoted to TLS in place
//! (directly, or after a CONNECT tunnel). `BoxedSocket` erases which of the
//! two it currently is so the rest of the engine reads and writes one type.
//!
//! Based on Chromium's `StreamSocket` interface.

use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_boring::SslStream;

/// A trait for any socket that supports async read/write operations.
///
/// Chromium equivalent: `net::StreamSocket`
pub trait StreamSocket: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Whether the socket has been promoted to TLS.
    fn is_tls(&self) -> bool {
        false
    }
}

impl StreamSocket for TcpStream {}

impl<S: StreamSocket> StreamSocket for SslStream<S> {
    fn is_tls(&self) -> bool {
        true
    }
}

impl StreamSocket for tokio::io::DuplexStream {}

/// A boxed, object-safe [`StreamSocket`].
pub struct BoxedSocket {
    inner: Pin<Box<dyn StreamSocket>>,
}

impl BoxedSocket {
    pub fn new<S: StreamSocket>(socket: S) -> Self {
        Self {
            inner: Box::pin(socket),
        }
    }

    pub fn is_tls(&self) -> bool {
        self.inner.is_tls()
    }
}

impl std::fmt::Debug for BoxedSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedSocket")
            .field("tls", &self.is_tls())
            .finish()
    }
}

impl StreamSocket for BoxedSocket {
    fn is_tls(&self) -> bool {
        self.inner.is_tls()
    }
}

impl AsyncRead for BoxedSocket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for BoxedSocket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_shutdown(cx)
    }
}
