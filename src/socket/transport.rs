//! Byte-stream transport: connect, and promote an open socket to TLS.
//!
//! The engine only needs these two capabilities from a transport. Reading
//! with a timeout, writing exactly and closing are layered on top by
//! [`BufferedStream`](super::bufferedstream::BufferedStream).

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::stream::BoxedSocket;
use crate::socket::tls::TlsConfig;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;

/// Future returned by [`Transport`] operations.
pub type Connecting<'a> = Pin<Box<dyn Future<Output = Result<BoxedSocket, NetError>> + Send + 'a>>;

/// Opens sockets for the connection manager.
///
/// Implementations must be cheap to share; the client holds one behind an
/// `Arc` for all of its sessions.
pub trait Transport: Send + Sync {
    /// Open a connection to `host:port`, optionally negotiating TLS
    /// directly. Gives up with `ConnectionTimedOut` after `timeout`.
    fn connect<'a>(
        &'a self,
        host: &'a str,
        port: u16,
        tls: bool,
        timeout: Duration,
    ) -> Connecting<'a>;

    /// Run a TLS handshake over an already open socket, in place.
    fn promote_to_tls<'a>(&'a self, socket: BoxedSocket, host: &'a str) -> Connecting<'a>;
}

/// TCP via tokio, TLS via BoringSSL.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    tls: TlsConfig,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tls_config(tls: TlsConfig) -> Self {
        Self { tls }
    }

    async fn open(&self, host: &str, port: u16) -> Result<TcpStream, NetError> {
        let name = host.trim_start_matches('[').trim_end_matches(']');
        let addrs: Vec<_> = tokio::net::lookup_host((name, port))
            .await
            .dns_context(host)?
            .collect();
        if addrs.is_empty() {
            return Err(NetError::NameNotResolved);
        }

        let mut last_err = NetError::ConnectionFailed;
        for addr in addrs {
            match TcpStream::connect(addr).await.connection_context(host, port) {
                Ok(stream) => {
                    // Requests are written in one piece; Nagle only adds latency.
                    let _ = stream.set_nodelay(true);
                    tracing::debug!(host = %host, port, addr = %addr, "tcp connected");
                    return Ok(stream);
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    async fn handshake(&self, socket: BoxedSocket, host: &str) -> Result<BoxedSocket, NetError> {
        let connector = self.tls.connector()?;
        let mut config = connector
            .configure()
            .map_err(|_| NetError::SslProtocolError)?;
        let server_name = host.trim_start_matches('[').trim_end_matches(']');
        if !TlsConfig::should_set_sni(host) {
            config.set_use_server_name_indication(false);
        }

        let stream = tokio_boring::connect(config, server_name, socket)
            .await
            .map_err(|e| {
                tracing::debug!(host = %host, error = ?e, "tls handshake failed");
                NetError::SslProtocolError
            })?;
        tracing::debug!(host = %host, "tls established");
        Ok(BoxedSocket::new(stream))
    }
}

impl Transport for TcpTransport {
    fn connect<'a>(
        &'a self,
        host: &'a str,
        port: u16,
        tls: bool,
        timeout: Duration,
    ) -> Connecting<'a> {
        Box::pin(async move {
            let stream = tokio::time::timeout(timeout, self.open(host, port))
                .await
                .map_err(|_| NetError::ConnectionTimedOut)??;
            let socket = BoxedSocket::new(stream);
            if tls {
                self.handshake(socket, host).await
            } else {
                Ok(socket)
            }
        })
    }

    fn promote_to_tls<'a>(&'a self, socket: BoxedSocket, host: &'a str) -> Connecting<'a> {
        Box::pin(self.handshake(socket, host))
    }
}
