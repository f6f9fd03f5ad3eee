//! One connection per session: route selection, reuse, CONNECT tunneling
//! and TLS promotion.
//!
//! Roughly Chromium's `ClientSocketHandle` plus the proxy half of
//! `ConnectJob`, without a pool: a session owns at most one open
//! connection and decides per request whether it can keep using it.

use crate::base::loadstate::{LoadState, LoadStateTracker};
use crate::base::neterror::NetError;
use crate::http::responseparser::parse_status_line;
use crate::socket::bufferedstream::{BufferedStream, IoSettings, MAX_HEADER_BYTES};
use crate::socket::matcher::is_loopback_host;
use crate::socket::proxy::ProxyResolver;
use crate::socket::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A connection is retired after serving this many requests.
pub const MAX_REQUESTS_PER_CONNECTION: u32 = 20;

/// Where a request goes: the target, and the proxy in front of it if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Target host as it appears in the URL (IPv6 in brackets).
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub proxy: Option<(String, u16)>,
}

impl Route {
    /// Resolve the route for `url`.
    ///
    /// Loopback targets (when `bypass_loopback`) and hosts on the proxy's
    /// exception list are reached directly.
    pub fn resolve(
        url: &Url,
        proxy: Option<&dyn ProxyResolver>,
        bypass_loopback: bool,
    ) -> Result<Self, NetError> {
        let tls = match url.scheme() {
            "http" => false,
            "https" => true,
            _ => return Err(NetError::UnknownUrlScheme),
        };
        let host = url.host_str().ok_or(NetError::InvalidUrl)?.to_string();
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;

        let proxy = match proxy {
            Some(_) if bypass_loopback && is_loopback_host(&host) => None,
            Some(resolver) if resolver.match_exception(&host) => None,
            Some(resolver) => resolver.proxy_for_url(url),
            None => None,
        };

        Ok(Self {
            host,
            port,
            tls,
            proxy,
        })
    }

    /// TLS through a proxy: needs a CONNECT tunnel first.
    pub fn is_tunnel(&self) -> bool {
        self.proxy.is_some() && self.tls
    }

    /// Plain HTTP through a proxy: the request line carries an absolute URI.
    pub fn uses_absolute_form(&self) -> bool {
        self.proxy.is_some() && !self.tls
    }

    /// The endpoint the socket actually connects to.
    pub fn connect_target(&self) -> (&str, u16) {
        match &self.proxy {
            Some((host, port)) => (host.as_str(), *port),
            None => (self.host.as_str(), self.port),
        }
    }
}

/// Everything `open` needs besides the route.
#[derive(Debug, Clone)]
pub struct OpenParams {
    pub connect_timeout: Duration,
    pub io: IoSettings,
    /// `Proxy-Authorization` value for the CONNECT request.
    pub tunnel_auth: Option<String>,
}

/// Owns the session's transport endpoint.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    stream: Option<BufferedStream>,
    route: Option<Route>,
    uses: u32,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("open", &self.stream.is_some())
            .field("route", &self.route)
            .field("uses", &self.uses)
            .finish()
    }
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            stream: None,
            route: None,
            uses: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Requests served by the current connection.
    pub fn uses(&self) -> u32 {
        self.uses
    }

    /// Reuse needs an earlier request on this session, the same route as
    /// last time, and a connection that has not reached its request limit.
    pub fn can_reuse(&self, route: &Route, request_count: u32, last: Option<&Route>) -> bool {
        request_count > 0
            && self.stream.is_some()
            && last == Some(route)
            && self.route.as_ref() == Some(route)
            && self.uses < MAX_REQUESTS_PER_CONNECTION
    }

    /// Make sure a connection for `route` is open. Returns `true` when an
    /// existing connection was kept.
    pub async fn open(
        &mut self,
        route: &Route,
        request_count: u32,
        last: Option<&Route>,
        params: &OpenParams,
        load_state: &LoadStateTracker,
    ) -> Result<bool, NetError> {
        if self.can_reuse(route, request_count, last) {
            if let Some(stream) = self.stream.as_mut() {
                stream.set_settings(params.io.clone());
            }
            tracing::debug!(host = %route.host, uses = self.uses, "reusing connection");
            return Ok(true);
        }
        self.close().await;

        let (host, port) = route.connect_target();
        load_state.set(LoadState::Connecting);
        tracing::debug!(host = %host, port, tls = route.tls, proxied = route.proxy.is_some(), "opening connection");

        let direct_tls = route.tls && route.proxy.is_none();
        let socket = self
            .transport
            .connect(host, port, direct_tls, params.connect_timeout)
            .await
            .map_err(|e| match (&route.proxy, e) {
                (Some(_), NetError::ConnectionRefused | NetError::ConnectionFailed) => {
                    NetError::ProxyConnectionFailed
                }
                (_, e) => e,
            })?;
        let mut stream = BufferedStream::new(socket, params.io.clone());

        if route.is_tunnel() {
            load_state.set(LoadState::EstablishingProxyTunnel);
            if let Err(e) = establish_tunnel(&mut stream, route, params.tunnel_auth.as_deref()).await
            {
                stream.close().await;
                return Err(e);
            }
            load_state.set(LoadState::SslHandshake);
            let (plain, _) = stream.into_parts();
            let promoted = self.transport.promote_to_tls(plain, &route.host).await?;
            stream = BufferedStream::new(promoted, params.io.clone());
        }

        self.stream = Some(stream);
        self.route = Some(route.clone());
        self.uses = 0;
        Ok(false)
    }

    /// Count one request against the connection's limit.
    pub fn mark_used(&mut self) {
        self.uses += 1;
    }

    pub fn stream_mut(&mut self) -> Result<&mut BufferedStream, NetError> {
        self.stream.as_mut().ok_or(NetError::ConnectionClosed)
    }

    /// Release the endpoint. Safe to call when nothing is open.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(route = ?self.route, "closing connection");
            stream.close().await;
        }
        self.route = None;
        self.uses = 0;
    }

    /// Hand the open connection to the caller without closing it.
    pub fn steal(&mut self) -> Option<BufferedStream> {
        self.route = None;
        self.uses = 0;
        self.stream.take()
    }
}

/// Ask the proxy for a raw pipe to the target. The reply is read a line at
/// a time up to the blank line and must carry status 200.
async fn establish_tunnel(
    stream: &mut BufferedStream,
    route: &Route,
    auth: Option<&str>,
) -> Result<(), NetError> {
    let authority = format!("{}:{}", route.host, route.port);
    let mut request = format!("CONNECT {0} HTTP/1.0\r\nHost: {0}\r\n", authority);
    if let Some(auth) = auth {
        request.push_str("Proxy-Authorization: ");
        request.push_str(auth);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await?;

    let status_line = stream
        .read_line(MAX_HEADER_BYTES, NetError::ResponseHeadersTooBig)
        .await?
        .ok_or(NetError::TunnelConnectionFailed)?;
    let status = parse_status_line(&status_line).map(|(_, code)| code);

    loop {
        match stream
            .read_line(MAX_HEADER_BYTES, NetError::ResponseHeadersTooBig)
            .await?
        {
            Some(line) if line.is_empty() => break,
            Some(_) => continue,
            None => return Err(NetError::TunnelConnectionFailed),
        }
    }

    if status != Ok(200) {
        tracing::debug!(authority = %authority, status = ?status, "proxy refused tunnel");
        return Err(NetError::TunnelConnectionFailed);
    }
    // Bytes from the target before our TLS hello would corrupt the handshake.
    if stream.buffered() > 0 {
        return Err(NetError::TunnelConnectionFailed);
    }
    tracing::debug!(authority = %authority, "tunnel established");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::proxy::ProxySettings;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_direct_route() {
        let route = Route::resolve(&url("https://example.com/x"), None, true).unwrap();
        assert_eq!(route.connect_target(), ("example.com", 443));
        assert!(route.tls);
        assert!(!route.is_tunnel());
        assert!(!route.uses_absolute_form());
    }

    #[test]
    fn test_proxied_routes() {
        let proxy = ProxySettings::new("proxy.local:3128").unwrap();
        let plain = Route::resolve(&url("http://example.com/"), Some(&proxy), true).unwrap();
        assert_eq!(plain.connect_target(), ("proxy.local", 3128));
        assert!(plain.uses_absolute_form());

        let secure = Route::resolve(&url("https://example.com/"), Some(&proxy), true).unwrap();
        assert!(secure.is_tunnel());
    }

    #[test]
    fn test_loopback_bypass() {
        let proxy = ProxySettings::new("proxy.local:3128").unwrap();
        let route = Route::resolve(&url("http://127.0.0.1:8080/"), Some(&proxy), true).unwrap();
        assert_eq!(route.proxy, None);

        let route = Route::resolve(&url("http://127.0.0.1:8080/"), Some(&proxy), false).unwrap();
        assert!(route.proxy.is_some());
    }

    #[test]
    fn test_exception_bypass() {
        let proxy = ProxySettings::new("proxy.local:3128")
            .unwrap()
            .with_exceptions("*.corp");
        let route = Route::resolve(&url("http://wiki.corp/"), Some(&proxy), true).unwrap();
        assert_eq!(route.proxy, None);
    }

    #[test]
    fn test_unknown_scheme() {
        assert_eq!(
            Route::resolve(&url("ftp://example.com/"), None, true).unwrap_err(),
            NetError::UnknownUrlScheme
        );
    }
}
