//! Per-session target and request state.

use crate::base::neterror::NetError;
use crate::socket::authcache::AuthInfo;
use crate::socket::connection::Route;
use percent_encoding::percent_decode_str;
use url::Url;

/// Target URL plus the state that carries across requests on one session.
#[derive(Debug, Clone)]
pub struct Session {
    url: Url,
    /// Requests written on this session so far.
    pub request_count: u32,
    /// Route used by the previous request.
    pub last_route: Option<Route>,
    pub origin_auth: Option<AuthInfo>,
    pub proxy_auth: Option<AuthInfo>,
    pub redirect_count: u32,
    /// Protocol requested with `Upgrade`, if any.
    pub upgrade: Option<String>,
}

impl Session {
    pub fn new(url: Url) -> Result<Self, NetError> {
        check_url(&url)?;
        Ok(Self {
            url,
            request_count: 0,
            last_route: None,
            origin_auth: None,
            proxy_auth: None,
            redirect_count: 0,
            upgrade: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Point the session at a new target. Origin credentials are dropped
    /// when the host changes.
    pub fn set_url(&mut self, url: Url) -> Result<(), NetError> {
        check_url(&url)?;
        if !url.host_str().unwrap_or("").eq_ignore_ascii_case(self.domain()) {
            self.origin_auth = None;
        }
        self.url = url;
        Ok(())
    }

    /// Follow a `Location` value, absolute or relative to the current URL.
    pub fn redirect_to(&mut self, location: &str) -> Result<(), NetError> {
        let next = self
            .url
            .join(location.trim())
            .map_err(|_| NetError::InvalidRedirect)?;
        if !matches!(next.scheme(), "http" | "https") {
            return Err(NetError::InvalidRedirect);
        }
        tracing::debug!(from = %self.url, to = %next, "following redirect");
        self.set_url(next)
    }

    /// Reset per-request state before a new logical request.
    pub fn clear(&mut self) {
        self.redirect_count = 0;
    }

    pub fn domain(&self) -> &str {
        self.url.host_str().unwrap_or("")
    }

    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// Origin-form request target: path plus query.
    pub fn request_target(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        }
    }

    /// Absolute-form request target for proxies. The port is always
    /// written; userinfo never is.
    pub fn absolute_uri(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.url.scheme(),
            self.domain(),
            self.port(),
            self.request_target()
        )
    }

    /// `Host` value: the port is omitted when it is the scheme default.
    pub fn host_header(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.domain(), port),
            None => self.domain().to_string(),
        }
    }

    /// Credentials carried in the URL's userinfo.
    pub fn known_credentials(&self) -> Option<(String, String)> {
        if self.url.username().is_empty() {
            return None;
        }
        Some((
            percent_decode(self.url.username()),
            percent_decode(self.url.password().unwrap_or("")),
        ))
    }
}

fn check_url(url: &Url) -> Result<(), NetError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(NetError::UnknownUrlScheme);
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(NetError::InvalidUrl),
    }
}

fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}
