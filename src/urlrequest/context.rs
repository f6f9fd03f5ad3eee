//! Client configuration and the shared request context.
//!
//! Based on Chromium's `net::URLRequestContext`: one place that bundles the
//! settings and collaborators every session of a client uses.

use crate::http::auth::CredentialPrompt;
use crate::socket::authcache::CredentialStore;
use crate::socket::proxy::{ProxyResolver, ProxySettings};
use crate::socket::transport::{TcpTransport, Transport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Settings a host product loads from its configuration layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `User-Agent` override. `None` uses the process-wide default.
    pub user_agent: Option<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub keep_alive: bool,
    /// Advertise and decode gzip/deflate.
    pub compression: bool,
    /// Send a `Date` header.
    pub send_date: bool,
    /// `Content-Type` for requests with a body that do not set one.
    pub content_type: Option<String>,
    /// Answer 401/407 challenges.
    pub authentication: bool,
    /// Send cached credentials on a session's first request.
    pub allow_preauth: bool,
    /// Consult the interactive credential prompt.
    pub show_auth_prompt: bool,
    /// Clear both credential caches after every logical request.
    pub reset_credentials: bool,
    /// Reach loopback hosts directly even when a proxy is set.
    pub bypass_loopback: bool,
    #[serde(skip)]
    pub proxy: Option<ProxySettings>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            connect_timeout: Duration::from_secs(120),
            read_timeout: Duration::from_secs(3600),
            write_timeout: Duration::from_secs(3600),
            follow_redirects: true,
            max_redirects: 2,
            keep_alive: true,
            compression: true,
            send_date: false,
            content_type: None,
            authentication: true,
            allow_preauth: false,
            show_auth_prompt: false,
            reset_credentials: false,
            bypass_loopback: true,
            proxy: None,
        }
    }
}

/// Everything the sessions of one client share.
pub struct RequestContext {
    pub config: ClientConfig,
    pub transport: Arc<dyn Transport>,
    pub credentials: CredentialStore,
    pub prompt: Option<Arc<dyn CredentialPrompt>>,
    /// Takes precedence over `config.proxy`.
    pub proxy_resolver: Option<Arc<dyn ProxyResolver>>,
}

impl RequestContext {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: Arc::new(TcpTransport::new()),
            credentials: CredentialStore::new(),
            prompt: None,
            proxy_resolver: None,
        }
    }

    /// The proxy collaborator in effect, if any.
    pub fn proxy(&self) -> Option<&dyn ProxyResolver> {
        match &self.proxy_resolver {
            Some(resolver) => Some(resolver.as_ref()),
            None => self.config.proxy.as_ref().map(|p| p as &dyn ProxyResolver),
        }
    }

    /// The prompt, only when prompting is switched on.
    pub fn prompt(&self) -> Option<&dyn CredentialPrompt> {
        if !self.config.show_auth_prompt {
            return None;
        }
        self.prompt.as_deref()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("config", &self.config)
            .field("prompt", &self.prompt.is_some())
            .field("proxy_resolver", &self.proxy_resolver.is_some())
            .finish_non_exhaustive()
    }
}
