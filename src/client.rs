//! HTTP client with builder pattern.
//!
//! # Example
//!
//! ```rust,ignore
//! use wirenet::Client;
//!
//! let client = Client::builder()
//!     .max_redirects(5)
//!     .build();
//!
//! let resp = client.get("http://example.com/")
//!     .header("Accept", "text/html")
//!     .send()
//!     .await?;
//! println!("{}", resp.status());
//! ```

use crate::base::neterror::NetError;
use crate::http::auth::CredentialPrompt;
use crate::http::headercollection::HeaderCollection;
use crate::http::requestbody::RequestBody;
use crate::http::requestbuilder::PendingRequest;
use crate::http::response::HttpResponse;
use crate::socket::authcache::CredentialStore;
use crate::socket::proxy::{ProxyResolver, ProxySettings};
use crate::socket::transport::Transport;
use crate::urlrequest::context::{ClientConfig, RequestContext};
use crate::urlrequest::request::HttpSession;
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// HTTP client. Cheap to clone; clones share configuration, transport,
/// credential caches and cancellation.
///
/// Use [`Client::builder()`] to configure and create a client.
#[derive(Clone, Debug)]
pub struct Client {
    ctx: Arc<RequestContext>,
    cancel: CancellationToken,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Create a new client with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.ctx.config
    }

    /// The credential caches this client reads and fills.
    pub fn credentials(&self) -> &CredentialStore {
        &self.ctx.credentials
    }

    /// Cancels every in-flight and future request of this client.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Open a persistent session against `url`.
    pub fn session(&self, url: &str) -> Result<HttpSession, NetError> {
        let url = Url::parse(url).map_err(|_| NetError::InvalidUrl)?;
        HttpSession::new(Arc::clone(&self.ctx), url, self.cancel.clone())
    }

    /// Start building a GET request.
    pub fn get<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Start building a POST request.
    pub fn post<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Start building a PUT request.
    pub fn put<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Start building a DELETE request.
    pub fn delete<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Start building a HEAD request.
    pub fn head<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    /// Start building a request with custom method.
    pub fn request<U: AsRef<str>>(&self, method: Method, url: U) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            url: url.as_ref().to_string(),
            request: PendingRequest::new(method),
            error: None,
        }
    }
}

/// Builder for creating a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<CredentialStore>,
    prompt: Option<Arc<dyn CredentialPrompt>>,
    proxy_resolver: Option<Arc<dyn ProxyResolver>>,
    cancel: Option<CancellationToken>,
}

impl ClientBuilder {
    /// Start from a loaded configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.config.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn max_redirects(mut self, max: u32) -> Self {
        self.config.max_redirects = max;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn compression(mut self, compression: bool) -> Self {
        self.config.compression = compression;
        self
    }

    pub fn send_date(mut self, send_date: bool) -> Self {
        self.config.send_date = send_date;
        self
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.config.content_type = Some(content_type.to_string());
        self
    }

    pub fn authentication(mut self, enabled: bool) -> Self {
        self.config.authentication = enabled;
        self
    }

    pub fn allow_preauth(mut self, allow: bool) -> Self {
        self.config.allow_preauth = allow;
        self
    }

    /// Consult the prompt set with [`auth_prompt`](Self::auth_prompt).
    pub fn show_auth_prompt(mut self, show: bool) -> Self {
        self.config.show_auth_prompt = show;
        self
    }

    pub fn reset_credentials(mut self, reset: bool) -> Self {
        self.config.reset_credentials = reset;
        self
    }

    pub fn bypass_loopback(mut self, bypass: bool) -> Self {
        self.config.bypass_loopback = bypass;
        self
    }

    /// Set proxy.
    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Route through a custom proxy collaborator instead of
    /// [`ProxySettings`].
    pub fn proxy_resolver(mut self, resolver: Arc<dyn ProxyResolver>) -> Self {
        self.proxy_resolver = Some(resolver);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share credential caches with other clients.
    pub fn credential_store(mut self, store: CredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Interactive prompt; also switches prompting on.
    pub fn auth_prompt<P: CredentialPrompt + 'static>(mut self, prompt: P) -> Self {
        self.prompt = Some(Arc::new(prompt));
        self.config.show_auth_prompt = true;
        self
    }

    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        let mut ctx = RequestContext::new(self.config);
        if let Some(transport) = self.transport {
            ctx.transport = transport;
        }
        if let Some(store) = self.credentials {
            ctx.credentials = store;
        }
        ctx.prompt = self.prompt;
        ctx.proxy_resolver = self.proxy_resolver;

        Client {
            ctx: Arc::new(ctx),
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

/// Builder for a single request, sent on a fresh session.
pub struct RequestBuilder {
    client: Client,
    url: String,
    request: PendingRequest,
    error: Option<NetError>,
}

impl RequestBuilder {
    /// Add a header, replacing any earlier value of the same name. An
    /// invalid name or value fails the request at `send`.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Err(e) = self.request.headers.set(name, value, true) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Add every header from a collection.
    pub fn headers(mut self, headers: &HeaderCollection) -> Self {
        for (name, value) in headers.iter() {
            if let Err(e) = self.request.headers.add(name, value) {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Set request body.
    pub fn body<B: Into<RequestBody>>(mut self, body: B) -> Self {
        self.request.body = body.into();
        self
    }

    /// Send the request.
    pub async fn send(self) -> Result<HttpResponse, NetError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut session = self.client.session(&self.url)?;
        let result = session.execute(&self.request).await;
        session.close().await;
        result
    }
}
