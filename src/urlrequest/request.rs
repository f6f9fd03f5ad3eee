//! A persistent session against one target.

use crate::base::loadstate::{LoadState, LoadStateTracker};
use crate::base::neterror::NetError;
use crate::http::headercollection::HeaderCollection;
use crate::http::requestbody::RequestBody;
use crate::http::requestbuilder::PendingRequest;
use crate::http::response::HttpResponse;
use crate::socket::bufferedstream::BufferedStream;
use crate::socket::connection::ConnectionManager;
use crate::urlrequest::context::RequestContext;
use crate::urlrequest::job::HttpJob;
use crate::urlrequest::session::Session;
use http::Method;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Sends requests over one connection, reusing it while the target and
/// server allow. One request is in flight at a time.
pub struct HttpSession {
    ctx: Arc<RequestContext>,
    session: Session,
    connection: ConnectionManager,
    headers: HeaderCollection,
    cancel: CancellationToken,
    load_state: LoadStateTracker,
}

impl std::fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSession")
            .field("url", &self.session.url().as_str())
            .field("connection", &self.connection)
            .field("load_state", &self.load_state.get())
            .finish()
    }
}

impl HttpSession {
    pub fn new(ctx: Arc<RequestContext>, url: Url, cancel: CancellationToken) -> Result<Self, NetError> {
        let session = Session::new(url)?;
        let connection = ConnectionManager::new(Arc::clone(&ctx.transport));
        Ok(Self {
            ctx,
            session,
            connection,
            headers: HeaderCollection::new(),
            cancel,
            load_state: LoadStateTracker::new(),
        })
    }

    pub fn url(&self) -> &Url {
        self.session.url()
    }

    /// Point later requests at another URL. The connection is kept if the
    /// route stays the same.
    pub fn set_target(&mut self, url: &str) -> Result<(), NetError> {
        let url = Url::parse(url).map_err(|_| NetError::InvalidUrl)?;
        self.session.set_url(url)
    }

    /// Headers sent with every request on this session.
    pub fn headers_mut(&mut self) -> &mut HeaderCollection {
        &mut self.headers
    }

    /// Ask the server to switch protocols on the next request.
    pub fn request_upgrade(&mut self, protocol: &str) {
        self.session.upgrade = Some(protocol.to_string());
    }

    pub fn set_cancellation_token(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state.get()
    }

    /// A handle another task can poll while a request runs.
    pub fn load_state_tracker(&self) -> LoadStateTracker {
        self.load_state.clone()
    }

    /// Requests written on this session so far, resends included.
    pub fn request_count(&self) -> u32 {
        self.session.request_count
    }

    /// Send one logical request, following redirects and answering
    /// challenges as configured.
    pub async fn send(
        &mut self,
        method: Method,
        body: impl Into<RequestBody>,
    ) -> Result<HttpResponse, NetError> {
        let request = PendingRequest {
            method,
            headers: self.headers.clone(),
            body: body.into(),
        };
        self.execute(&request).await
    }

    pub(crate) async fn execute(&mut self, request: &PendingRequest) -> Result<HttpResponse, NetError> {
        if self.session.origin_auth.is_none() {
            // Credentials another session already proved for this host.
            self.session.origin_auth = self
                .ctx
                .credentials
                .origin()
                .find_for_domain(self.session.domain());
        }

        let mut job = HttpJob::new(&self.ctx, &self.cancel, &self.load_state);
        let result = job
            .run(&mut self.connection, &mut self.session, request)
            .await;
        if self.session.upgrade.is_some()
            && result.as_ref().map_or(true, |r| r.status() != 101)
        {
            self.session.upgrade = None;
        }
        result
    }

    /// Take the open connection, e.g. after a `101 Switching Protocols`.
    /// Bytes the server sent after the response head are in the stream's
    /// buffer.
    pub fn steal(&mut self) -> Option<BufferedStream> {
        self.session.upgrade = None;
        self.connection.steal()
    }

    /// Close the connection.
    pub async fn close(&mut self) {
        self.connection.close().await;
    }
}
