//! A single request/response exchange on a session's connection.
//!
//! Roughly Chromium's `HttpNetworkTransaction` for HTTP/1.x: pick the
//! route, get a connection, write the request, parse the response, and
//! decide whether the connection may be kept.

use crate::base::loadstate::{LoadState, LoadStateTracker};
use crate::base::neterror::NetError;
use crate::http::requestbuilder::{build_request, PendingRequest};
use crate::http::response::HttpResponse;
use crate::http::responseparser::{BodyFraming, ResponseParser};
use crate::socket::authcache::basic_credentials;
use crate::socket::bufferedstream::IoSettings;
use crate::socket::connection::{ConnectionManager, OpenParams, Route};
use crate::urlrequest::context::RequestContext;
use crate::urlrequest::session::Session;
use tokio_util::sync::CancellationToken;

/// Internal state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Connect,
    SendRequest,
    ReadHeaders,
    ReadBody,
    Done,
}

impl State {
    fn to_load_state(self) -> LoadState {
        match self {
            State::Idle | State::Done => LoadState::Idle,
            State::Connect => LoadState::Connecting,
            State::SendRequest => LoadState::SendingRequest,
            State::ReadHeaders => LoadState::WaitingForResponse,
            State::ReadBody => LoadState::ReadingResponse,
        }
    }
}

/// A failed attempt, and whether it ran on a reused connection.
struct Failure {
    error: NetError,
    reused: bool,
}

pub struct HttpTransaction<'a> {
    ctx: &'a RequestContext,
    cancel: &'a CancellationToken,
    load_state: &'a LoadStateTracker,
    state: State,
}

impl<'a> HttpTransaction<'a> {
    pub fn new(
        ctx: &'a RequestContext,
        cancel: &'a CancellationToken,
        load_state: &'a LoadStateTracker,
    ) -> Self {
        Self {
            ctx,
            cancel,
            load_state,
            state: State::Idle,
        }
    }

    fn set_state(&mut self, state: State) {
        self.state = state;
        self.load_state.set(state.to_load_state());
    }

    /// Run one exchange.
    ///
    /// A kept-alive connection the server has meanwhile dropped shows up as
    /// a failed write or an empty response; that case is retried once on a
    /// fresh connection. Any error closes the connection.
    pub async fn start(
        &mut self,
        conn: &mut ConnectionManager,
        session: &mut Session,
        request: &PendingRequest,
    ) -> Result<HttpResponse, NetError> {
        let route = Route::resolve(
            session.url(),
            self.ctx.proxy(),
            self.ctx.config.bypass_loopback,
        )?;

        let mut may_retry = true;
        loop {
            match self.attempt(conn, session, request, &route).await {
                Ok(response) => {
                    self.set_state(State::Done);
                    return Ok(response);
                }
                Err(failure) => {
                    conn.close().await;
                    self.set_state(State::Idle);
                    if failure.reused && may_retry && is_stale_connection(failure.error) {
                        tracing::debug!(error = %failure.error, "reused connection was stale, retrying");
                        may_retry = false;
                        continue;
                    }
                    return Err(failure.error);
                }
            }
        }
    }

    async fn attempt(
        &mut self,
        conn: &mut ConnectionManager,
        session: &mut Session,
        request: &PendingRequest,
        route: &Route,
    ) -> Result<HttpResponse, Failure> {
        let ctx = self.ctx;
        let config = &ctx.config;
        let fresh = |error| Failure {
            error,
            reused: false,
        };

        self.set_state(State::Connect);
        let params = OpenParams {
            connect_timeout: config.connect_timeout,
            io: IoSettings {
                read_timeout: config.read_timeout,
                write_timeout: config.write_timeout,
                cancel: self.cancel.clone(),
            },
            tunnel_auth: self.tunnel_auth(session, route).map_err(fresh)?,
        };
        let reused = conn
            .open(
                route,
                session.request_count,
                session.last_route.as_ref(),
                &params,
                self.load_state,
            )
            .await
            .map_err(fresh)?;
        session.last_route = Some(route.clone());
        let failed = |error| Failure { error, reused };

        let wire = build_request(session, route, config, request).map_err(fresh)?;

        self.set_state(State::SendRequest);
        conn.stream_mut()
            .map_err(failed)?
            .write_all(&wire)
            .await
            .map_err(failed)?;
        conn.mark_used();
        session.request_count += 1;

        self.set_state(State::ReadHeaders);
        let stream = conn.stream_mut().map_err(failed)?;
        let mut parser = ResponseParser::new(request.method.as_str(), config.compression);
        let head = parser.read_head(stream).await.map_err(failed)?;

        let upgraded = head.status == 101 && session.upgrade.is_some();
        if upgraded {
            // The connection now speaks the new protocol; the caller takes
            // it with `steal`.
            tracing::debug!(status = head.status, "protocol upgrade accepted");
            return Ok(HttpResponse::new(head, Vec::new()));
        }

        self.set_state(State::ReadBody);
        let framing = parser.framing(&head).map_err(fresh)?;
        let body = parser
            .read_body(stream, &head, framing)
            .await
            .map_err(fresh)?;

        let reusable =
            config.keep_alive && head.keeps_alive() && framing != BodyFraming::UntilClose;
        if !reusable {
            conn.close().await;
        }
        Ok(HttpResponse::new(head, body))
    }

    /// `Proxy-Authorization` for a CONNECT request.
    ///
    /// A tunnel cannot be re-challenged, so configured proxy credentials
    /// are sent up front.
    fn tunnel_auth(&self, session: &mut Session, route: &Route) -> Result<Option<String>, NetError> {
        if !route.is_tunnel() {
            return Ok(None);
        }
        let may_send = session.request_count > 0 || self.ctx.config.allow_preauth;
        if let Some(auth) = session.proxy_auth.as_mut().filter(|_| may_send) {
            let authority = format!("{}:{}", route.host, route.port);
            return auth.authorization("CONNECT", &authority, b"").map(Some);
        }
        Ok(self
            .ctx
            .proxy()
            .and_then(|p| p.credentials())
            .map(|(user, pass)| basic_credentials(&user, &pass)))
    }
}

fn is_stale_connection(error: NetError) -> bool {
    matches!(
        error,
        NetError::EmptyResponse
            | NetError::ConnectionClosed
            | NetError::ConnectionReset
            | NetError::ConnectionAborted
    )
}
