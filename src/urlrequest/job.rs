//! The redirect and authentication loop around single transactions.
//!
//! One logical request runs here until it produces a response that is not
//! answered automatically: a challenge with no usable credentials, a
//! redirect beyond the limit, or any other status.

use crate::base::loadstate::LoadStateTracker;
use crate::base::neterror::NetError;
use crate::http::auth::{resolve_credentials, AuthLoopGuard, CredentialSources};
use crate::http::authchallenge::{AuthChallenge, AuthScheme, AuthTarget};
use crate::http::requestbuilder::PendingRequest;
use crate::http::response::HttpResponse;
use crate::http::transaction::HttpTransaction;
use crate::socket::connection::ConnectionManager;
use crate::urlrequest::context::RequestContext;
use crate::urlrequest::session::Session;
use tokio_util::sync::CancellationToken;

/// Next step after a response.
enum Next {
    Resend,
    Done,
}

pub struct HttpJob<'a> {
    ctx: &'a RequestContext,
    cancel: &'a CancellationToken,
    load_state: &'a LoadStateTracker,
    guard: AuthLoopGuard,
    ntlm_negotiating: bool,
}

impl<'a> HttpJob<'a> {
    pub fn new(
        ctx: &'a RequestContext,
        cancel: &'a CancellationToken,
        load_state: &'a LoadStateTracker,
    ) -> Self {
        Self {
            ctx,
            cancel,
            load_state,
            guard: AuthLoopGuard::new(),
            ntlm_negotiating: false,
        }
    }

    /// Drive `request` to a final response.
    pub async fn run(
        &mut self,
        conn: &mut ConnectionManager,
        session: &mut Session,
        request: &PendingRequest,
    ) -> Result<HttpResponse, NetError> {
        session.clear();
        let result = self.run_loop(conn, session, request).await;
        if self.ctx.config.reset_credentials {
            self.ctx.credentials.clear();
        }
        result
    }

    async fn run_loop(
        &mut self,
        conn: &mut ConnectionManager,
        session: &mut Session,
        request: &PendingRequest,
    ) -> Result<HttpResponse, NetError> {
        loop {
            if self.cancel.is_cancelled() {
                conn.close().await;
                return Err(NetError::ReadTimeout);
            }

            let response = HttpTransaction::new(self.ctx, self.cancel, self.load_state)
                .start(conn, session, request)
                .await?;

            let next = match AuthTarget::from_status(response.status()) {
                Some(target) if self.ctx.config.authentication => {
                    self.on_challenge(session, target, &response)
                }
                _ => self.on_response(session, &response)?,
            };
            if let Next::Done = next {
                return Ok(response);
            }
        }
    }

    fn on_response(
        &mut self,
        session: &mut Session,
        response: &HttpResponse,
    ) -> Result<Next, NetError> {
        let ctx = self.ctx;
        let config = &ctx.config;
        if !response.is_redirect() || !config.follow_redirects {
            return Ok(Next::Done);
        }
        if session.redirect_count >= config.max_redirects {
            tracing::debug!(limit = config.max_redirects, "redirect limit reached");
            return Ok(Next::Done);
        }
        let Some(location) = response.location() else {
            return Ok(Next::Done);
        };
        session.redirect_to(location)?;
        session.redirect_count += 1;
        self.guard.reset();
        self.ntlm_negotiating = false;
        Ok(Next::Resend)
    }

    fn on_challenge(
        &mut self,
        session: &mut Session,
        target: AuthTarget,
        response: &HttpResponse,
    ) -> Next {
        let ctx = self.ctx;
        let Some(challenge) = AuthChallenge::select(response.headers(), target) else {
            tracing::debug!(status = response.status(), "no usable challenge");
            return Next::Done;
        };

        let (domain, cache, known) = match target {
            AuthTarget::Origin => (
                session.domain().to_string(),
                ctx.credentials.origin(),
                session.known_credentials(),
            ),
            AuthTarget::Proxy => (
                session
                    .last_route
                    .as_ref()
                    .and_then(|r| r.proxy.as_ref())
                    .map_or_else(|| session.domain().to_string(), |(h, _)| h.clone()),
                ctx.credentials.proxy(),
                ctx.proxy().and_then(|p| p.credentials()),
            ),
        };

        if self.guard.check(response.status(), &challenge).is_err() {
            tracing::warn!(
                status = response.status(),
                domain = %domain,
                realm = %challenge.realm(),
                "credentials rejected again, giving up"
            );
            cache.remove(&domain, challenge.realm());
            match target {
                AuthTarget::Origin => session.origin_auth = None,
                AuthTarget::Proxy => session.proxy_auth = None,
            }
            return Next::Done;
        }

        if challenge.scheme == AuthScheme::Ntlm {
            if !self.ntlm_negotiating {
                self.ntlm_negotiating = true;
                return Next::Resend;
            }
            self.ntlm_negotiating = false;
            tracing::debug!(domain = %domain, "NTLM handshake not supported");
            return Next::Done;
        }

        let sources = CredentialSources {
            cache,
            prompt: ctx.prompt(),
            known,
            is_proxy: target == AuthTarget::Proxy,
        };
        match resolve_credentials(&challenge, &domain, &sources) {
            Ok(info) => {
                tracing::debug!(domain = %domain, realm = %info.realm, scheme = ?info.scheme, "answering challenge");
                cache.store(info.clone());
                match target {
                    AuthTarget::Origin => session.origin_auth = Some(info),
                    AuthTarget::Proxy => session.proxy_auth = Some(info),
                }
                Next::Resend
            }
            Err(e) => {
                tracing::debug!(domain = %domain, error = %e, "no credentials for challenge");
                Next::Done
            }
        }
    }
}
