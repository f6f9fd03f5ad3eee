//! Credential resolution for 401/407 challenges and the guard that stops
//! the auth loop when a server keeps rejecting.

use crate::base::neterror::NetError;
use crate::http::authchallenge::{AuthChallenge, AuthScheme};
use crate::socket::authcache::{AuthCache, AuthInfo};

/// What an interactive prompt is told about the challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPrompt {
    pub domain: String,
    pub realm: String,
    pub scheme: AuthScheme,
    pub is_proxy: bool,
}

/// Asks a user for credentials.
///
/// Any `Fn(&AuthPrompt) -> Option<(String, String)>` qualifies.
pub trait CredentialPrompt: Send + Sync {
    /// Username and password, or `None` to give up.
    fn prompt(&self, request: &AuthPrompt) -> Option<(String, String)>;
}

impl<F> CredentialPrompt for F
where
    F: Fn(&AuthPrompt) -> Option<(String, String)> + Send + Sync,
{
    fn prompt(&self, request: &AuthPrompt) -> Option<(String, String)> {
        self(request)
    }
}

/// Stops the auth loop when a server answers the same status again without
/// progress. Only a Digest challenge flagged `stale=true` counts as progress:
/// the credentials were accepted and just the nonce expired. A fresh nonce
/// alone does not.
#[derive(Debug, Default)]
pub struct AuthLoopGuard {
    last: Option<(u16, AuthScheme, String)>,
    stale_retries: u32,
}

/// Consecutive `stale=true` challenges answered before giving up.
const MAX_STALE_RETRIES: u32 = 2;

impl AuthLoopGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a challenge. Fails with `AuthenticationExhausted` when the
    /// previous response carried the same status for the same scheme and
    /// realm and the server did not mark the nonce stale.
    pub fn check(&mut self, status: u16, challenge: &AuthChallenge) -> Result<(), NetError> {
        let current = (status, challenge.scheme, challenge.realm().to_string());
        if self.last.as_ref() == Some(&current) {
            if !is_stale(challenge) || self.stale_retries >= MAX_STALE_RETRIES {
                return Err(NetError::AuthenticationExhausted);
            }
            self.stale_retries += 1;
        } else {
            self.stale_retries = 0;
        }
        self.last = Some(current);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.stale_retries = 0;
    }
}

fn is_stale(challenge: &AuthChallenge) -> bool {
    challenge.scheme == AuthScheme::Digest
        && challenge
            .param("stale")
            .map_or(false, |v| v.eq_ignore_ascii_case("true"))
}

/// Where credentials may come from, in priority order: the cache, the
/// interactive prompt, then credentials already known to the caller.
pub struct CredentialSources<'a> {
    pub cache: &'a AuthCache,
    pub prompt: Option<&'a dyn CredentialPrompt>,
    pub known: Option<(String, String)>,
    pub is_proxy: bool,
}

/// Bind credentials for `domain` to `challenge`.
///
/// NTLM and unrecognized schemes fail with `UnsupportedAuthScheme` without
/// consulting any source. `MissingAuthCredentials` means every source came
/// up empty.
pub fn resolve_credentials(
    challenge: &AuthChallenge,
    domain: &str,
    sources: &CredentialSources<'_>,
) -> Result<AuthInfo, NetError> {
    if !matches!(challenge.scheme, AuthScheme::Basic | AuthScheme::Digest) {
        return Err(NetError::UnsupportedAuthScheme);
    }
    let realm = challenge.realm();

    if let Some(cached) = sources.cache.find(domain, realm) {
        tracing::debug!(domain = %domain, realm = %realm, "using cached credentials");
        return AuthInfo::from_challenge(challenge, domain, &cached.username, &cached.password);
    }

    if let Some(prompt) = sources.prompt {
        let request = AuthPrompt {
            domain: domain.to_string(),
            realm: realm.to_string(),
            scheme: challenge.scheme,
            is_proxy: sources.is_proxy,
        };
        if let Some((user, pass)) = prompt.prompt(&request) {
            tracing::debug!(domain = %domain, realm = %realm, "credentials from prompt");
            return AuthInfo::from_challenge(challenge, domain, &user, &pass);
        }
    }

    if let Some((user, pass)) = &sources.known {
        tracing::debug!(domain = %domain, realm = %realm, "using known credentials");
        return AuthInfo::from_challenge(challenge, domain, user, pass);
    }

    Err(NetError::MissingAuthCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn basic() -> AuthChallenge {
        AuthChallenge::parse(r#"Basic realm="files""#).unwrap()
    }

    fn sources<'a>(
        cache: &'a AuthCache,
        prompt: Option<&'a dyn CredentialPrompt>,
        known: Option<(&str, &str)>,
    ) -> CredentialSources<'a> {
        CredentialSources {
            cache,
            prompt,
            known: known.map(|(u, p)| (u.to_string(), p.to_string())),
            is_proxy: false,
        }
    }

    fn challenge(value: &str) -> AuthChallenge {
        AuthChallenge::parse(value).unwrap()
    }

    #[test]
    fn test_guard_stops_on_repeat() {
        let mut guard = AuthLoopGuard::new();
        assert!(guard.check(401, &basic()).is_ok());
        assert_eq!(guard.check(401, &basic()), Err(NetError::AuthenticationExhausted));
    }

    #[test]
    fn test_guard_fresh_nonce_is_not_progress() {
        let mut guard = AuthLoopGuard::new();
        guard.check(401, &challenge(r#"Digest realm="r", nonce="1""#)).unwrap();
        assert_eq!(
            guard.check(401, &challenge(r#"Digest realm="r", nonce="2""#)),
            Err(NetError::AuthenticationExhausted)
        );
    }

    #[test]
    fn test_guard_stale_nonce_is_bounded() {
        let mut guard = AuthLoopGuard::new();
        let stale = challenge(r#"Digest realm="r", nonce="n", stale=TRUE"#);
        guard.check(401, &stale).unwrap();
        guard.check(401, &stale).unwrap();
        guard.check(401, &stale).unwrap();
        assert_eq!(guard.check(401, &stale), Err(NetError::AuthenticationExhausted));
    }

    #[test]
    fn test_guard_status_or_realm_change() {
        let mut guard = AuthLoopGuard::new();
        guard.check(401, &challenge(r#"Digest realm="a", nonce="1""#)).unwrap();
        guard.check(401, &challenge(r#"Digest realm="b", nonce="1""#)).unwrap();
        guard.check(407, &challenge(r#"Digest realm="b", nonce="1""#)).unwrap();
        guard.reset();
        guard.check(407, &challenge(r#"Digest realm="b", nonce="1""#)).unwrap();
    }

    #[test]
    fn test_cache_beats_prompt_and_known() {
        let cache = AuthCache::new();
        cache.store(AuthInfo::basic("host", "files", "cached", "pw"));
        let calls = AtomicUsize::new(0);
        let prompt = |_: &AuthPrompt| {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(("prompted".to_string(), "pw".to_string()))
        };
        let info = resolve_credentials(
            &basic(),
            "host",
            &sources(&cache, Some(&prompt), Some(("known", "pw"))),
        )
        .unwrap();
        assert_eq!(info.username, "cached");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_prompt_beats_known() {
        let cache = AuthCache::new();
        let prompt = |req: &AuthPrompt| {
            assert_eq!(req.realm, "files");
            assert!(!req.is_proxy);
            Some(("prompted".to_string(), "pw".to_string()))
        };
        let info = resolve_credentials(
            &basic(),
            "host",
            &sources(&cache, Some(&prompt), Some(("known", "pw"))),
        )
        .unwrap();
        assert_eq!(info.username, "prompted");
    }

    #[test]
    fn test_declined_prompt_falls_back_to_known() {
        let cache = AuthCache::new();
        let prompt = |_: &AuthPrompt| -> Option<(String, String)> { None };
        let info = resolve_credentials(
            &basic(),
            "host",
            &sources(&cache, Some(&prompt), Some(("known", "pw"))),
        )
        .unwrap();
        assert_eq!(info.username, "known");
    }

    #[test]
    fn test_no_source() {
        let cache = AuthCache::new();
        assert_eq!(
            resolve_credentials(&basic(), "host", &sources(&cache, None, None)).unwrap_err(),
            NetError::MissingAuthCredentials
        );
    }

    #[test]
    fn test_ntlm_unsupported() {
        let cache = AuthCache::new();
        let ntlm = AuthChallenge::parse("NTLM").unwrap();
        assert_eq!(
            resolve_credentials(&ntlm, "host", &sources(&cache, None, Some(("u", "p"))))
                .unwrap_err(),
            NetError::UnsupportedAuthScheme
        );
    }
}
