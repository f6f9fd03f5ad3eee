//! Authentication credentials and the caches that let later sessions reuse
//! them without prompting again.
//!
//! Based on Chromium's HttpAuthCache. Two caches exist per
//! [`CredentialStore`]: one for origin servers, one for proxies. A store is
//! cheap to clone and clones share the same entries, so handing the same
//! store to several clients shares credentials between them explicitly.

use crate::base::neterror::NetError;
use crate::http::authchallenge::{AuthChallenge, AuthScheme};
use crate::http::digestauth::DigestAuthHandler;
use dashmap::DashMap;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Credentials for one origin or proxy, scoped to a realm.
#[derive(Clone)]
pub struct AuthInfo {
    pub username: String,
    pub password: Zeroizing<String>,
    pub realm: String,
    /// Request target the credentials were last computed for.
    pub uri: String,
    /// Host the credentials belong to.
    pub domain: String,
    pub scheme: AuthScheme,
    digest: Option<DigestAuthHandler>,
}

impl std::fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInfo")
            .field("username", &self.username)
            .field("realm", &self.realm)
            .field("uri", &self.uri)
            .field("domain", &self.domain)
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

impl AuthInfo {
    /// Create a new basic auth entry.
    pub fn basic(
        domain: impl Into<String>,
        realm: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
            realm: realm.into(),
            uri: String::new(),
            domain: domain.into(),
            scheme: AuthScheme::Basic,
            digest: None,
        }
    }

    /// Bind credentials to a server challenge.
    ///
    /// NTLM and unknown schemes fail with `UnsupportedAuthScheme` before any
    /// network activity.
    pub fn from_challenge(
        challenge: &AuthChallenge,
        domain: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, NetError> {
        let digest = match challenge.scheme {
            AuthScheme::Basic => None,
            AuthScheme::Digest => Some(DigestAuthHandler::from_challenge(challenge)?),
            AuthScheme::Ntlm | AuthScheme::None => return Err(NetError::UnsupportedAuthScheme),
        };
        Ok(Self {
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
            realm: challenge.realm().to_string(),
            uri: String::new(),
            domain: domain.to_string(),
            scheme: challenge.scheme,
            digest,
        })
    }

    /// Whether these credentials are scoped to `domain` (and `realm`, if given).
    pub fn matches(&self, domain: &str, realm: Option<&str>) -> bool {
        self.domain.eq_ignore_ascii_case(domain) && realm.map_or(true, |r| r == self.realm)
    }

    /// Produce the `Authorization`/`Proxy-Authorization` value for a request.
    ///
    /// Digest consumes one nonce count per call; `body` only matters for
    /// `qop=auth-int`.
    pub fn authorization(
        &mut self,
        method: &str,
        uri: &str,
        body: &[u8],
    ) -> Result<String, NetError> {
        self.uri = uri.to_string();
        match self.scheme {
            AuthScheme::Basic => Ok(basic_credentials(&self.username, &self.password)),
            AuthScheme::Digest => {
                let digest = self.digest.as_mut().ok_or(NetError::MissingAuthCredentials)?;
                digest.generate_auth_token(method, uri, &self.username, &self.password, body)
            }
            AuthScheme::Ntlm | AuthScheme::None => Err(NetError::UnsupportedAuthScheme),
        }
    }

    pub fn nonce_count(&self) -> u32 {
        self.digest.as_ref().map_or(0, DigestAuthHandler::nonce_count)
    }
}

/// `Basic base64(user:pass)`.
pub fn basic_credentials(username: &str, password: &str) -> String {
    use base64::{engine::general_purpose, Engine as _};
    let creds = Zeroizing::new(format!("{}:{}", username, password));
    format!("Basic {}", general_purpose::STANDARD.encode(creds.as_bytes()))
}

/// Thread-safe authentication cache keyed by domain + realm.
#[derive(Clone, Default)]
pub struct AuthCache {
    entries: Arc<DashMap<String, AuthInfo>>,
}

impl AuthCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(domain: &str, realm: &str) -> String {
        format!("{}\u{0}{}", domain.to_ascii_lowercase(), realm)
    }

    /// Credentials stored for this domain and realm.
    pub fn find(&self, domain: &str, realm: &str) -> Option<AuthInfo> {
        self.entries
            .get(&Self::key(domain, realm))
            .map(|e| e.value().clone())
    }

    /// Any credentials stored for this domain, whatever the realm.
    pub fn find_for_domain(&self, domain: &str) -> Option<AuthInfo> {
        self.entries
            .iter()
            .find(|e| e.value().matches(domain, None))
            .map(|e| e.value().clone())
    }

    /// Store credentials under their own domain and realm. Last writer wins.
    pub fn store(&self, info: AuthInfo) {
        let key = Self::key(&info.domain, &info.realm);
        self.entries.insert(key, info);
    }

    pub fn remove(&self, domain: &str, realm: &str) {
        self.entries.remove(&Self::key(domain, realm));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The origin and proxy credential caches, shared explicitly between
/// clients that should reuse each other's credentials.
#[derive(Clone, Default)]
pub struct CredentialStore {
    origin: AuthCache,
    proxy: AuthCache,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(&self) -> &AuthCache {
        &self.origin
    }

    pub fn proxy(&self) -> &AuthCache {
        &self.proxy
    }

    /// Clear both caches.
    pub fn clear(&self) {
        self.origin.clear();
        self.proxy.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_find() {
        let cache = AuthCache::new();
        cache.store(AuthInfo::basic("example.com", "MyRealm", "user", "pass"));

        let found = cache.find("example.com", "MyRealm").unwrap();
        assert_eq!(found.username, "user");
        assert_eq!(found.password.as_str(), "pass");
        assert!(cache.find("example.com", "Other").is_none());
    }

    #[test]
    fn test_case_insensitive_domain() {
        let cache = AuthCache::new();
        cache.store(AuthInfo::basic("Example.COM", "R", "u", "p"));
        assert!(cache.find("example.com", "R").is_some());
        assert!(cache.find_for_domain("EXAMPLE.com").is_some());
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = AuthCache::new();
        cache.store(AuthInfo::basic("a.com", "R1", "u", "p"));
        cache.store(AuthInfo::basic("a.com", "R2", "u", "p"));
        cache.remove("a.com", "R1");
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_clones_share_entries() {
        let store = CredentialStore::new();
        let other = store.clone();
        store.origin().store(AuthInfo::basic("a.com", "R", "u", "p"));
        store.proxy().store(AuthInfo::basic("proxy", "P", "u", "p"));
        assert!(other.origin().find("a.com", "R").is_some());
        other.clear();
        assert!(store.origin().is_empty());
        assert!(store.proxy().is_empty());
    }

    #[test]
    fn test_basic_header_value() {
        let mut info = AuthInfo::basic("a.com", "Realm", "user", "pass");
        // base64("user:pass") = "dXNlcjpwYXNz"
        assert_eq!(info.authorization("GET", "/", b"").unwrap(), "Basic dXNlcjpwYXNz");
        assert_eq!(info.uri, "/");
    }

    #[test]
    fn test_ntlm_is_refused() {
        let challenge = AuthChallenge::parse("NTLM").unwrap();
        assert_eq!(
            AuthInfo::from_challenge(&challenge, "a.com", "u", "p").unwrap_err(),
            NetError::UnsupportedAuthScheme
        );
    }

    #[test]
    fn test_digest_from_challenge_counts_nonces() {
        let challenge =
            AuthChallenge::parse(r#"Digest realm="r", nonce="n", qop="auth""#).unwrap();
        let mut info = AuthInfo::from_challenge(&challenge, "a.com", "u", "p").unwrap();
        assert_eq!(info.realm, "r");
        let token = info.authorization("GET", "/x", b"").unwrap();
        assert!(token.starts_with("Digest "));
        assert_eq!(info.nonce_count(), 1);
    }

    #[test]
    fn test_debug_hides_password() {
        let info = AuthInfo::basic("a.com", "R", "u", "secret");
        assert!(!format!("{:?}", info).contains("secret"));
    }
}
