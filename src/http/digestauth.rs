//! HTTP Digest Authentication (RFC 2617 / RFC 7616).
//!
//! Mirrors Chromium's `net/http/http_auth_handler_digest.cc`.
//!
//! ## Supported Features
//! - MD5 and SHA-256 algorithms
//! - Session-based algorithms (MD5-sess, SHA-256-sess)
//! - qop=auth and qop=auth-int (body hash folded into HA2)
//! - Nonce count tracking per credential set

use crate::base::neterror::NetError;
use crate::http::authchallenge::{quote, AuthChallenge, AuthScheme};
use boring::hash::{hash, MessageDigest};
use rand::RngCore;
use std::fmt::Write;

/// Digest authentication algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// Unspecified - defaults to MD5
    #[default]
    Unspecified,
    /// MD5
    Md5,
    /// MD5-sess (session-based)
    Md5Sess,
    /// SHA-256
    Sha256,
    /// SHA-256-sess (session-based)
    Sha256Sess,
}

impl DigestAlgorithm {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "md5-sess" => Some(Self::Md5Sess),
            "sha-256" => Some(Self::Sha256),
            "sha-256-sess" => Some(Self::Sha256Sess),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
            Self::Sha256 => "SHA-256",
            Self::Sha256Sess => "SHA-256-sess",
        }
    }

    fn is_session(&self) -> bool {
        matches!(self, Self::Md5Sess | Self::Sha256Sess)
    }

    fn message_digest(&self) -> MessageDigest {
        match self {
            Self::Sha256 | Self::Sha256Sess => MessageDigest::sha256(),
            _ => MessageDigest::md5(),
        }
    }
}

/// Quality of Protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Qop {
    #[default]
    Unspecified,
    /// Authentication only
    Auth,
    /// Authentication with integrity (covers the request body)
    AuthInt,
}

impl Qop {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::Auth => "auth",
            Self::AuthInt => "auth-int",
        }
    }

    /// `auth` wins when the server offers both.
    fn choose(offered: &str) -> Self {
        let mut chosen = Qop::Unspecified;
        for token in offered.split(',').map(str::trim) {
            if token.eq_ignore_ascii_case("auth") {
                return Qop::Auth;
            }
            if token.eq_ignore_ascii_case("auth-int") {
                chosen = Qop::AuthInt;
            }
        }
        chosen
    }
}

/// Digest state for one credential set: the server's challenge plus the
/// running nonce count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestAuthHandler {
    realm: String,
    nonce: String,
    opaque: Option<String>,
    algorithm: DigestAlgorithm,
    qop: Qop,
    stale: bool,
    nonce_count: u32,
}

impl DigestAuthHandler {
    /// Build a handler from a parsed `Digest` challenge.
    pub fn from_challenge(challenge: &AuthChallenge) -> Result<Self, NetError> {
        if challenge.scheme != AuthScheme::Digest {
            return Err(NetError::UnsupportedAuthScheme);
        }

        let nonce = challenge.param("nonce").unwrap_or_default();
        if nonce.is_empty() {
            return Err(NetError::InvalidResponse);
        }

        let algorithm = match challenge.param("algorithm") {
            Some(a) => DigestAlgorithm::from_str(a).ok_or(NetError::UnsupportedAuthScheme)?,
            None => DigestAlgorithm::Unspecified,
        };

        Ok(Self {
            realm: challenge.realm().to_string(),
            nonce: nonce.to_string(),
            opaque: challenge.param("opaque").map(str::to_string),
            algorithm,
            qop: challenge.param("qop").map(Qop::choose).unwrap_or_default(),
            stale: challenge
                .param("stale")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            nonce_count: 0,
        })
    }

    /// Generate the Authorization header value (including the `Digest `
    /// prefix). Each call consumes one nonce count.
    pub fn generate_auth_token(
        &mut self,
        method: &str,
        uri: &str,
        username: &str,
        password: &str,
        body: &[u8],
    ) -> Result<String, NetError> {
        self.nonce_count += 1;
        let nc = format!("{:08x}", self.nonce_count);
        let cnonce = generate_cnonce()?;
        let response = self.compute_response(method, uri, username, password, body, &cnonce, &nc)?;
        Ok(self.assemble_credentials(username, uri, &response, &cnonce, &nc))
    }

    #[allow(clippy::too_many_arguments)]
    fn compute_response(
        &self,
        method: &str,
        uri: &str,
        username: &str,
        password: &str,
        body: &[u8],
        cnonce: &str,
        nc: &str,
    ) -> Result<String, NetError> {
        let mut ha1 = self.hex_hash(format!("{}:{}:{}", username, self.realm, password).as_bytes())?;
        if self.algorithm.is_session() {
            ha1 = self.hex_hash(format!("{}:{}:{}", ha1, self.nonce, cnonce).as_bytes())?;
        }

        let ha2 = if self.qop == Qop::AuthInt {
            let body_hash = self.hex_hash(body)?;
            self.hex_hash(format!("{}:{}:{}", method, uri, body_hash).as_bytes())?
        } else {
            self.hex_hash(format!("{}:{}", method, uri).as_bytes())?
        };

        let input = if self.qop != Qop::Unspecified {
            format!(
                "{}:{}:{}:{}:{}:{}",
                ha1,
                self.nonce,
                nc,
                cnonce,
                self.qop.as_str(),
                ha2
            )
        } else {
            format!("{}:{}:{}", ha1, self.nonce, ha2)
        };
        self.hex_hash(input.as_bytes())
    }

    fn hex_hash(&self, input: &[u8]) -> Result<String, NetError> {
        hex_digest(self.algorithm.message_digest(), input)
    }

    fn assemble_credentials(
        &self,
        username: &str,
        uri: &str,
        response: &str,
        cnonce: &str,
        nc: &str,
    ) -> String {
        let mut auth = format!(
            "Digest username={}, realm={}, nonce={}, uri={}",
            quote(username),
            quote(&self.realm),
            quote(&self.nonce),
            quote(uri)
        );
        if self.algorithm != DigestAlgorithm::Unspecified {
            let _ = write!(auth, ", algorithm={}", self.algorithm.as_str());
        }
        let _ = write!(auth, ", response=\"{}\"", response);
        if let Some(ref opaque) = self.opaque {
            let _ = write!(auth, ", opaque={}", quote(opaque));
        }
        if self.qop != Qop::Unspecified {
            let _ = write!(
                auth,
                ", qop={}, nc={}, cnonce=\"{}\"",
                self.qop.as_str(),
                nc,
                cnonce
            );
        }
        auth
    }

    /// The server flagged the nonce as expired; credentials are still good.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn nonce_count(&self) -> u32 {
        self.nonce_count
    }
}

/// Hex-encoded `H(user:realm:password)`.
pub fn compute_ha1(username: &str, realm: &str, password: &str) -> Result<String, NetError> {
    hex_digest(
        MessageDigest::md5(),
        format!("{}:{}:{}", username, realm, password).as_bytes(),
    )
}

fn hex_digest(md: MessageDigest, input: &[u8]) -> Result<String, NetError> {
    let digest = hash(md, input).map_err(|_| NetError::InvalidAuthCredentials)?;
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(hex, "{:02x}", byte);
    }
    Ok(hex)
}

/// Client nonce: unique per exchange, not a secret. Random bytes and the
/// current time, MD5-hashed and hex-encoded.
fn generate_cnonce() -> Result<String, NetError> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let mut seed = [0u8; 32];
    rand::rng().fill_bytes(&mut seed[..16]);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    seed[16..].copy_from_slice(&nanos.to_le_bytes());
    hex_digest(MessageDigest::md5(), &seed)
}
