//! `WWW-Authenticate` / `Proxy-Authenticate` challenge parsing.
//!
//! A challenge is a scheme token followed by a parameter list. Parameters
//! are separated by `,` or `;` (outside quotes) and quoted values have their
//! quotes stripped.

use crate::base::neterror::NetError;
use crate::http::headercollection::HeaderCollection;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Authentication scheme named by a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthScheme {
    /// No scheme, or one this engine does not recognize.
    #[default]
    None,
    /// Basic authentication (base64 encoded)
    Basic,
    /// Digest authentication (challenge-response)
    Digest,
    /// NTLM (recognized, handshake not implemented)
    Ntlm,
}

impl AuthScheme {
    pub fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("basic") {
            AuthScheme::Basic
        } else if token.eq_ignore_ascii_case("digest") {
            AuthScheme::Digest
        } else if token.eq_ignore_ascii_case("ntlm") {
            AuthScheme::Ntlm
        } else {
            AuthScheme::None
        }
    }

    /// Preference when a response offers several challenges.
    fn rank(self) -> u8 {
        match self {
            AuthScheme::Digest => 3,
            AuthScheme::Basic => 2,
            AuthScheme::Ntlm => 1,
            AuthScheme::None => 0,
        }
    }
}

/// Which side of the connection issued the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTarget {
    /// 401 with `WWW-Authenticate`, answered with `Authorization`.
    Origin,
    /// 407 with `Proxy-Authenticate`, answered with `Proxy-Authorization`.
    Proxy,
}

impl AuthTarget {
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(AuthTarget::Origin),
            407 => Some(AuthTarget::Proxy),
            _ => None,
        }
    }

    pub fn challenge_header(self) -> &'static str {
        match self {
            AuthTarget::Origin => "WWW-Authenticate",
            AuthTarget::Proxy => "Proxy-Authenticate",
        }
    }

    pub fn credentials_header(self) -> &'static str {
        match self {
            AuthTarget::Origin => "Authorization",
            AuthTarget::Proxy => "Proxy-Authorization",
        }
    }
}

/// A parsed challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub scheme: AuthScheme,
    /// The scheme token exactly as sent.
    pub scheme_token: String,
    params: Vec<(String, String)>,
}

impl AuthChallenge {
    /// Parse a single challenge header value.
    pub fn parse(value: &str) -> Result<Self, NetError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(NetError::InvalidResponse);
        }
        let (token, rest) = match value.find(char::is_whitespace) {
            Some(pos) => (&value[..pos], value[pos..].trim_start()),
            None => (value, ""),
        };

        let mut params = Vec::new();
        for part in split_params(rest) {
            // Bare tokens (e.g. an NTLM blob) carry no name=value shape.
            if let Some((name, raw)) = part.split_once('=') {
                params.push((name.trim().to_string(), unquote(raw.trim()).into_owned()));
            }
        }

        Ok(Self {
            scheme: AuthScheme::from_token(token),
            scheme_token: token.to_string(),
            params,
        })
    }

    /// Pick the strongest supported challenge among the response's headers.
    pub fn select(headers: &HeaderCollection, target: AuthTarget) -> Option<Self> {
        headers
            .get_all(target.challenge_header())
            .into_iter()
            .filter_map(|v| Self::parse(v).ok())
            .filter(|c| c.scheme != AuthScheme::None)
            .max_by_key(|c| c.scheme.rank())
    }

    /// Parameter lookup, name compared case-insensitively.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn realm(&self) -> &str {
        self.param("realm").unwrap_or("")
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Split on `,` or `;` outside of double quotes.
fn split_params(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' | ';' if !in_quotes => {
                let part = input[start..i].trim();
                if !part.is_empty() {
                    parts.push(part);
                }
                start = i + 1;
            }
            _ => {}
        }
    }

    let part = input[start..].trim();
    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

/// Strip surrounding quotes and resolve `\x` escapes inside them.
fn unquote(value: &str) -> Cow<'_, str> {
    if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
        return Cow::Borrowed(value);
    }
    let inner = &value[1..value.len() - 1];
    if !inner.contains('\\') {
        return Cow::Borrowed(inner);
    }
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Render `value` as an RFC 7230 quoted-string.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
