//! Wire-format request assembly.
//!
//! Engine headers come first in a fixed order, then the caller's headers.
//! A caller header replaces an engine default of the same name, except
//! `Host`, `Connection` and `Content-Length`, which always describe the
//! actual exchange.

use crate::base::neterror::NetError;
use crate::http::contentdecoder::ACCEPT_ENCODING;
use crate::http::headercollection::HeaderCollection;
use crate::http::requestbody::RequestBody;
use crate::socket::connection::Route;
use crate::urlrequest::context::ClientConfig;
use crate::urlrequest::session::Session;
use http::Method;
use std::sync::OnceLock;

const ENGINE_ONLY: [&str; 3] = ["Host", "Connection", "Content-Length"];

/// One logical request. Kept whole so every resend writes the same body.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub headers: HeaderCollection,
    pub body: RequestBody,
}

impl PendingRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderCollection::new(),
            body: RequestBody::Empty,
        }
    }
}

/// `User-Agent` sent when none is configured. Built once per process.
pub fn default_user_agent() -> &'static str {
    static USER_AGENT: OnceLock<String> = OnceLock::new();
    USER_AGENT.get_or_init(|| {
        format!(
            "wirenet/{} ({}; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    })
}

/// RFC 822 date in GMT, as `Date` headers want it.
pub fn http_date(now: time::OffsetDateTime) -> Option<String> {
    let formatted = now
        .to_offset(time::UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc2822)
        .ok()?;
    Some(formatted.replace("+0000", "GMT"))
}

/// Request line, headers and body for one send.
///
/// Takes the session mutably because Digest credentials consume a nonce
/// count each time they are written.
pub fn build_request(
    session: &mut Session,
    route: &Route,
    config: &ClientConfig,
    request: &PendingRequest,
) -> Result<Vec<u8>, NetError> {
    let method = request.method.as_str();
    let target = if route.uses_absolute_form() {
        session.absolute_uri()
    } else {
        session.request_target()
    };

    let mut headers = HeaderCollection::new();
    headers.set("Host", &session.host_header(), true)?;
    headers.set(
        "User-Agent",
        config.user_agent.as_deref().unwrap_or(default_user_agent()),
        true,
    )?;
    if config.send_date {
        if let Some(date) = http_date(time::OffsetDateTime::now_utc()) {
            headers.set("Date", &date, true)?;
        }
    }

    let connection = if session.upgrade.is_some() {
        "Upgrade"
    } else if config.keep_alive {
        "keep-alive"
    } else {
        "close"
    };
    headers.set("Connection", connection, true)?;
    if let Some(protocol) = &session.upgrade {
        headers.set("Upgrade", protocol, true)?;
    }

    if config.compression {
        headers.set("Accept-Encoding", ACCEPT_ENCODING, true)?;
    }

    let sends_length = request.method == Method::POST
        || request.method == Method::PUT
        || !request.body.is_empty();
    if sends_length {
        if let Some(content_type) = &config.content_type {
            headers.set("Content-Type", content_type, true)?;
        }
        headers.set("Content-Length", &request.body.len().to_string(), true)?;
    }

    // Credentials are only volunteered once the server has had a chance to
    // challenge, unless preauthentication is allowed.
    if session.request_count > 0 || config.allow_preauth {
        let body = request.body.as_bytes();
        let domain = session.domain().to_string();
        if let Some(auth) = session.origin_auth.as_mut().filter(|a| a.matches(&domain, None)) {
            let value = auth.authorization(method, &target, body)?;
            headers.set("Authorization", &value, true)?;
        }
        if route.uses_absolute_form() {
            if let Some(auth) = session.proxy_auth.as_mut() {
                let value = auth.authorization(method, &target, body)?;
                headers.set("Proxy-Authorization", &value, true)?;
            }
        }
    }

    for (name, value) in request.headers.iter() {
        if ENGINE_ONLY.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            continue;
        }
        headers.set(name, value, true)?;
    }

    let mut head = format!("{} {} HTTP/1.1\r\n", method, target);
    headers.write_to(&mut head);
    head.push_str("\r\n");
    tracing::debug!(method = %method, target = %target, "request built");

    let body = request.body.as_bytes();
    let mut wire = Vec::new();
    wire.try_reserve_exact(head.len() + body.len())
        .map_err(|_| NetError::OutOfMemory)?;
    wire.extend_from_slice(head.as_bytes());
    wire.extend_from_slice(body);
    Ok(wire)
}
