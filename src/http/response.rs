//! HTTP response with a fully decoded body.

use crate::base::neterror::NetError;
use crate::http::headercollection::HeaderCollection;
use crate::http::responseparser::ResponseHead;
use bytes::Bytes;
use http::Version;

/// The user-facing response. The body is complete: dechunked and, when
/// compression was negotiated, decompressed.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    version: Version,
    headers: HeaderCollection,
    body: Bytes,
}

impl HttpResponse {
    pub fn new(head: ResponseHead, body: Vec<u8>) -> Self {
        Self {
            status: head.status,
            version: head.version,
            headers: head.headers,
            body: Bytes::from(body),
        }
    }

    /// Get the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderCollection {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether the status is one the redirect loop follows.
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307)
    }

    /// `Location` header, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers.get("Location")
    }

    /// Consume the response, keeping the body.
    pub fn bytes(self) -> Bytes {
        self.body
    }

    /// Consume the response as UTF-8 text.
    pub fn text(self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|_| NetError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::responseparser::parse_head;

    fn response(raw: &[u8], body: &[u8]) -> HttpResponse {
        HttpResponse::new(parse_head(raw).unwrap(), body.to_vec())
    }

    #[test]
    fn test_accessors() {
        let resp = response(
            b"HTTP/1.1 302 Found\r\nLocation: /next\r\n\r\n",
            b"moved",
        );
        assert_eq!(resp.status(), 302);
        assert_eq!(resp.version(), Version::HTTP_11);
        assert!(resp.is_redirect());
        assert_eq!(resp.location(), Some("/next"));
        assert_eq!(resp.body(), b"moved");
        assert_eq!(resp.text().unwrap(), "moved");
    }

    #[test]
    fn test_invalid_utf8() {
        let resp = response(b"HTTP/1.1 200 OK\r\n\r\n", &[0xff, 0xfe]);
        assert_eq!(resp.clone().bytes().len(), 2);
        assert_eq!(resp.text().unwrap_err(), NetError::InvalidUtf8);
    }

    #[test]
    fn test_308_not_followed() {
        let resp = response(b"HTTP/1.1 308 Permanent Redirect\r\n\r\n", b"");
        assert!(!resp.is_redirect());
    }
}
