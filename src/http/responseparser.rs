//! Incremental HTTP/1.x response parsing.
//!
//! Turns the bytes of one response into a status code, a header collection
//! and a fully decoded body. Body framing is chosen in this order: no body
//! (HEAD, 1xx, 204, 304), chunked, a positive `Content-Length`, then
//! everything up to end of stream.

use crate::base::neterror::NetError;
use crate::http::chunked::read_chunked;
use crate::http::contentdecoder::{self, ContentEncoding};
use crate::http::headercollection::HeaderCollection;
use crate::socket::bufferedstream::{BufferedStream, MAX_HEADER_BYTES};
use http::Version;

/// Where the parser is in the current response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    #[default]
    ReadingHeaders,
    /// An interim `1xx` was read; the final response head is still to come.
    WaitingForBody,
    ReadingBody,
    Finished,
}

/// How the body of a response is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    None,
    Chunked,
    Length(u64),
    /// Read until the server closes; the connection cannot be reused.
    UntilClose,
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub version: Version,
    pub status: u16,
    pub headers: HeaderCollection,
}

impl ResponseHead {
    /// Whether the server allows the connection to be used again.
    pub fn keeps_alive(&self) -> bool {
        if self.headers.has_token("Connection", "close") {
            return false;
        }
        match self.version {
            Version::HTTP_10 => self.headers.has_token("Connection", "keep-alive"),
            _ => true,
        }
    }
}

/// A parsed response whose body is complete.
#[derive(Debug)]
pub struct ParsedResponse {
    pub head: ResponseHead,
    pub body: Vec<u8>,
    pub framing: BodyFraming,
}

/// Parse `HTTP/x.y CODE reason`.
///
/// The status is the run of digits right after the first space, at most
/// three of them.
pub fn parse_status_line(line: &[u8]) -> Result<(Version, u16), NetError> {
    if !line.starts_with(b"HTTP/") {
        return Err(NetError::InvalidHttpResponse);
    }
    let space = line
        .iter()
        .position(|&b| b == b' ')
        .ok_or(NetError::InvalidHttpResponse)?;
    let version = match &line[..space] {
        b"HTTP/1.0" => Version::HTTP_10,
        b"HTTP/0.9" => Version::HTTP_09,
        _ => Version::HTTP_11,
    };

    let digits: Vec<u8> = line[space + 1..]
        .iter()
        .take(3)
        .take_while(|b| b.is_ascii_digit())
        .copied()
        .collect();
    if digits.is_empty() {
        return Err(NetError::InvalidHttpResponse);
    }
    let status = digits
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    Ok((version, status))
}

/// Split a raw head into its status line and header block and parse both.
pub fn parse_head(raw: &[u8]) -> Result<ResponseHead, NetError> {
    // Non-UTF-8 header values (legacy Latin-1) are kept, lossily.
    let text = String::from_utf8_lossy(raw);
    let (status_line, block) = text.split_once("\r\n").unwrap_or((text.as_ref(), ""));
    let (version, status) = parse_status_line(status_line.as_bytes())?;
    let headers = HeaderCollection::parse_block(block)?;
    Ok(ResponseHead {
        version,
        status,
        headers,
    })
}

/// Reads one response from a stream.
#[derive(Debug)]
pub struct ResponseParser {
    state: ParserState,
    is_head: bool,
    decode: bool,
}

impl ResponseParser {
    /// `method` decides whether a body is expected; `decode` enables
    /// gzip/deflate decoding of the body.
    pub fn new(method: &str, decode: bool) -> Self {
        Self {
            state: ParserState::ReadingHeaders,
            is_head: method.eq_ignore_ascii_case("HEAD"),
            decode,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Read the head of the final response, skipping interim `1xx`
    /// responses other than `101`.
    pub async fn read_head(&mut self, stream: &mut BufferedStream) -> Result<ResponseHead, NetError> {
        loop {
            let raw = stream.read_head(MAX_HEADER_BYTES).await?;
            let head = parse_head(&raw)?;
            tracing::debug!(status = head.status, version = ?head.version, "response head parsed");
            if (100..200).contains(&head.status) && head.status != 101 {
                self.state = ParserState::WaitingForBody;
                continue;
            }
            self.state = ParserState::ReadingBody;
            return Ok(head);
        }
    }

    /// Pick the body framing for `head`.
    pub fn framing(&self, head: &ResponseHead) -> Result<BodyFraming, NetError> {
        if self.is_head || matches!(head.status, 100..=199 | 204 | 304) {
            return Ok(BodyFraming::None);
        }
        if head.headers.has_token("Transfer-Encoding", "chunked") {
            return Ok(BodyFraming::Chunked);
        }
        match head.headers.get("Content-Length") {
            Some(value) => match parse_content_length(value)? {
                0 => Ok(BodyFraming::None),
                n => Ok(BodyFraming::Length(n)),
            },
            None => Ok(BodyFraming::UntilClose),
        }
    }

    /// Read and decode the body described by `framing`.
    pub async fn read_body(
        &mut self,
        stream: &mut BufferedStream,
        head: &ResponseHead,
        framing: BodyFraming,
    ) -> Result<Vec<u8>, NetError> {
        self.state = ParserState::ReadingBody;
        let mut body = Vec::new();
        match framing {
            BodyFraming::None => {}
            BodyFraming::Chunked => read_chunked(stream, &mut body).await?,
            BodyFraming::Length(n) => {
                let n = usize::try_from(n).map_err(|_| NetError::OutOfMemory)?;
                stream
                    .read_exact_into(&mut body, n)
                    .await
                    .map_err(|e| match e {
                        NetError::ConnectionClosed => NetError::ContentLengthMismatch,
                        e => e,
                    })?;
            }
            BodyFraming::UntilClose => stream.read_to_end_into(&mut body).await?,
        }
        tracing::debug!(framing = ?framing, len = body.len(), "response body read");

        if self.decode && !body.is_empty() {
            match ContentEncoding::from_headers(&head.headers) {
                Some(ContentEncoding::Gzip | ContentEncoding::Deflate) => {
                    body = contentdecoder::decode(&body)?;
                    tracing::debug!(len = body.len(), "response body decoded");
                }
                Some(ContentEncoding::Identity) => {}
                None => tracing::debug!("unknown content encoding, body left as received"),
            }
        }

        self.state = ParserState::Finished;
        Ok(body)
    }

    /// Read a complete response.
    pub async fn read(&mut self, stream: &mut BufferedStream) -> Result<ParsedResponse, NetError> {
        let head = self.read_head(stream).await?;
        let framing = self.framing(&head)?;
        let body = self.read_body(stream, &head, framing).await?;
        Ok(ParsedResponse {
            head,
            body,
            framing,
        })
    }
}

/// Repeated identical values (`"5, 5"` after merging) are accepted;
/// conflicting or non-numeric ones are not.
fn parse_content_length(value: &str) -> Result<u64, NetError> {
    let mut length = None;
    for part in value.split(',') {
        let n = part
            .trim()
            .parse::<u64>()
            .map_err(|_| NetError::InvalidResponse)?;
        match length {
            Some(prev) if prev != n => return Err(NetError::InvalidResponse),
            _ => length = Some(n),
        }
    }
    length.ok_or(NetError::InvalidResponse)
}
