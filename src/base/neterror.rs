use std::io;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NetError {
    // Generic
    #[error("Operation aborted")]
    Aborted,
    #[error("Out of memory")]
    OutOfMemory,

    // Timeouts
    #[error("Read timed out")]
    ReadTimeout,
    #[error("Write timed out")]
    WriteTimeout,

    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Tunnel connection failed")]
    TunnelConnectionFailed,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Proxy connection failed")]
    ProxyConnectionFailed,

    // Request Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid redirect")]
    InvalidRedirect,
    #[error("Invalid header")]
    InvalidHeader,

    // Protocol Errors
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Invalid chunked encoding")]
    InvalidChunkedEncoding,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Response headers too big")]
    ResponseHeadersTooBig,
    #[error("Content length mismatch")]
    ContentLengthMismatch,
    #[error("Incomplete chunked encoding")]
    IncompleteChunkedEncoding,
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,

    // Decompression Errors
    #[error("Content decoding failed")]
    DecompressionFailed,
    #[error("Unsupported compression format version")]
    DecompressionBadVersion,
    #[error("Content is not compressed")]
    DecompressionNonCompressedInput,

    // Auth Errors
    #[error("Invalid auth credentials")]
    InvalidAuthCredentials,
    #[error("Unsupported auth scheme")]
    UnsupportedAuthScheme,
    #[error("Missing auth credentials")]
    MissingAuthCredentials,
    #[error("Authentication challenge repeated without progress")]
    AuthenticationExhausted,

    // Body Errors
    #[error("Invalid UTF-8 in response body")]
    InvalidUtf8,

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Aborted => -3,
            NetError::OutOfMemory => -13,
            NetError::ReadTimeout => -7,
            NetError::WriteTimeout => -10004,
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::NameNotResolved => -105,
            NetError::SslProtocolError => -107,
            NetError::TunnelConnectionFailed => -111,
            NetError::ConnectionTimedOut => -118,
            NetError::ProxyConnectionFailed => -130,
            NetError::InvalidUrl => -300,
            NetError::UnknownUrlScheme => -302,
            NetError::InvalidRedirect => -303,
            NetError::InvalidResponse => -320,
            NetError::InvalidChunkedEncoding => -321,
            NetError::EmptyResponse => -324,
            NetError::ResponseHeadersTooBig => -325,
            NetError::DecompressionFailed => -330,
            NetError::InvalidAuthCredentials => -338,
            NetError::UnsupportedAuthScheme => -339,
            NetError::MissingAuthCredentials => -341,
            NetError::ContentLengthMismatch => -354,
            NetError::IncompleteChunkedEncoding => -355,
            NetError::InvalidHttpResponse => -370,
            NetError::DecompressionBadVersion => -371,
            // Codes below are local to wirenet and sit outside Chromium's ranges.
            NetError::AuthenticationExhausted => -10000,
            NetError::DecompressionNonCompressedInput => -10001,
            NetError::InvalidHeader => -10002,
            NetError::InvalidUtf8 => -10003,
            NetError::Unknown(code) => *code,
        }
    }

    /// Resolve, connect, tunnel and TLS failures. Fatal to the current attempt.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            NetError::ConnectionClosed
                | NetError::ConnectionReset
                | NetError::ConnectionRefused
                | NetError::ConnectionAborted
                | NetError::ConnectionFailed
                | NetError::NameNotResolved
                | NetError::SslProtocolError
                | NetError::TunnelConnectionFailed
                | NetError::ConnectionTimedOut
                | NetError::ProxyConnectionFailed
        )
    }

    /// Malformed framing on the wire. Aborts parsing of the response.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            NetError::InvalidResponse
                | NetError::InvalidChunkedEncoding
                | NetError::EmptyResponse
                | NetError::ResponseHeadersTooBig
                | NetError::ContentLengthMismatch
                | NetError::IncompleteChunkedEncoding
                | NetError::InvalidHttpResponse
        )
    }

    pub fn is_decompression_error(&self) -> bool {
        matches!(
            self,
            NetError::DecompressionFailed
                | NetError::DecompressionBadVersion
                | NetError::DecompressionNonCompressedInput
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::ReadTimeout | NetError::WriteTimeout)
    }

    /// Map an I/O error kind onto the closest network error.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => NetError::ConnectionClosed,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            io::ErrorKind::OutOfMemory => NetError::OutOfMemory,
            _ => NetError::ConnectionFailed,
        }
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -3 => NetError::Aborted,
            -13 => NetError::OutOfMemory,
            -7 => NetError::ReadTimeout,
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -107 => NetError::SslProtocolError,
            -111 => NetError::TunnelConnectionFailed,
            -118 => NetError::ConnectionTimedOut,
            -130 => NetError::ProxyConnectionFailed,

            -300 => NetError::InvalidUrl,
            -302 => NetError::UnknownUrlScheme,
            -303 => NetError::InvalidRedirect,
            -320 => NetError::InvalidResponse,
            -321 => NetError::InvalidChunkedEncoding,
            -324 => NetError::EmptyResponse,
            -325 => NetError::ResponseHeadersTooBig,
            -330 => NetError::DecompressionFailed,
            -338 => NetError::InvalidAuthCredentials,
            -339 => NetError::UnsupportedAuthScheme,
            -341 => NetError::MissingAuthCredentials,
            -354 => NetError::ContentLengthMismatch,
            -355 => NetError::IncompleteChunkedEncoding,
            -370 => NetError::InvalidHttpResponse,
            -371 => NetError::DecompressionBadVersion,

            -10000 => NetError::AuthenticationExhausted,
            -10001 => NetError::DecompressionNonCompressedInput,
            -10002 => NetError::InvalidHeader,
            -10003 => NetError::InvalidUtf8,
            -10004 => NetError::WriteTimeout,
            _ => NetError::Unknown(code),
        }
    }
}
