//! `Content-Encoding: gzip` / `deflate` decoding.
//!
//! The framing is detected from the data rather than trusted from the
//! header: servers routinely send raw deflate, zlib-wrapped deflate, or even
//! gzip under `deflate`.

use crate::base::neterror::NetError;
use crate::http::headercollection::HeaderCollection;
use flate2::read::GzDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use std::io::Read;

/// Encodings this engine advertises in `Accept-Encoding`.
pub const ACCEPT_ENCODING: &str = "gzip, deflate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    /// The encoding named by the response's `Content-Encoding` header.
    ///
    /// Unknown codings yield `None`; the body is then handed over as it was
    /// received.
    pub fn from_headers(headers: &HeaderCollection) -> Option<Self> {
        let value = match headers.get("Content-Encoding") {
            Some(v) => v.trim(),
            None => return Some(ContentEncoding::Identity),
        };
        if value.is_empty() || value.eq_ignore_ascii_case("identity") {
            Some(ContentEncoding::Identity)
        } else if value.eq_ignore_ascii_case("gzip") || value.eq_ignore_ascii_case("x-gzip") {
            Some(ContentEncoding::Gzip)
        } else if value.eq_ignore_ascii_case("deflate") {
            Some(ContentEncoding::Deflate)
        } else {
            None
        }
    }
}

/// Inflate a gzip, zlib or raw deflate body.
pub fn decode(data: &[u8]) -> Result<Vec<u8>, NetError> {
    if data.is_empty() {
        return Err(NetError::DecompressionNonCompressedInput);
    }

    if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
        // Deflate (8) is the only compression method gzip defines.
        if data.len() > 2 && data[2] != 8 {
            return Err(NetError::DecompressionBadVersion);
        }
        return gunzip(data);
    }

    if looks_like_zlib(data) {
        if data[0] & 0x0f == 8 {
            return inflate(data, true).map_err(InflateError::into_net_error);
        }
        // A zlib header with another method, unless it is raw deflate that
        // happens to look like one.
        return inflate(data, false).map_err(|_| NetError::DecompressionBadVersion);
    }

    match inflate(data, false) {
        Ok(out) => Ok(out),
        Err(InflateError::Corrupt) => Err(NetError::DecompressionNonCompressedInput),
        Err(e) => Err(e.into_net_error()),
    }
}

fn looks_like_zlib(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] >> 4 <= 7 && (u16::from(data[0]) << 8 | u16::from(data[1])) % 31 == 0
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, NetError> {
    let mut out = Vec::new();
    out.try_reserve(data.len().saturating_mul(2))
        .map_err(|_| NetError::OutOfMemory)?;
    GzDecoder::new(data).read_to_end(&mut out).map_err(|e| {
        tracing::debug!(error = %e, "gzip decoding failed");
        NetError::DecompressionFailed
    })?;
    Ok(out)
}

#[derive(Debug)]
enum InflateError {
    Corrupt,
    Truncated,
    OutOfMemory,
}

impl InflateError {
    fn into_net_error(self) -> NetError {
        match self {
            InflateError::OutOfMemory => NetError::OutOfMemory,
            InflateError::Corrupt | InflateError::Truncated => NetError::DecompressionFailed,
        }
    }
}

/// Run the inflater until the stream ends. Running out of input first is
/// a truncated body, not success.
fn inflate(input: &[u8], zlib_header: bool) -> Result<Vec<u8>, InflateError> {
    let mut state = Decompress::new(zlib_header);
    let mut out: Vec<u8> = Vec::new();
    loop {
        if out.len() == out.capacity() {
            let grow = out.capacity().max(input.len()).max(4096);
            out.try_reserve(grow)
                .map_err(|_| InflateError::OutOfMemory)?;
        }
        let consumed = state.total_in() as usize;
        let produced = out.len();
        let status = state
            .decompress_vec(&input[consumed..], &mut out, FlushDecompress::None)
            .map_err(|_| InflateError::Corrupt)?;
        if status == Status::StreamEnd {
            return Ok(out);
        }
        if state.total_in() as usize == consumed && out.len() == produced {
            return Err(InflateError::Truncated);
        }
    }
}
