//! Chunked transfer decoding.
//!
//! Each chunk is a hex size line, that many bytes, and a CRLF. A zero size
//! ends the body; trailer lines follow up to a blank line and are
//! discarded.

use crate::base::neterror::NetError;
use crate::socket::bufferedstream::{BufferedStream, MAX_HEADER_BYTES};

/// Longest chunk size line accepted, extensions included.
const MAX_SIZE_LINE: usize = 4096;

/// Parse a chunk size line: optional leading spaces, optional `0x`, hex
/// digits. Anything after `;` is a chunk extension and ignored.
pub fn parse_chunk_size(line: &[u8]) -> Result<u64, NetError> {
    let line = match line.iter().position(|&b| b == b';') {
        Some(pos) => &line[..pos],
        None => line,
    };
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    let line = &line[start..end.max(start)];
    let digits = line
        .strip_prefix(b"0x")
        .or_else(|| line.strip_prefix(b"0X"))
        .unwrap_or(line);
    if digits.is_empty() {
        return Err(NetError::InvalidChunkedEncoding);
    }

    let mut size: u64 = 0;
    for &b in digits {
        let digit = (b as char)
            .to_digit(16)
            .ok_or(NetError::InvalidChunkedEncoding)?;
        size = size
            .checked_mul(16)
            .and_then(|s| s.checked_add(u64::from(digit)))
            .ok_or(NetError::InvalidChunkedEncoding)?;
    }
    Ok(size)
}

/// Decode a chunked body from `stream`, appending the payload to `out`.
pub async fn read_chunked(stream: &mut BufferedStream, out: &mut Vec<u8>) -> Result<(), NetError> {
    loop {
        let line = stream
            .read_line(MAX_SIZE_LINE, NetError::InvalidChunkedEncoding)
            .await
            .map_err(incomplete)?
            .ok_or(NetError::IncompleteChunkedEncoding)?;
        let size = parse_chunk_size(&line)?;
        if size == 0 {
            break;
        }

        let size = usize::try_from(size).map_err(|_| NetError::OutOfMemory)?;
        stream.read_exact_into(out, size).await.map_err(incomplete)?;

        match stream
            .read_line(MAX_SIZE_LINE, NetError::InvalidChunkedEncoding)
            .await
            .map_err(incomplete)?
        {
            Some(line) if line.is_empty() => {}
            Some(_) => return Err(NetError::InvalidChunkedEncoding),
            None => return Err(NetError::IncompleteChunkedEncoding),
        }
    }

    // Trailers. A peer that closes right after the last chunk is tolerated.
    let mut trailer_bytes = 0;
    while let Some(line) = stream
        .read_line(MAX_HEADER_BYTES, NetError::ResponseHeadersTooBig)
        .await?
    {
        if line.is_empty() {
            break;
        }
        trailer_bytes += line.len();
        if trailer_bytes > MAX_HEADER_BYTES {
            return Err(NetError::ResponseHeadersTooBig);
        }
    }
    Ok(())
}

fn incomplete(e: NetError) -> NetError {
    match e {
        NetError::ConnectionClosed => NetError::IncompleteChunkedEncoding,
        e => e,
    }
}

#[cfg(test)]
pub(crate) fn chunk_encode(data: &[u8], chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for piece in data.chunks(chunk.max(1)) {
        out.extend_from_slice(format!("{:x}\r\n", piece.len()).as_bytes());
        out.extend_from_slice(piece);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::bufferedstream::IoSettings;
    use crate::socket::stream::BoxedSocket;
    use tokio::io::AsyncWriteExt;

    async fn dechunk(wire: &[u8]) -> Result<(Vec<u8>, usize), NetError> {
        let (a, mut b) = tokio::io::duplex(wire.len() + 64);
        b.write_all(wire).await.unwrap();
        drop(b);
        let mut stream = BufferedStream::new(BoxedSocket::new(a), IoSettings::default());
        let mut out = Vec::new();
        read_chunked(&mut stream, &mut out).await?;
        Ok((out, stream.buffered()))
    }

    #[test]
    fn test_size_line_forms() {
        assert_eq!(parse_chunk_size(b"1a").unwrap(), 26);
        assert_eq!(parse_chunk_size(b"  FF").unwrap(), 255);
        assert_eq!(parse_chunk_size(b"0x10").unwrap(), 16);
        assert_eq!(parse_chunk_size(b"4;name=value").unwrap(), 4);
        assert_eq!(parse_chunk_size(b"0").unwrap(), 0);
    }

    #[test]
    fn test_size_line_rejects_garbage() {
        assert_eq!(parse_chunk_size(b""), Err(NetError::InvalidChunkedEncoding));
        assert_eq!(parse_chunk_size(b"xyz"), Err(NetError::InvalidChunkedEncoding));
        assert_eq!(
            parse_chunk_size(b"fffffffffffffffff"),
            Err(NetError::InvalidChunkedEncoding)
        );
    }

    #[tokio::test]
    async fn test_wikipedia_example() {
        let (body, rest) = dechunk(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n").await.unwrap();
        assert_eq!(body, b"Wikipedia");
        assert_eq!(rest, 0);
    }

    #[tokio::test]
    async fn test_encode_decode_various_sizes() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        for chunk in [1, 7, 512, 4096, 10_000] {
            let (body, _) = dechunk(&chunk_encode(&data, chunk)).await.unwrap();
            assert_eq!(body, data, "chunk size {}", chunk);
        }
    }

    #[tokio::test]
    async fn test_trailers_consumed_and_next_response_kept() {
        let wire = b"3\r\nabc\r\n0\r\nX-Checksum: 1\r\n\r\nHTTP/1.1 200 OK\r\n";
        let (body, rest) = dechunk(wire).await.unwrap();
        assert_eq!(body, b"abc");
        assert_eq!(rest, b"HTTP/1.1 200 OK\r\n".len());
    }

    #[tokio::test]
    async fn test_truncated_body() {
        assert_eq!(
            dechunk(b"a\r\nabc").await.unwrap_err(),
            NetError::IncompleteChunkedEncoding
        );
        assert_eq!(
            dechunk(b"3\r\nabc\r\n").await.unwrap_err(),
            NetError::IncompleteChunkedEncoding
        );
    }

    #[tokio::test]
    async fn test_missing_crlf_after_data() {
        assert_eq!(
            dechunk(b"3\r\nabcX\r\n0\r\n\r\n").await.unwrap_err(),
            NetError::InvalidChunkedEncoding
        );
    }
}
