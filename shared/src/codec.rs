//! Newline-delimited codec for the bind link
//!
//! All messages are framed as:
//! ```text
//! [ N bytes: UTF-8 line, no '\n' ][ '\n' ]
//! ```
//!
//! A trailing '\r' before the terminator is tolerated on input.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::limits::MAX_LINE_SIZE;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Line too long: {0} bytes")]
    LineTooLong(usize),

    #[error("Line contains an embedded newline")]
    EmbeddedNewline,

    #[error("Line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Encode a line into a terminated byte buffer
pub fn encode(line: &str) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(line.len() + 1);
    encode_into(line, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a line directly into a provided buffer
pub fn encode_into(line: &str, buf: &mut BytesMut) -> Result<(), CodecError> {
    if line.len() > MAX_LINE_SIZE {
        return Err(CodecError::LineTooLong(line.len()));
    }
    if line.contains('\n') {
        return Err(CodecError::EmbeddedNewline);
    }

    buf.reserve(line.len() + 1);
    buf.put_slice(line.as_bytes());
    buf.put_u8(b'\n');

    Ok(())
}

/// Try to decode one line from a buffer
///
/// Returns:
/// - `Ok(Some(line))` if a complete line was decoded
/// - `Ok(None)` if more data is needed
/// - `Err(...)` if the data is invalid
pub fn decode(buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
    decode_from(buf, 0, MAX_LINE_SIZE)
}

/// Like [`decode`], with the first `scanned` bytes known to hold no newline
fn decode_from(
    buf: &mut BytesMut,
    scanned: usize,
    max_line: usize,
) -> Result<Option<String>, CodecError> {
    let start = scanned.min(buf.len());
    let Some(offset) = buf[start..].iter().position(|b| *b == b'\n') else {
        if buf.len() > max_line {
            return Err(CodecError::LineTooLong(buf.len()));
        }
        return Ok(None);
    };

    let pos = start + offset;
    if pos > max_line {
        return Err(CodecError::LineTooLong(pos));
    }

    let mut line = buf.split_to(pos + 1);
    line.truncate(pos);
    if line.last() == Some(&b'\r') {
        line.truncate(pos - 1);
    }

    Ok(Some(String::from_utf8(line.to_vec())?))
}

/// Decoder state machine for streaming decoding
#[derive(Debug)]
pub struct LineDecoder {
    /// Partial line data being accumulated
    buffer: BytesMut,
    /// Leading bytes of `buffer` already searched for a newline
    scanned: usize,
    max_line: usize,
}

impl LineDecoder {
    /// Create a new line decoder
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_SIZE)
    }

    /// Decoder rejecting lines longer than `max_line` bytes
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            scanned: 0,
            max_line,
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next line from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete lines
    pub fn decode_next(&mut self) -> Result<Option<String>, CodecError> {
        let result = decode_from(&mut self.buffer, self.scanned, self.max_line);
        self.scanned = match &result {
            Ok(None) => self.buffer.len(),
            _ => 0,
        };
        result
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_appends_newline() {
        let encoded = encode("OK\t1.0").expect("encode failed");
        assert_eq!(&encoded[..], b"OK\t1.0\n");
    }

    #[test]
    fn test_encode_rejects_newline() {
        assert!(matches!(encode("a\nb"), Err(CodecError::EmbeddedNewline)));
    }

    #[test]
    fn test_partial_decode() {
        let mut buf = BytesMut::from(&b"VERS"[..]);
        let result = decode(&mut buf).expect("decode should not fail on partial data");
        assert!(result.is_none(), "should return None for partial data");

        // Buffer should be unchanged (data not consumed)
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_line_decoder() {
        let mut decoder = LineDecoder::new();

        decoder.extend(b"BIND\tabc");
        assert!(decoder.decode_next().expect("decode error").is_none());

        decoder.extend(b"def\nUNBIND\r\nVER");
        assert_eq!(
            decoder.decode_next().expect("decode error").as_deref(),
            Some("BIND\tabcdef")
        );
        assert_eq!(
            decoder.decode_next().expect("decode error").as_deref(),
            Some("UNBIND")
        );
        assert!(decoder.decode_next().expect("decode error").is_none());
        assert_eq!(decoder.buffer_len(), 3);
    }

    #[test]
    fn test_empty_line() {
        let mut buf = BytesMut::from(&b"\n"[..]);
        assert_eq!(decode(&mut buf).unwrap().as_deref(), Some(""));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = BytesMut::from(&b"\xff\xfe\n"[..]);
        assert!(matches!(decode(&mut buf), Err(CodecError::InvalidUtf8(_))));
    }

    #[test]
    fn test_no_newline_over_limit() {
        let mut decoder = LineDecoder::with_max_line(16);
        decoder.extend(&[b'A'; 16]);
        assert!(decoder.decode_next().unwrap().is_none());

        decoder.extend(b"A");
        assert!(matches!(
            decoder.decode_next(),
            Err(CodecError::LineTooLong(17))
        ));
    }

    #[test]
    fn test_newline_past_limit() {
        let mut decoder = LineDecoder::with_max_line(16);
        decoder.extend(&[b'B'; 16]);
        decoder.extend(b"\n");
        assert_eq!(decoder.decode_next().unwrap().map(|l| l.len()), Some(16));

        decoder.extend(&[b'B'; 20]);
        decoder.extend(b"\nOK\n");
        assert!(matches!(
            decoder.decode_next(),
            Err(CodecError::LineTooLong(20))
        ));
    }

    #[test]
    fn test_default_limit_rejects_oversized_buffer() {
        let mut buf = BytesMut::from(vec![b'C'; MAX_LINE_SIZE + 1].as_slice());
        assert!(matches!(
            decode(&mut buf),
            Err(CodecError::LineTooLong(n)) if n == MAX_LINE_SIZE + 1
        ));
    }

    #[test]
    fn test_chunked_large_line_resumes_scan() {
        let chunk = [b'x'; 4096];
        let mut decoder = LineDecoder::new();

        for _ in 0..2048 {
            decoder.extend(&chunk);
            assert!(decoder.decode_next().unwrap().is_none());
            assert_eq!(decoder.scanned, decoder.buffer_len());
        }

        decoder.extend(b"\nUNBIND\n");
        assert_eq!(
            decoder.decode_next().unwrap().map(|l| l.len()),
            Some(2048 * 4096)
        );
        assert_eq!(decoder.scanned, 0);
        assert_eq!(decoder.decode_next().unwrap().as_deref(), Some("UNBIND"));
    }
}
