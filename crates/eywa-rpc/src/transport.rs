//! Newline-delimited framing for JSON-RPC messages.
//!
//! Each message is one line of UTF-8 JSON terminated by `\n`. The decoder only
//! splits lines; JSON parsing happens in the connection so that a bad line is
//! dropped without ending the stream.
//!
//! Frame format:
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"task.get"}\n
//! {"jsonrpc":"2.0","id":1,"result":{...}}\n
//! ```
//!
//! A trailing `\r` is stripped and blank lines are skipped. Lines longer than
//! the configured limit are discarded up to the next newline and reported as
//! [`Frame::Oversized`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::Message;

/// Default line limit (16 MiB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// One decoded unit of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line without its terminator
    Line(Bytes),
    /// A line that exceeded the limit; carries the number of bytes discarded
    Oversized(usize),
}

/// Codec for newline-delimited JSON-RPC messages
#[derive(Debug)]
pub struct JsonLineCodec {
    max_length: usize,
    // Offset already scanned for '\n' in the pending buffer
    next_index: usize,
    // Bytes thrown away so far while skipping an oversized line
    discarding: Option<usize>,
}

impl JsonLineCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: None,
        }
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn finish_line(&self, mut line: BytesMut) -> Option<Frame> {
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if line.len() > self.max_length {
            return Some(Frame::Oversized(line.len()));
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(Frame::Line(line.freeze()))
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for JsonLineCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            match (self.discarding, newline) {
                (Some(discarded), Some(pos)) => {
                    src.advance(pos + 1);
                    self.discarding = None;
                    self.next_index = 0;
                    return Ok(Some(Frame::Oversized(discarded + pos)));
                }
                (Some(discarded), None) => {
                    let len = src.len();
                    src.advance(len);
                    self.discarding = Some(discarded + len);
                    self.next_index = 0;
                    return Ok(None);
                }
                (None, Some(pos)) => {
                    let mut line = src.split_to(pos + 1);
                    line.truncate(pos);
                    self.next_index = 0;
                    if let Some(frame) = self.finish_line(line) {
                        return Ok(Some(frame));
                    }
                }
                (None, None) => {
                    if src.len() > self.max_length {
                        let len = src.len();
                        src.advance(len);
                        self.discarding = Some(len);
                        self.next_index = 0;
                    } else {
                        self.next_index = src.len();
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if let Some(discarded) = self.discarding.take() {
            return Ok(Some(Frame::Oversized(discarded)));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        // Final line without a terminator
        let line = buf.split();
        self.next_index = 0;
        Ok(self.finish_line(line))
    }
}

impl Encoder<Message> for JsonLineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;

        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');

        Ok(())
    }
}

/// Errors that can occur during codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RequestId, RpcError};
    use serde_json::json;

    fn decode_all(codec: &mut JsonLineCodec, buf: &mut BytesMut) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    fn line(s: &str) -> Frame {
        Frame::Line(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[test]
    fn test_encode_appends_newline() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::new();

        let msg = Message::request(1.into(), "test", Some(json!({"key": "value"})));
        codec.encode(msg, &mut buf).unwrap();

        assert_eq!(
            &buf[..],
            b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"test\",\"params\":{\"key\":\"value\"}}\n"
        );
    }

    #[test]
    fn test_encoded_message_has_single_newline() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::new();

        let msg = Message::notification("task.log", Some(json!({"message": "a\nb"})));
        codec.encode(msg, &mut buf).unwrap();

        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 1);
        assert_eq!(buf.last(), Some(&b'\n'));
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::new();

        let msg = Message::error_response(
            RequestId::String("abc".to_string()),
            RpcError::method_not_found("nope"),
        );
        codec.encode(msg.clone(), &mut buf).unwrap();

        let Some(Frame::Line(bytes)) = codec.decode(&mut buf).unwrap() else {
            panic!("Expected a line");
        };
        assert_eq!(Message::from_slice(&bytes).unwrap(), msg);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_empty_buffer() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::new();

        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_multiple_lines_in_buffer() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"b\":2}\n"[..]);

        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames, vec![line("{\"a\":1}"), line("{\"b\":2}")]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_decode() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"method\":"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\"ping\"}");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(line("{\"method\":\"ping\"}"))
        );
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"a\":1}\r\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(line("{\"a\":1}")));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"\n\r\n   \n{\"a\":1}\n\n"[..]);

        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames, vec![line("{\"a\":1}")]);
    }

    #[test]
    fn test_oversized_line_is_discarded() {
        let mut codec = JsonLineCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"0123456789abcdef\n{\"a\":1}\n"[..]);

        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames, vec![Frame::Oversized(16), line("{\"a\":1}")]);
    }

    #[test]
    fn test_oversized_line_across_reads() {
        let mut codec = JsonLineCodec::with_max_length(12);
        let mut buf = BytesMut::from(&b"0123456789abc"[..]);

        // Discarding starts before the newline shows up
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());

        buf.extend_from_slice(b"abcdef");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"gh\n{\"ok\":true}\n");
        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames, vec![Frame::Oversized(21), line("{\"ok\":true}")]);
    }

    #[test]
    fn test_line_at_limit_is_kept() {
        let mut codec = JsonLineCodec::with_max_length(7);
        let mut buf = BytesMut::from(&b"{\"a\":1}\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(line("{\"a\":1}")));
    }

    #[test]
    fn test_decode_eof_yields_unterminated_line() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"b\":2}"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(line("{\"a\":1}")));
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(line("{\"b\":2}")));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_eof_while_discarding() {
        let mut codec = JsonLineCodec::with_max_length(4);
        let mut buf = BytesMut::from(&b"0123456789"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(Frame::Oversized(10)));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_eof_blank_tail() {
        let mut codec = JsonLineCodec::new();
        let mut buf = BytesMut::from(&b"  \r"[..]);

        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_default_max_length() {
        assert_eq!(JsonLineCodec::default().max_length(), DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn test_codec_error_display_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "connection reset");
        let err = CodecError::Io(io_err);
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_codec_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let codec_err: CodecError = json_err.into();
        assert!(matches!(codec_err, CodecError::Json(_)));
        assert!(codec_err.to_string().contains("JSON error"));
    }
}
