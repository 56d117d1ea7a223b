//! Line-based codec for Protocol 3000 traffic.
//!
//! Commands are terminated with a carriage return (`\r`). Responses are
//! terminated with CRLF, and a single read from the socket may carry several
//! responses, a fragment of one, or a little line noise.

use bytes::BytesMut;

use crate::error::{ProtocolError, ProtocolResult};

/// Maximum length of a pending (unterminated) response line.
pub const MAX_LINE_LENGTH: usize = 512;

/// Chunks shorter than this are treated as noise and discarded.
pub const MIN_CHUNK_LEN: usize = 4;

/// Response line terminator.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Split one received chunk into response lines.
///
/// This is stateless: a line split across two chunks comes out as two broken
/// fragments. [`LineCodec`] keeps the partial line between chunks instead.
pub fn split_lines(chunk: &[u8]) -> Vec<String> {
    if chunk.len() < MIN_CHUNK_LEN {
        return Vec::new();
    }

    String::from_utf8_lossy(chunk)
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// A codec for reading response lines and writing commands.
///
/// Received bytes are accumulated until a CRLF terminator is seen, so a
/// response delivered in two pieces is reassembled before it is returned.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
        }
    }

    /// Add received data to the buffer.
    ///
    /// Returns `Ok(false)` if the chunk was discarded as noise. A short chunk
    /// is only noise when no partial line is waiting for its tail.
    ///
    /// If the unterminated tail grows past [`MAX_LINE_LENGTH`] the tail is
    /// dropped and `BufferOverflow` is returned. Complete lines already in the
    /// buffer can still be read with [`Self::decode_line`].
    pub fn push(&mut self, data: &[u8]) -> ProtocolResult<bool> {
        if self.buffer.is_empty() && data.len() < MIN_CHUNK_LEN {
            log::trace!("discarding {} byte chunk as noise", data.len());
            return Ok(false);
        }

        self.buffer.extend_from_slice(data);

        let pending = self.pending_len();
        if pending > MAX_LINE_LENGTH {
            // Drop the runaway tail; complete lines ahead of it stay decodable
            let complete = self.buffer.len() - pending;
            self.buffer.truncate(complete);
            return Err(ProtocolError::BufferOverflow {
                max: MAX_LINE_LENGTH,
                actual: pending,
            });
        }

        Ok(true)
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Empty lines are skipped. Returns `None` if more data is needed.
    pub fn decode_line(&mut self) -> Option<String> {
        loop {
            let end = find_terminator(&self.buffer)?;
            let line_data = self.buffer.split_to(end);
            let _ = self.buffer.split_to(LINE_TERMINATOR.len());

            if !line_data.is_empty() {
                return Some(String::from_utf8_lossy(&line_data).to_string());
            }
        }
    }

    /// Encode a command for transmission.
    ///
    /// Appends the carriage return terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + 1);
        buf.extend_from_slice(cmd.as_bytes());
        buf.push(b'\r');
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Length of the bytes after the last complete line.
    fn pending_len(&self) -> usize {
        let mut tail: &[u8] = &self.buffer;
        while let Some(end) = find_terminator(tail) {
            tail = &tail[end + LINE_TERMINATOR.len()..];
        }
        tail.len()
    }
}

fn find_terminator(data: &[u8]) -> Option<usize> {
    data.windows(LINE_TERMINATOR.len())
        .position(|window| window == LINE_TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines() {
        let lines = split_lines(b"~01@INFO-IO IN 1,OUT 1\r\n~01@INFO-PRST VID 8,AUD 0\r\n");
        assert_eq!(
            lines,
            vec![
                "~01@INFO-IO IN 1,OUT 1".to_string(),
                "~01@INFO-PRST VID 8,AUD 0".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_lines_drops_noise_and_empties() {
        assert!(split_lines(b"\r\n").is_empty());
        assert!(split_lines(b"ab\r").is_empty());
        assert!(split_lines(b"\r\n\r\n\r\n").is_empty());
        assert_eq!(split_lines(b"\r\n~01@X y"), vec!["~01@X y".to_string()]);
    }

    #[test]
    fn test_encode_command() {
        let encoded = LineCodec::encode_command("#ROUTE 1,1,3");
        assert_eq!(encoded, b"#ROUTE 1,1,3\r");
    }

    #[test]
    fn test_decode_lines() {
        let mut codec = LineCodec::new();
        assert!(codec.push(b"line1\r\n\r\nline2\r\n").unwrap());

        assert_eq!(codec.decode_line(), Some("line1".to_string()));
        assert_eq!(codec.decode_line(), Some("line2".to_string()));
        assert!(codec.decode_line().is_none());
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_partial_line() {
        let mut codec = LineCodec::new();
        codec.push(b"~01@INFO-IO IN").unwrap();
        assert!(codec.decode_line().is_none());

        codec.push(b" 11,OUT 9\r\n").unwrap();
        assert_eq!(codec.decode_line(), Some("~01@INFO-IO IN 11,OUT 9".to_string()));
    }

    #[test]
    fn test_short_tail_completes_pending_line() {
        let mut codec = LineCodec::new();
        codec.push(b"~01@ROUTE 1,1,3").unwrap();
        // Only two bytes, but they finish the pending line
        assert!(codec.push(b"\r\n").unwrap());
        assert_eq!(codec.decode_line(), Some("~01@ROUTE 1,1,3".to_string()));
    }

    #[test]
    fn test_short_chunk_is_noise_when_idle() {
        let mut codec = LineCodec::new();
        assert!(!codec.push(b"\r\n").unwrap());
        assert!(!codec.push(b"~").unwrap());
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_overflow_clears_buffer() {
        let mut codec = LineCodec::new();
        let junk = vec![b'x'; MAX_LINE_LENGTH + 1];
        assert_eq!(
            codec.push(&junk),
            Err(ProtocolError::BufferOverflow {
                max: MAX_LINE_LENGTH,
                actual: MAX_LINE_LENGTH + 1,
            })
        );
        assert_eq!(codec.buffered_len(), 0);

        // Complete lines do not count against the limit
        let mut many = Vec::new();
        for _ in 0..40 {
            many.extend_from_slice(b"~01@ROUTE 1,1,3\r\n");
        }
        assert!(codec.push(&many).unwrap());
        assert_eq!(std::iter::from_fn(|| codec.decode_line()).count(), 40);
    }

    #[test]
    fn test_overflow_keeps_complete_lines() {
        let mut codec = LineCodec::new();
        let mut chunk = b"~01@INFO-IO IN 4,OUT 1\r\n".to_vec();
        chunk.extend(vec![b'x'; MAX_LINE_LENGTH + 10]);

        assert!(matches!(codec.push(&chunk), Err(ProtocolError::BufferOverflow { .. })));
        assert_eq!(codec.decode_line(), Some("~01@INFO-IO IN 4,OUT 1".to_string()));
        assert!(codec.decode_line().is_none());
        assert_eq!(codec.buffered_len(), 0);
    }
}
