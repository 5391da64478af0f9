//! Line framing for the receiver control protocol.
//!
//! Commands and responses are ASCII lines terminated by a carriage return.
//! A receiver answers a query with one or more lines, and may interleave
//! status broadcasts for unrelated state at any time. TCP delivers these
//! lines in arbitrary chunks, so [`ResponseBuffer`] reassembles complete
//! lines from whatever arrives.

use bytes::BytesMut;

/// The carriage return that terminates every command and response line.
pub const TERMINATOR: u8 = b'\r';

/// Maximum bytes held for an unterminated line before the buffer is reset.
/// Real lines are a few dozen bytes; anything larger is noise.
pub const MAX_BUF: usize = 8192;

/// Encode a command line for the wire by appending the terminator.
///
/// ```
/// use avrlib_text_io::protocol::encode_line;
///
/// assert_eq!(encode_line("PW?"), b"PW?\r");
/// ```
pub fn encode_line(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(TERMINATOR);
    bytes
}

/// Whether a command requests state (ends in `?`) rather than changing it.
pub fn is_query(text: &str) -> bool {
    text.ends_with('?')
}

/// Accumulates the bytes received for one command attempt and splits them
/// into lines.
///
/// Complete lines are trimmed and kept in arrival order; empty lines are
/// dropped. Bytes after the last terminator stay pending until more data
/// arrives or [`flush_partial`](Self::flush_partial) is called.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    pending: BytesMut,
    lines: Vec<String>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a received chunk. Returns the number of new complete lines.
    pub fn append(&mut self, chunk: &[u8]) -> usize {
        let before = self.lines.len();
        self.pending.extend_from_slice(chunk);

        while let Some(pos) = self.pending.iter().position(|&b| b == TERMINATOR) {
            let record = self.pending.split_to(pos + 1);
            self.push_record(&record[..pos]);
        }

        if self.pending.len() > MAX_BUF {
            tracing::warn!(
                len = self.pending.len(),
                "response buffer overflow, discarding unterminated data"
            );
            self.pending.clear();
        }

        self.lines.len() - before
    }

    /// All complete lines received so far, oldest first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether bytes are waiting for a terminator.
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Promote any unterminated trailing bytes to a final line.
    ///
    /// Called when the attempt's deadline passes, so a last line sent
    /// without a terminator is still seen. Returns `true` if a line was
    /// added.
    pub fn flush_partial(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let record = self.pending.split();
        let before = self.lines.len();
        self.push_record(&record);
        self.lines.len() > before
    }

    fn push_record(&mut self, record: &[u8]) {
        let line = String::from_utf8_lossy(record);
        let line = line.trim();
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
    }
}
