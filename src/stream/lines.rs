use memchr::memchr_iter;

use crate::error::GatewayError;

/// Longest line accepted from the upstream body.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental line splitter over raw body bytes.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere. Lines end at `\n`
/// with one trailing `\r` stripped. Since `\n` never occurs inside a multi-byte
/// UTF-8 sequence, each complete line is decoded on its own.
pub struct LineSplitter {
    buffer: Vec<u8>,
    read_offset: usize,
    max_line_bytes: usize,
}

impl LineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_bytes(MAX_LINE_BYTES)
    }

    #[must_use]
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            read_offset: 0,
            max_line_bytes,
        }
    }

    /// Feed raw bytes and append every completed line to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UpstreamRead`] when a line grows past the limit.
    pub fn feed_into(&mut self, chunk: &[u8], out: &mut Vec<String>) -> Result<(), GatewayError> {
        let scan_start = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut processed_up_to = self.read_offset;
        for rel_pos in memchr_iter(b'\n', &self.buffer[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let line = &self.buffer[processed_up_to..line_end];
            if line.len() > self.max_line_bytes {
                return Err(self.line_too_long());
            }
            out.push(decode_line(line));
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return Ok(());
        }
        if self.buffer.len() - self.read_offset > self.max_line_bytes {
            return Err(self.line_too_long());
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
        Ok(())
    }

    /// Flush the trailing unterminated line, if any, at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let rest = &self.buffer[self.read_offset..];
        let line = if rest.is_empty() {
            None
        } else {
            Some(decode_line(rest))
        };
        self.buffer.clear();
        self.read_offset = 0;
        line
    }

    fn line_too_long(&self) -> GatewayError {
        GatewayError::UpstreamRead(format!(
            "upstream line exceeds {} bytes",
            self.max_line_bytes
        ))
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
