pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Receive-side buffer that splits a byte stream on `\n`. Bytes after the
/// last terminator stay buffered until the rest of the line arrives.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    scanned: usize,
    max_line_length: usize,
    discarded: u64,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            pending: Vec::with_capacity(1024),
            scanned: 0,
            max_line_length,
            discarded: 0,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete line with the terminator removed and surrounding
    /// whitespace trimmed. Invalid UTF-8 is replaced rather than rejected.
    pub fn next_line(&mut self) -> Option<String> {
        if let Some(offset) = self.pending[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            let line = String::from_utf8_lossy(&self.pending[..end]).trim().to_owned();
            self.pending.drain(..=end);
            self.scanned = 0;
            return Some(line);
        }

        self.scanned = self.pending.len();
        if self.pending.len() > self.max_line_length {
            log::warn!(
                "Discarding {} bytes of unterminated input",
                self.pending.len()
            );
            self.discarded += self.pending.len() as u64;
            self.pending.clear();
            self.scanned = 0;
        }
        None
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }
}
