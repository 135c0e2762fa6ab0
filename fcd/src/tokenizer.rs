/// Splits a byte stream into complete lines, holding back an unterminated fragment until more
/// input arrives.
///
/// Lines are found by scanning for `\n` on raw bytes. That byte never occurs inside a multi-byte
/// UTF-8 sequence, so a chunk boundary splitting a character just leaves its leading bytes in the
/// pending fragment, and decoding only ever sees whole lines.
pub struct LineTokenizer {
    buffer: Vec<u8>,
    // Bytes before this offset were already handed out
    consumed: usize,
    // No '\n' exists in buffer[consumed..scanned]
    scanned: usize,
    at_start: bool,
    // Set by finish; an unterminated residual then counts as a line
    finished: bool,
}

const BOM: &[u8] = b"\xEF\xBB\xBF";

impl LineTokenizer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            consumed: 0,
            scanned: 0,
            at_start: true,
            finished: false,
        }
    }

    /// Appends a chunk and lazily yields every line it completes. Lines not pulled from the
    /// iterator stay buffered and come out of the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.compact();
        self.buffer.extend_from_slice(chunk);
        self.strip_bom();
        Lines { tokenizer: self }
    }

    /// Call once the stream ends. Yields every line still buffered, including any left behind by
    /// an abandoned iterator, then the residual fragment even without a trailing terminator.
    pub fn finish(&mut self) -> Lines<'_> {
        self.finished = true;
        Lines { tokenizer: self }
    }

    /// Number of bytes currently held back.
    pub fn pending(&self) -> usize {
        self.buffer.len() - self.consumed
    }

    fn next_line(&mut self) -> Option<String> {
        loop {
            let idx = self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.scanned + offset);
            let idx = match idx {
                Some(idx) => idx,
                None => {
                    self.scanned = self.buffer.len();
                    if !self.finished || self.consumed == self.buffer.len() {
                        return None;
                    }
                    let start = self.consumed;
                    self.consumed = self.buffer.len();
                    return decode(&self.buffer[start..]);
                }
            };
            let start = self.consumed;
            self.consumed = idx + 1;
            self.scanned = self.consumed;
            if let Some(line) = decode(&self.buffer[start..idx]) {
                return Some(line);
            }
        }
    }

    fn compact(&mut self) {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.scanned -= self.consumed;
            self.consumed = 0;
        }
    }

    fn strip_bom(&mut self) {
        if !self.at_start {
            return;
        }
        if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
            // Could still be the start of a BOM; wait for more bytes
            return;
        }
        if self.buffer.starts_with(BOM) {
            self.buffer.drain(..BOM.len());
            self.scanned = self.scanned.saturating_sub(BOM.len());
        }
        self.at_start = false;
    }
}

impl Default for LineTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Lines<'a> {
    tokenizer: &'a mut LineTokenizer,
}

impl<'a> Iterator for Lines<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.tokenizer.next_line()
    }
}

// Strips a trailing '\r'. Blank lines yield None.
fn decode(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);
    if line.trim().is_empty() {
        return None;
    }
    Some(line.into_owned())
}
