//! Incremental object-boundary detection over a growing text buffer.
//!
//! Increments are appended to a pending buffer. A buffer without `{` is
//! released whole as prose. Otherwise complete `{...}` spans are cut out left
//! to right by depth counting, and an unfinished object waits for more input.
//!
//! Boundary detection anchors on the first `{`: text preceding an object in a
//! buffer that contains braces is dropped when the object completes, and text
//! after the last complete object stays pending until an increment arrives
//! that leaves the buffer brace-free. Braces inside string literals are not
//! special.

use tracing::debug;

/// End (exclusive) of the balanced span opening at `start`, or `None` while the
/// span is still open. `buf[start]` must be `open`; both delimiters are ASCII.
pub fn matching_close(buf: &str, start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth: i64 = 0;
    for (offset, &b) in buf.as_bytes()[start..].iter().enumerate() {
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(start + offset + 1);
            }
        }
    }
    None
}

#[derive(Debug, Default)]
pub struct BoundaryParser {
    pending: String,
}

impl BoundaryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one increment and return the chunks it resolves, in text order.
    pub fn consume(&mut self, text: &str) -> Vec<String> {
        self.pending.push_str(text);
        let mut chunks = Vec::new();

        let Some(mut start) = self.pending.find('{') else {
            if !self.pending.is_empty() {
                chunks.push(std::mem::take(&mut self.pending));
            }
            return chunks;
        };

        while let Some(end) = matching_close(&self.pending, start, b'{', b'}') {
            if start > 0 {
                debug!(bytes = start, "dropping text ahead of object boundary");
            }
            chunks.push(self.pending[start..end].to_string());
            self.pending.drain(..end);
            match self.pending.find('{') {
                Some(next) => start = next,
                None => break,
            }
        }
        chunks
    }

    /// Release whatever is left, complete or not.
    pub fn flush_remainder(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
