//! Pattern buffer with efficient tail-search optimization.
//!
//! Only the last `search_depth` bytes of the buffer are searched for prompt
//! patterns, rather than the entire output. For large outputs (e.g., full BGP
//! tables) this is critical for performance.

use std::fmt;
use std::ops::Range;

use memchr::{memmem, memrchr};

use super::patterns::PromptPattern;

/// Collects the printable text of a terminal byte stream.
///
/// Escape sequences are dropped, carriage returns are discarded and
/// backspaces erase the previous byte.
struct Printable<'a>(&'a mut Vec<u8>);

impl vte::Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.0.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | b'\t' => self.0.push(byte),
            0x08 => {
                self.0.pop();
            }
            _ => {}
        }
    }
}

/// Buffer for accumulating output and efficiently searching for patterns.
pub struct PatternBuffer {
    /// The accumulated, ANSI-stripped output.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    /// Escape-sequence parser; keeps state across chunks so a sequence split
    /// over two reads is still stripped.
    parser: vte::Parser,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            parser: vte::Parser::new(),
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD; this never fails.
    pub fn extend(&mut self, data: &[u8]) {
        let mut sink = Printable(&mut self.buffer);
        self.parser.advance(&mut sink, data);
    }

    /// Start offset of the tail window within `from..`.
    ///
    /// The window is widened back to the start of the line it would cut so
    /// `^` anchors never see a fake line start.
    fn tail_start(&self, from: usize) -> usize {
        let start = self.buffer.len().saturating_sub(self.search_depth).max(from);
        if start == from {
            return from;
        }
        memrchr(b'\n', &self.buffer[from..start]).map_or(from, |pos| from + pos + 1)
    }

    /// Search the tail of `self[from..]` for the first prompt in `prompts`
    /// that sits at the end of the buffer.
    ///
    /// Returns the index of the matching pattern and the absolute span of
    /// the prompt.
    pub fn search_prompts(
        &self,
        prompts: &[PromptPattern],
        from: usize,
    ) -> Option<(usize, Range<usize>)> {
        if from >= self.buffer.len() {
            return None;
        }
        let start = self.tail_start(from);
        let tail = &self.buffer[start..];
        prompts.iter().enumerate().find_map(|(index, prompt)| {
            prompt
                .find_at_tail(tail)
                .map(|span| (index, span.start + start..span.end + start))
        })
    }

    /// Search only the tail of the buffer for a single prompt.
    pub fn search_tail(&self, prompt: &PromptPattern) -> Option<Range<usize>> {
        self.search_prompts(std::slice::from_ref(prompt), 0)
            .map(|(_, span)| span)
    }

    /// Find `needle` anywhere in `self[from..]`, returning the absolute span.
    pub fn find_from(&self, needle: &[u8], from: usize) -> Option<Range<usize>> {
        if from > self.buffer.len() {
            return None;
        }
        memmem::find(&self.buffer[from..], needle).map(|pos| from + pos..from + pos + needle.len())
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// The last `max` bytes as text, for error context.
    pub fn tail_lossy(&self, max: usize) -> String {
        let start = self.buffer.len().saturating_sub(max);
        String::from_utf8_lossy(&self.buffer[start..]).into_owned()
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop the first `n` bytes, keeping the parser state.
    pub fn discard_front(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.drain(..n);
    }

    /// Clear the buffer and any half-parsed escape sequence.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.parser = vte::Parser::new();
    }

    /// Get the search depth setting.
    pub fn search_depth(&self) -> usize {
        self.search_depth
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}
