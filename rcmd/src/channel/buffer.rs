//! Pattern buffer with incremental tail search.
//!
//! Output accumulates here until an expect call finds one of its patterns.
//! Each search only re-examines the last `search_depth` bytes of what was
//! already scanned plus everything that arrived since, so a long paginated
//! `show version` doesn't get rescanned from the top on every chunk.

use std::fmt;
use std::ops::Range;

use bytes::{Bytes, BytesMut};
use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Buffer for accumulating output and finding the earliest pattern match.
pub struct PatternBuffer {
    /// ANSI-stripped output not yet consumed by a match.
    buffer: BytesMut,

    /// How far behind the scanned mark a new search starts.
    search_depth: usize,

    /// Bytes already searched since the last rewind or consume.
    scanned: usize,

    /// Escape sequence parser; keeps state across chunk boundaries.
    parser: Parser,
}

/// Keeps printable text and the line-structure control bytes.
struct Printer<'a> {
    out: &'a mut BytesMut,
}

impl Perform for Printer<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\r' | b'\n' | b'\t') {
            self.out.extend_from_slice(&[byte]);
        }
    }
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            search_depth,
            scanned: 0,
            parser: Parser::new(),
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape sequences.
    pub fn extend(&mut self, data: &[u8]) {
        let mut printer = Printer {
            out: &mut self.buffer,
        };
        self.parser.advance(&mut printer, data);
    }

    /// Find the earliest match among `patterns`.
    ///
    /// Ties on start offset go to the lower pattern index. Returns the
    /// pattern index and the byte range of the match.
    pub fn find_earliest(&mut self, patterns: &[&Regex]) -> Option<(usize, Range<usize>)> {
        let start = self.scanned.saturating_sub(self.search_depth);
        let mut best: Option<(usize, Range<usize>)> = None;

        for (index, pattern) in patterns.iter().enumerate() {
            if let Some(m) = pattern.find_at(&self.buffer, start) {
                let earlier = best
                    .as_ref()
                    .is_none_or(|(_, range)| m.start() < range.start);
                if earlier {
                    best = Some((index, m.range()));
                }
            }
        }

        self.scanned = self.buffer.len();
        best
    }

    /// Remove and return everything up to `end`.
    pub fn consume(&mut self, end: usize) -> Bytes {
        self.scanned = 0;
        self.buffer.split_to(end).freeze()
    }

    /// Remove and return the whole buffer.
    pub fn take(&mut self) -> Bytes {
        self.consume(self.buffer.len())
    }

    /// Forget the scanned mark so the next search covers the whole buffer.
    pub fn rewind(&mut self) {
        self.scanned = 0;
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard the buffer contents.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
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
            .field("scanned", &self.scanned)
            .finish()
    }
}
