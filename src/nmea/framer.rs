//! # Sentence Framer
//!
//! Splits the unbounded receiver byte stream into newline-terminated sentences.
//!
//! The buffer is bounded. A sentence longer than the capacity is discarded:
//! the buffer resets to empty, the byte that did not fit is dropped, and the
//! stream re-synchronizes on the next line terminator. No error is surfaced,
//! so a corrupted stream can never stall the positioning task.

use tracing::debug;

/// Default sentence buffer capacity in bytes
///
/// NMEA-0183 caps sentences at 82 characters; the headroom covers proprietary
/// sentences from the receiver.
pub const DEFAULT_SENTENCE_CAPACITY: usize = 256;

/// Byte that terminates a sentence
pub const LINE_TERMINATOR: u8 = b'\n';

/// Line-delimited sentence accumulator
#[derive(Debug)]
pub struct SentenceFramer {
    buffer: Vec<u8>,
    capacity: usize,
    sentences: u64,
    overflows: u64,
}

impl Default for SentenceFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentenceFramer {
    /// Create a framer with [`DEFAULT_SENTENCE_CAPACITY`]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SENTENCE_CAPACITY)
    }

    /// Create a framer holding at most `capacity` bytes per sentence
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            sentences: 0,
            overflows: 0,
        }
    }

    /// Consume one byte from the stream
    ///
    /// # Returns
    ///
    /// * `Some(sentence)` - on a line terminator; the accumulated bytes, excluding the terminator
    /// * `None` - while a sentence is still being accumulated, or after an overflow reset
    ///
    /// # Examples
    ///
    /// ```
    /// use field_node::nmea::framer::SentenceFramer;
    ///
    /// let mut framer = SentenceFramer::new();
    /// assert!(framer.feed(b'$').is_none());
    /// assert_eq!(framer.feed(b'\n').as_deref(), Some(&b"$"[..]));
    /// ```
    pub fn feed(&mut self, byte: u8) -> Option<Vec<u8>> {
        if byte == LINE_TERMINATOR {
            self.sentences += 1;
            let sentence = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.capacity));
            return Some(sentence);
        }

        if self.buffer.len() >= self.capacity {
            self.overflows += 1;
            debug!(
                "Sentence exceeded {} bytes, discarding partial data (overflow #{})",
                self.capacity, self.overflows
            );
            self.buffer.clear();
            return None;
        }

        self.buffer.push(byte);
        None
    }

    /// Number of bytes currently buffered
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Maximum sentence length
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sentences handed out since creation
    pub fn sentences(&self) -> u64 {
        self.sentences
    }

    /// Overflow resets since creation
    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}
