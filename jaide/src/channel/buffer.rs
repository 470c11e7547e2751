//! Terminal output buffer with ANSI stripping.
//!
//! Junos terminals emit colour codes and cursor movement around prompts and
//! `| no-more` output. Bytes are fed through a `vte` state machine that keeps
//! only printable characters and line structure. The parser persists across
//! [`OutputBuffer::extend`] calls, so escape sequences split over two reads
//! are still removed.

use vte::{Parser, Perform};

/// Accumulates cleaned terminal output.
pub struct OutputBuffer {
    parser: Parser,
    text: Printable,
}

struct Printable(String);

impl Perform for Printable {
    fn print(&mut self, c: char) {
        self.0.push(c);
    }

    fn execute(&mut self, byte: u8) {
        // \r is dropped so that \r\n line endings collapse to \n
        match byte {
            b'\n' | b'\t' => self.0.push(byte as char),
            _ => {}
        }
    }
}

impl OutputBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            text: Printable(String::with_capacity(4096)),
        }
    }

    /// Feed raw bytes from the channel.
    pub fn extend(&mut self, data: &[u8]) {
        self.parser.advance(&mut self.text, data);
    }

    /// Cleaned text received so far.
    pub fn as_str(&self) -> &str {
        &self.text.0
    }

    /// Take the text and reset.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text.0)
    }

    /// Check if nothing has been received.
    pub fn is_empty(&self) -> bool {
        self.text.0.is_empty()
    }

    /// Discard everything received.
    pub fn clear(&mut self) {
        self.text.0.clear();
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = OutputBuffer::new();
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_str(), "Hello, world!");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = OutputBuffer::new();
        buffer.extend(b"\x1b[32mGreen text\x1b[0m\r\nlab@r1> ");
        assert_eq!(buffer.as_str(), "Green text\nlab@r1> ");
    }

    #[test]
    fn test_escape_split_across_reads() {
        let mut buffer = OutputBuffer::new();
        buffer.extend(b"before\x1b[3");
        buffer.extend(b"2mafter");
        assert_eq!(buffer.as_str(), "beforeafter");
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = OutputBuffer::new();
        buffer.extend(b"test data");
        assert_eq!(buffer.take(), "test data");
        assert!(buffer.is_empty());
    }
}
