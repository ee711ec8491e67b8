//! ANSI escape sequence stripping.
//!
//! Interactive programs frequently decorate prompts with colors and cursor
//! movement. Stripping runs before line splitting so patterns can be written
//! against the visible text. The parser keeps its state between chunks, so
//! an escape sequence split across two reads is still removed.

use std::fmt;

use vte::{Parser, Perform};

/// Incremental ANSI escape sequence stripper for one channel.
pub struct AnsiStripper {
    parser: Parser,
}

impl AnsiStripper {
    /// Create a new stripper.
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Strip escape sequences from `data`, keeping printable text, line
    /// breaks, carriage returns and tabs.
    ///
    /// Output is decoded as UTF-8, so malformed byte sequences are replaced
    /// with U+FFFD rather than passed through raw.
    pub fn strip(&mut self, data: &[u8]) -> Vec<u8> {
        let mut printer = Printer {
            out: Vec::with_capacity(data.len()),
        };
        self.parser.advance(&mut printer, data);
        printer.out
    }
}

impl Default for AnsiStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AnsiStripper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnsiStripper").finish_non_exhaustive()
    }
}

struct Printer {
    out: Vec<u8>,
}

impl Perform for Printer {
    fn print(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(byte);
        }
    }
}
