//! Line assembly for the host link
//!
//! Bytes arrive one at a time from the UART. A line ends at `\n`; a `\r`
//! anywhere is dropped so both `\n` and `\r\n` terminators work.
//! Over-long lines are discarded whole and reported once, then the buffer
//! resynchronises on the next newline.

use heapless::{String, Vec};

use crate::MAX_STATE_VALUES;

/// Maximum accepted line length in bytes (excluding the terminator)
///
/// Sized for the longest command: `STATE:` with every value at ten
/// digits (`u32::MAX`) and a `:` between values.
pub const MAX_LINE_LEN: usize = "STATE:".len() + MAX_STATE_VALUES * 10 + (MAX_STATE_VALUES - 1);

/// A complete received line
pub type Line = String<MAX_LINE_LEN>;

/// Errors produced while assembling lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Line exceeded [`MAX_LINE_LEN`] and was discarded
    TooLong,
    /// Line contained bytes that are not valid UTF-8
    InvalidUtf8,
}

/// Accumulates bytes into newline-delimited lines
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    buffer: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl LineBuffer {
    /// Create an empty line buffer
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
        }
    }

    /// Discard any partial line
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Number of bytes buffered for the current line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a single byte
    ///
    /// Returns `Some(Ok(line))` when a non-empty line completes,
    /// `Some(Err(_))` when a completed line had to be discarded, and
    /// `None` while more bytes are needed.
    pub fn push(&mut self, byte: u8) -> Option<Result<Line, LineError>> {
        match byte {
            b'\r' => None,
            b'\n' => {
                if self.overflowed {
                    self.reset();
                    return Some(Err(LineError::TooLong));
                }
                if self.buffer.is_empty() {
                    return None;
                }
                let result = match core::str::from_utf8(&self.buffer) {
                    Ok(text) => {
                        let mut line = Line::new();
                        // Capacity matches the byte buffer, cannot fail
                        let _ = line.push_str(text);
                        Ok(line)
                    }
                    Err(_) => Err(LineError::InvalidUtf8),
                };
                self.reset();
                Some(result)
            }
            _ => {
                if !self.overflowed && self.buffer.push(byte).is_err() {
                    self.overflowed = true;
                }
                None
            }
        }
    }
}
