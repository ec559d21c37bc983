//! Fixed-size line formatting.
//!
//! Every log call is rendered into a stack buffer of [`LINE_CAPACITY`]
//! bytes. Overflow truncates; the buffer never grows.

use core::fmt::{self, Write};

use crate::config::LINE_CAPACITY;

/// Log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Verbose = 5,
}

impl Level {
    /// Single-letter form used in line headers.
    pub fn letter(self) -> char {
        match self {
            Level::Error => 'E',
            Level::Warn => 'W',
            Level::Info => 'I',
            Level::Debug => 'D',
            Level::Verbose => 'V',
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Verbose,
        }
    }
}

/// Stack buffer holding one formatted line.
pub struct LineBuffer<const N: usize = LINE_CAPACITY> {
    buf: [u8; N],
    len: usize,
    truncated: bool,
}

impl<const N: usize> LineBuffer<N> {
    /// Create empty buffer
    pub const fn new() -> Self {
        Self {
            buf: [0u8; N],
            len: 0,
            truncated: false,
        }
    }

    /// Append formatted text, truncating at capacity.
    ///
    /// Returns the number of bytes written.
    pub fn format(&mut self, args: fmt::Arguments<'_>) -> usize {
        let before = self.len;
        let _ = self.write_fmt(args);
        self.len - before
    }

    /// Append raw bytes, truncating at capacity.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(N - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        if n < bytes.len() {
            self.truncated = true;
        }
        n
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Get buffer length
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if any write was cut short.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl<const N: usize> Write for LineBuffer<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Keep going after truncation so the formatter doesn't bail out.
        self.push_bytes(s.as_bytes());
        Ok(())
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
