//! Non-allocating diagnostics.
//!
//! Everything here may run inside `malloc`, so lines are formatted into a
//! fixed stack buffer and written to stderr with a single `write(2)`. Lines
//! longer than the buffer are truncated.

use core::fmt::{self, Write};

/// Prefix of every diagnostic line.
pub const PREFIX: &str = "tagshim: ";

/// Capacity of one diagnostic line, newline included.
pub const LINE_CAPACITY: usize = 256;

/// Fixed-capacity line buffer.
pub struct LineBuf {
    buf: [u8; LINE_CAPACITY],
    len: usize,
}

impl LineBuf {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0; LINE_CAPACITY],
            len: 0,
        }
    }

    /// Append raw bytes, truncating at capacity (one byte is kept back for
    /// the trailing newline).
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let room = (LINE_CAPACITY - 1).saturating_sub(self.len);
        let take = bytes.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&bytes[..take]);
        self.len += take;
    }

    /// Terminate the line. Idempotent.
    pub fn finish(&mut self) {
        if (self.len == 0 || self.buf[self.len - 1] != b'\n') && self.len < LINE_CAPACITY {
            self.buf[self.len] = b'\n';
            self.len += 1;
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Default for LineBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for LineBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_bytes(s.as_bytes());
        Ok(())
    }
}

/// Format one complete diagnostic line.
pub fn format_line(line: &mut LineBuf, args: fmt::Arguments<'_>) {
    line.push_bytes(PREFIX.as_bytes());
    // Truncation is the only failure mode and it is already handled.
    let _ = line.write_fmt(args);
    line.finish();
}

/// Write one diagnostic line to stderr.
pub fn emit(args: fmt::Arguments<'_>) {
    let mut line = LineBuf::new();
    format_line(&mut line, args);
    let bytes = line.as_bytes();
    // SAFETY: `bytes` is a live stack buffer of the given length.
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}

/// Write one diagnostic line and abort the process.
pub fn fatal(args: fmt::Arguments<'_>) -> ! {
    emit(args);
    // SAFETY: abort has no preconditions.
    unsafe { libc::abort() }
}

/// `diag!("fmt", args..)` writes one prefixed line to stderr without
/// allocating.
macro_rules! diag {
    ($($arg:tt)*) => {
        $crate::diag::emit(::core::format_args!($($arg)*))
    };
}
