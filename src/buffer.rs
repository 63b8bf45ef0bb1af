//! Reusable decode staging area.
//!
//! One [`ScratchBuffer`] lives inside each reader and receives every decoded
//! range.  It only grows: when a request exceeds the current length the
//! buffer is resized to `max(needed, round(current * 1.5))`.  Callers never
//! see it by reference; the reader copies out the bytes it hands back.

use log::debug;

use crate::error::{ArchiveError, Result};

#[derive(Debug)]
pub struct ScratchBuffer {
    buf:   Vec<u8>,
    limit: u64,
}

impl ScratchBuffer {
    /// `limit` caps every size ever requested through [`ensure`](Self::ensure).
    pub fn new(limit: u64) -> Self {
        Self { buf: Vec::new(), limit }
    }

    /// Current usable length.  Monotonically non-decreasing.
    pub fn capacity(&self) -> usize { self.buf.len() }

    pub fn limit(&self) -> u64 { self.limit }

    /// Make at least `needed` bytes available and return them.
    ///
    /// `needed` comes straight from archive-declared sizes, so anything above
    /// the limit, or a growth step that overflows, is rejected instead of
    /// being allocated.
    pub fn ensure(&mut self, needed: u64, what: &'static str) -> Result<&mut [u8]> {
        let too_large = || ArchiveError::SizeTooLarge { what, size: needed, limit: self.limit };
        if needed > self.limit {
            return Err(too_large());
        }
        let needed_len = usize::try_from(needed).map_err(|_| too_large())?;

        if needed_len > self.buf.len() {
            let grown = grown_len(self.buf.len()).ok_or_else(too_large)?;
            let new_len = needed_len.max(grown);
            debug!("scratch: growing {} -> {new_len} bytes for {what}", self.buf.len());
            self.buf.resize(new_len, 0);
        }
        Ok(&mut self.buf[..needed_len])
    }

    /// The first `len` bytes, as last written by a decode.
    pub fn filled(&self, len: usize) -> &[u8] {
        &self.buf[..len]
    }
}

/// `round(current * 1.5)`, or `None` when the multiplication overflows.
fn grown_len(current: usize) -> Option<usize> {
    current.checked_mul(3).map(|tripled| tripled / 2 + tripled % 2)
}
