//! Growable byte stream with a capped retained tail.
//!
//! A `StreamBuf` accumulates everything a child ever wrote while keeping only
//! a bounded tail in memory. Positions handed to callers are *absolute*
//! (bytes since the stream began), so slices stay meaningful after the front
//! of the buffer has been dropped.
//!
//! Invariant: `dropped + data.len()` equals the total bytes ever appended.

use shrimp_core::config::MIN_RETAINED_TAIL_BYTES;

#[derive(Debug)]
pub struct StreamBuf {
    /// Bytes no longer retained (trimmed from the front or excised).
    dropped: u64,
    /// The retained tail.
    data: Vec<u8>,
    /// Maximum retained tail length.
    cap: usize,
}

impl StreamBuf {
    /// Create a buffer with the given retention cap (floored at 2,000 bytes).
    pub fn new(cap: usize) -> Self {
        Self {
            dropped: 0,
            data: Vec::new(),
            cap: cap.max(MIN_RETAINED_TAIL_BYTES),
        }
    }

    /// Append bytes, trimming the oldest data past the retention cap.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        if self.data.len() > self.cap {
            let excess = self.data.len() - self.cap;
            self.data.drain(..excess);
            self.dropped += excess as u64;
        }
    }

    /// Absolute position: total bytes ever appended.
    pub fn position(&self) -> u64 {
        self.dropped + self.data.len() as u64
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// The retained tail.
    pub fn retained(&self) -> &[u8] {
        &self.data
    }

    /// Slice from an absolute position to the current end. Positions that
    /// fell off the retention window clamp to the window start.
    pub fn slice_from(&self, abs: u64) -> &[u8] {
        self.slice_range(abs, self.position())
    }

    /// Slice between two absolute positions, clamped to the retained window.
    pub fn slice_range(&self, from: u64, to: u64) -> &[u8] {
        let start = from.saturating_sub(self.dropped).min(self.data.len() as u64) as usize;
        let end = to.saturating_sub(self.dropped).min(self.data.len() as u64) as usize;
        if start >= end {
            &[]
        } else {
            &self.data[start..end]
        }
    }

    /// Remove an absolute range from the retained window (sentinel excision).
    /// Removed bytes are accounted as dropped so absolute positions keep
    /// matching the total ever appended.
    pub fn excise(&mut self, from: u64, to: u64) {
        let start = from.saturating_sub(self.dropped).min(self.data.len() as u64) as usize;
        let end = to.saturating_sub(self.dropped).min(self.data.len() as u64) as usize;
        if start < end {
            self.data.drain(start..end);
            self.dropped += (end - start) as u64;
        }
    }
}
