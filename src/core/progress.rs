//! Operator-facing progress marks.
//!
//! Marks are for people watching a long harvest. Nothing reads them back.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Receives one event per item attempted and one per item yielding records.
pub trait ProgressSink: Send + Sync + 'static {
    /// An item was taken off the queue and processed (successfully or not).
    fn attempted(&self);
    /// An item produced at least one record.
    fn yielded(&self);
}

/// Writes a character stream: `.` per attempt, `|` per productive item.
pub struct MarkStream<W: Write + Send + 'static> {
    out: Mutex<W>,
}

impl MarkStream<io::Stderr> {
    /// Marks on standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send + 'static> MarkStream<W> {
    /// Marks on an arbitrary writer.
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn mark(&self, c: u8) {
        let mut out = self.out.lock();
        // Progress output is best effort.
        let _ = out.write_all(&[c]);
        let _ = out.flush();
    }
}

impl<W: Write + Send + 'static> ProgressSink for MarkStream<W> {
    fn attempted(&self) {
        self.mark(b'.');
    }

    fn yielded(&self) {
        self.mark(b'|');
    }
}

/// Counts events without printing anything.
#[derive(Debug, Default)]
pub struct SilentProgress {
    attempted: AtomicU64,
    yielded: AtomicU64,
}

impl SilentProgress {
    /// Create a counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items attempted so far.
    pub fn attempted_count(&self) -> u64 {
        self.attempted.load(Ordering::Relaxed)
    }

    /// Items that yielded records so far.
    pub fn yielded_count(&self) -> u64 {
        self.yielded.load(Ordering::Relaxed)
    }
}

impl ProgressSink for SilentProgress {
    fn attempted(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    fn yielded(&self) {
        self.yielded.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_stream_characters() {
        let marks = MarkStream::new(Vec::new());
        marks.attempted();
        marks.yielded();
        marks.attempted();
        assert_eq!(marks.into_inner(), b".|.".to_vec());
    }

    #[test]
    fn test_silent_progress_counts() {
        let progress = SilentProgress::new();
        progress.attempted();
        progress.attempted();
        progress.yielded();
        assert_eq!(progress.attempted_count(), 2);
        assert_eq!(progress.yielded_count(), 1);
    }
}
