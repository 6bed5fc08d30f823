//! Checkpoint progress for extraction
//!
//! Extraction does not know the total size of the SDK up front, so progress
//! is reported as a growing count of checkpoints (one per [`CHECKPOINT`]
//! bytes extracted) rather than as a percentage.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Bytes of extracted content per progress tick
pub const CHECKPOINT: u64 = 25_600_000;

/// Counts checkpoints crossed by a running byte total
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointCounter {
    bytes: u64,
    reported: u64,
}

impl CheckpointCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `size` bytes and return how many new ticks are due
    pub fn add(&mut self, size: u64) -> u64 {
        self.bytes += size;
        let due = self.bytes / CHECKPOINT - self.reported;
        self.reported += due;
        due
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn checkpoints(&self) -> u64 {
        self.reported
    }
}

/// Progress display for extraction
pub struct ExtractProgress {
    pb: ProgressBar,
}

impl ExtractProgress {
    /// Create a progress display drawn on stderr
    pub fn new() -> Self {
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos:.cyan} checkpoints, {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        pb.set_style(style);
        Self { pb }
    }

    /// A display that draws nothing
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    /// Advance by `ticks` checkpoints
    pub fn tick(&self, ticks: u64, bytes: u64) {
        self.pb.inc(ticks);
        self.pb.set_message(format!("{} MB", bytes / 1_000_000));
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    /// Abandon on error
    pub fn abandon(&self) {
        self.pb.abandon();
    }
}

impl Default for ExtractProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_independent_of_entry_count() {
        let mut one = CheckpointCounter::new();
        assert_eq!(one.add(2 * CHECKPOINT), 2);

        let mut many = CheckpointCounter::new();
        let mut ticks = 0;
        for _ in 0..8 {
            ticks += many.add(CHECKPOINT / 4);
        }
        assert_eq!(ticks, 2);
        assert_eq!(many.checkpoints(), 2);
        assert_eq!(many.bytes(), 2 * CHECKPOINT);
    }

    #[test]
    fn test_no_tick_below_checkpoint() {
        let mut counter = CheckpointCounter::new();
        assert_eq!(counter.add(CHECKPOINT - 1), 0);
        assert_eq!(counter.add(1), 1);
        assert_eq!(counter.add(0), 0);
    }

    #[test]
    fn test_hidden_progress_accepts_ticks() {
        let progress = ExtractProgress::hidden();
        progress.tick(3, 3 * CHECKPOINT);
        progress.finish();
    }
}
