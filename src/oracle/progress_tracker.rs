//! Progress tracking for oracle synchronization.
//!
//! `SyncProgressTracker` records which heights received a root during this process
//! lifetime, counts new postings separately from heights found already posted and from
//! empty blocks, and reports gaps between settled heights.

use std::collections::BTreeSet;
use tracing::{info, warn};

/// Service for tracking synchronization progress
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
    /// Cursor value when the session started
    start_height: u64,
    /// The highest height that has a root on the destination chain
    highest_settled_height: u64,
    /// Heights settled in this session, ordered for gap detection
    settled_heights: BTreeSet<u64>,
    /// Roots written by this process
    roots_posted: usize,
    /// Heights found already posted
    roots_already_posted: usize,
    /// Empty-block encounters; the same height counts once per pass
    empty_blocks_skipped: usize,
    /// Failed passes
    failed_iterations: usize,
    /// Height at which we last logged progress
    last_logged_height: u64,
    /// Log every this many settled heights
    log_every: u64,
}

impl SyncProgressTracker {
    /// Create a new progress tracker starting after the given cursor.
    pub fn new(start_height: u64) -> Self {
        Self {
            start_height,
            highest_settled_height: start_height,
            settled_heights: BTreeSet::new(),
            roots_posted: 0,
            roots_already_posted: 0,
            empty_blocks_skipped: 0,
            failed_iterations: 0,
            last_logged_height: start_height,
            log_every: 100,
        }
    }

    fn record_settled(&mut self, height: u64) {
        self.highest_settled_height = self.highest_settled_height.max(height);
        self.settled_heights.insert(height);
    }

    pub fn record_posted(&mut self, height: u64) {
        self.record_settled(height);
        self.roots_posted += 1;
    }

    pub fn record_already_posted(&mut self, height: u64) {
        self.record_settled(height);
        self.roots_already_posted += 1;
    }

    pub fn record_empty(&mut self, _height: u64) {
        self.empty_blocks_skipped += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed_iterations += 1;
    }

    /// Ranges `(a, b)` of settled neighbours with unsettled heights between them.
    pub fn check_for_gaps(&self) -> Vec<(u64, u64)> {
        self.settled_heights
            .iter()
            .zip(self.settled_heights.iter().skip(1))
            .filter(|(a, b)| **b - **a > 1)
            .map(|(a, b)| (*a, *b))
            .collect()
    }

    /// Log progress every `log_every` heights, or always when forced
    pub fn log_progress(&mut self, force: bool) {
        let since_last_log = self
            .highest_settled_height
            .saturating_sub(self.last_logged_height);
        let should_log = force || since_last_log >= self.log_every;

        if should_log && !self.settled_heights.is_empty() {
            info!(
                "Sync progress: {} roots posted, {} already present, up to block {}",
                self.roots_posted, self.roots_already_posted, self.highest_settled_height
            );
            self.last_logged_height = self.highest_settled_height;
        }
    }

    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            start_height: self.start_height,
            highest_settled_height: self.highest_settled_height,
            roots_posted: self.roots_posted,
            roots_already_posted: self.roots_already_posted,
            empty_blocks_skipped: self.empty_blocks_skipped,
            failed_iterations: self.failed_iterations,
            gaps: self.check_for_gaps(),
        }
    }

    /// Warn about every gap between settled heights.
    pub fn report_gaps(&self) {
        let gaps = self.check_for_gaps();
        if gaps.is_empty() {
            return;
        }

        warn!("{} gaps in settled heights", gaps.len());
        for (start, end) in &gaps {
            warn!("Gap detected: no root between blocks {} and {}", start, end);
        }
    }
}

/// Statistics about the sync progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub start_height: u64,
    pub highest_settled_height: u64,
    pub roots_posted: usize,
    pub roots_already_posted: usize,
    pub empty_blocks_skipped: usize,
    pub failed_iterations: usize,
    pub gaps: Vec<(u64, u64)>,
}

impl SyncStats {
    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        format!(
            "Sync from {} to {}: {} roots posted, {} already posted, {} empty blocks, {} failed passes{}",
            self.start_height,
            self.highest_settled_height,
            self.roots_posted,
            self.roots_already_posted,
            self.empty_blocks_skipped,
            self.failed_iterations,
            if self.gaps.is_empty() {
                String::new()
            } else {
                format!(" ({} gaps)", self.gaps.len())
            }
        )
    }
}
