//! Sliding window over recent snapshot summaries.
//!
//! Each completed slice leaves a [`SnapshotSummary`] behind. The
//! [`SlidingWindow`] keeps the most recent N of them so later slices can
//! check whether a burst is recurring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What remains of a snapshot after its rollover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    /// Snapshot index
    pub index: u64,
    /// Start time of the slice
    pub start: DateTime<Utc>,
    /// End time of the slice (exclusive)
    pub end: DateTime<Utc>,
    /// Posts collected in the slice
    pub post_count: usize,
    /// Distinct authors in the slice
    pub author_count: usize,
    /// Posts that had coordinates at rollover
    pub geotagged_count: usize,
    /// Bursty terms of the slice, empty during warm-up
    pub bursty_terms: Vec<String>,
}

impl SnapshotSummary {
    /// Check if a timestamp falls within this slice.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Get the duration of this slice in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }

    pub fn has_bursty_term(&self, term: &str) -> bool {
        self.bursty_terms.iter().any(|t| t == term)
    }
}

/// Fixed-capacity FIFO of snapshot summaries.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    capacity: usize,
    summaries: VecDeque<SnapshotSummary>,
}

impl SlidingWindow {
    /// Create a window holding at most `capacity` summaries.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            summaries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append the newest summary, evicting the oldest beyond capacity.
    ///
    /// Returns the evicted summary, if any.
    pub fn slide(&mut self, summary: SnapshotSummary) -> Option<SnapshotSummary> {
        self.summaries.push_back(summary);
        if self.summaries.len() > self.capacity {
            self.summaries.pop_front()
        } else {
            None
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.summaries.len() == self.capacity
    }

    /// Summaries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotSummary> {
        self.summaries.iter()
    }

    pub fn newest(&self) -> Option<&SnapshotSummary> {
        self.summaries.back()
    }

    pub fn oldest(&self) -> Option<&SnapshotSummary> {
        self.summaries.front()
    }

    /// Number of retained summaries in which `term` was bursty.
    pub fn term_recurrence(&self, term: &str) -> usize {
        self.summaries
            .iter()
            .filter(|s| s.has_bursty_term(term))
            .count()
    }
}
