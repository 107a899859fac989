//! Rolling per-term frequency history and burst detection.
//!
//! Every tracked term keeps the number of posts containing it in each of the
//! last H snapshots. A term is bursty in the current snapshot when its count
//! stands out against the trailing H-1 counts before it:
//!
//! ```text
//! score = (c - μ) / max(σ, sqrt(max(μ, 1)))
//! ```
//!
//! where `μ` and `σ` are the population mean and standard deviation of the
//! prior counts. The `sqrt(μ)` floor is the Poisson noise level, which keeps
//! a flat history from turning every small change into a burst.

use crate::core::snapshot::{BurstyTermSet, Snapshot};
use statrs::statistics::Statistics;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Fixed-capacity FIFO of per-snapshot counts for one term.
#[derive(Debug, Clone, PartialEq)]
pub struct WordHistoryEntry {
    capacity: usize,
    counts: VecDeque<u32>,
}

impl WordHistoryEntry {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            counts: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a count, evicting the oldest once the entry is full.
    pub fn push(&mut self, count: u32) {
        if self.counts.len() == self.capacity {
            self.counts.pop_front();
        }
        self.counts.push_back(count);
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Counts from oldest to newest.
    pub fn counts(&self) -> impl Iterator<Item = u32> + '_ {
        self.counts.iter().copied()
    }

    /// The newest `n` counts, oldest first.
    fn trailing(&self, n: usize) -> impl Iterator<Item = u32> + '_ {
        self.counts
            .iter()
            .skip(self.counts.len().saturating_sub(n))
            .copied()
    }

    fn is_all_zero(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }
}

/// Burst score of `current` against the prior counts.
pub fn burst_score(prior: &[f64], current: f64) -> f64 {
    let (mean, std_dev) = if prior.is_empty() {
        (0.0, 0.0)
    } else {
        (prior.iter().mean(), prior.iter().population_std_dev())
    };
    let floor = mean.max(1.0).sqrt();
    (current - mean) / std_dev.max(floor)
}

/// Rolling history of every term seen in the last H snapshots.
#[derive(Debug, Clone)]
pub struct WordHistoryTracker {
    history_length: usize,
    threshold: f64,
    entries: HashMap<String, WordHistoryEntry>,
    recorded_snapshots: usize,
}

impl WordHistoryTracker {
    /// Create a tracker keeping `history_length` counts per term.
    pub fn new(history_length: usize, threshold: f64) -> Self {
        Self {
            history_length: history_length.max(1),
            threshold,
            entries: HashMap::new(),
            recorded_snapshots: 0,
        }
    }

    pub fn history_length(&self) -> usize {
        self.history_length
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Number of snapshots recorded so far.
    pub fn recorded_snapshots(&self) -> usize {
        self.recorded_snapshots
    }

    /// Whether H snapshots have been recorded and bursts can be evaluated.
    pub fn is_warm(&self) -> bool {
        self.recorded_snapshots >= self.history_length
    }

    pub fn entry(&self, term: &str) -> Option<&WordHistoryEntry> {
        self.entries.get(term)
    }

    pub fn tracked_terms(&self) -> usize {
        self.entries.len()
    }

    /// Append this snapshot's counts to every term's history.
    ///
    /// Tracked terms absent from the snapshot get a zero. Terms whose whole
    /// retained history is zero are dropped.
    pub fn record(&mut self, snapshot: &Snapshot) {
        let word_posts = snapshot.word_posts();
        for (term, entry) in self.entries.iter_mut() {
            if !word_posts.contains_key(term) {
                entry.push(0);
            }
        }
        for (term, posts) in word_posts {
            let count = u32::try_from(posts.len()).unwrap_or(u32::MAX);
            self.entries
                .entry(term.clone())
                .or_insert_with(|| WordHistoryEntry::new(self.history_length))
                .push(count);
        }
        self.entries.retain(|_, entry| !entry.is_all_zero());
        self.recorded_snapshots += 1;
    }

    /// Record a snapshot during warm-up, without evaluating bursts.
    pub fn warmup(&mut self, snapshot: &Snapshot) {
        self.record(snapshot);
        debug!(
            snapshot = snapshot.index(),
            recorded = self.recorded_snapshots,
            tracked_terms = self.entries.len(),
            "warm-up snapshot recorded"
        );
    }

    /// Score of a term whose count in the current snapshot is `current`.
    ///
    /// Uses only the trailing H-1 recorded counts.
    pub fn score(&self, term: &str, current: usize) -> f64 {
        let prior: Vec<f64> = self
            .entries
            .get(term)
            .map(|entry| {
                entry
                    .trailing(self.history_length - 1)
                    .map(f64::from)
                    .collect()
            })
            .unwrap_or_default();
        burst_score(&prior, current as f64)
    }

    /// Evaluate the snapshot's terms and record it.
    ///
    /// Returns `None` during warm-up or when no term exceeds the threshold.
    pub fn detect_bursts(&mut self, snapshot: &Snapshot) -> Option<BurstyTermSet> {
        if !self.is_warm() {
            debug!(
                snapshot = snapshot.index(),
                "burst detection skipped during warm-up"
            );
            return None;
        }

        let mut bursty = BurstyTermSet::new();
        for (term, posts) in snapshot.word_posts() {
            let score = self.score(term, posts.len());
            if score > self.threshold {
                bursty.insert(term.clone(), score);
            }
        }
        self.record(snapshot);

        debug!(
            snapshot = snapshot.index(),
            bursty_terms = bursty.len(),
            "burst detection finished"
        );
        if bursty.is_empty() {
            None
        } else {
            Some(bursty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::post::fixtures::located;

    fn snapshot_with(index: u64, term: &str, count: usize) -> Snapshot {
        let mut snapshot = Snapshot::new(index);
        for i in 0..count {
            snapshot.collect(located(index * 1000 + i as u64, &[term], 0.5, 0.5));
        }
        snapshot
    }

    #[test]
    fn test_entry_evicts_oldest_first() {
        let mut entry = WordHistoryEntry::new(3);
        for count in [1, 2, 3, 4, 5] {
            entry.push(count);
            assert!(entry.len() <= 3);
        }
        assert_eq!(entry.counts().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(entry.trailing(2).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(entry.trailing(10).collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn test_absent_terms_get_zero_slots_and_are_pruned() {
        let mut tracker = WordHistoryTracker::new(2, 3.0);
        tracker.record(&snapshot_with(0, "flood", 2));
        tracker.record(&snapshot_with(1, "fire", 1));

        let flood = tracker.entry("flood").unwrap();
        assert_eq!(flood.counts().collect::<Vec<_>>(), vec![2, 0]);
        assert_eq!(tracker.entry("fire").unwrap().len(), 1);

        tracker.record(&snapshot_with(2, "fire", 1));
        assert!(tracker.entry("flood").is_none());
        assert_eq!(tracker.tracked_terms(), 1);
    }

    #[test]
    fn test_no_bursts_during_warmup() {
        let mut tracker = WordHistoryTracker::new(3, 0.0);
        for index in 0..3 {
            let snapshot = snapshot_with(index, "flood", 50);
            assert!(tracker.detect_bursts(&snapshot).is_none());
            tracker.warmup(&snapshot);
        }
        assert!(tracker.is_warm());
        assert_eq!(tracker.recorded_snapshots(), 3);
    }

    #[test]
    fn test_spike_after_flat_history_is_bursty() {
        let mut tracker = WordHistoryTracker::new(2, 3.0);
        tracker.warmup(&snapshot_with(0, "flood", 1));
        tracker.warmup(&snapshot_with(1, "flood", 1));

        let bursty = tracker.detect_bursts(&snapshot_with(2, "flood", 10)).unwrap();
        assert!(bursty.contains("flood"));
        assert!((bursty.score("flood").unwrap() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_steady_term_is_not_bursty() {
        let mut tracker = WordHistoryTracker::new(3, 3.0);
        for index in 0..3 {
            tracker.warmup(&snapshot_with(index, "traffic", 10));
        }
        assert!(tracker.detect_bursts(&snapshot_with(3, "traffic", 11)).is_none());
        // the evaluated snapshot is still recorded
        assert_eq!(tracker.recorded_snapshots(), 4);
    }

    #[test]
    fn test_score_uses_trailing_prior_counts_only() {
        let mut tracker = WordHistoryTracker::new(2, 3.0);
        tracker.record(&snapshot_with(0, "flood", 100));
        tracker.record(&snapshot_with(1, "flood", 4));
        // only the last H-1 = 1 count (4) is the baseline
        assert!((tracker.score("flood", 6) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_monotonic_in_current_count() {
        let prior = [2.0, 3.0, 4.0, 3.0];
        let mut last = f64::NEG_INFINITY;
        for current in 0..20 {
            let score = burst_score(&prior, current as f64);
            assert!(score > last);
            last = score;
        }
    }

    #[test]
    fn test_unseen_term_scores_its_count() {
        assert_eq!(burst_score(&[], 7.0), 7.0);
    }
}
