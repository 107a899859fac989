//! Run counters for the detection pipeline.
//!
//! Counters are atomics so the reader thread and the engine thread can
//! both update them without coordination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one run of the pipeline.
#[derive(Debug)]
pub struct PipelineStats {
    /// Non-empty input records seen
    records_read: AtomicU64,
    /// Records that failed to parse
    malformed_records: AtomicU64,
    /// Geotagged posts outside the bounding box
    out_of_bounds: AtomicU64,
    /// Posts collected into a snapshot
    posts_collected: AtomicU64,
    /// Snapshots that reached a rollover
    snapshots_completed: AtomicU64,
    /// Evaluated snapshots with at least one bursty term
    bursty_snapshots: AtomicU64,
    /// Evaluated snapshots without bursty terms
    quiet_snapshots: AtomicU64,
    /// Posts that received a predicted location
    predicted_locations: AtomicU64,
    /// Posts left without a location after prediction
    unlocated_posts: AtomicU64,
    /// Posts emitted in cluster output
    clustered_posts: AtomicU64,
    /// Run start time
    run_start: DateTime<Utc>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            records_read: AtomicU64::new(0),
            malformed_records: AtomicU64::new(0),
            out_of_bounds: AtomicU64::new(0),
            posts_collected: AtomicU64::new(0),
            snapshots_completed: AtomicU64::new(0),
            bursty_snapshots: AtomicU64::new(0),
            quiet_snapshots: AtomicU64::new(0),
            predicted_locations: AtomicU64::new(0),
            unlocated_posts: AtomicU64::new(0),
            clustered_posts: AtomicU64::new(0),
            run_start: Utc::now(),
        }
    }

    pub fn record_read(&self) {
        self.records_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out_of_bounds(&self) {
        self.out_of_bounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collected(&self) {
        self.posts_collected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_completed(&self) {
        self.snapshots_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bursty_snapshot(&self) {
        self.bursty_snapshots.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quiet_snapshot(&self) {
        self.quiet_snapshots.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_predictions(&self, predicted: u64, unlocated: u64) {
        self.predicted_locations
            .fetch_add(predicted, Ordering::Relaxed);
        self.unlocated_posts.fetch_add(unlocated, Ordering::Relaxed);
    }

    pub fn record_clustered(&self, count: u64) {
        self.clustered_posts.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_read: self.records_read.load(Ordering::Relaxed),
            malformed_records: self.malformed_records.load(Ordering::Relaxed),
            out_of_bounds: self.out_of_bounds.load(Ordering::Relaxed),
            posts_collected: self.posts_collected.load(Ordering::Relaxed),
            snapshots_completed: self.snapshots_completed.load(Ordering::Relaxed),
            bursty_snapshots: self.bursty_snapshots.load(Ordering::Relaxed),
            quiet_snapshots: self.quiet_snapshots.load(Ordering::Relaxed),
            predicted_locations: self.predicted_locations.load(Ordering::Relaxed),
            unlocated_posts: self.unlocated_posts.load(Ordering::Relaxed),
            clustered_posts: self.clustered_posts.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Records read: {}\n\
             - Malformed records skipped: {}\n\
             - Posts outside bounding box: {}\n\
             - Posts collected: {}\n\
             - Snapshots completed: {} ({} bursty, {} quiet)\n\
             - Locations predicted: {} ({} left unlocated)\n\
             - Clustered posts emitted: {}\n\
             - Run duration: {} seconds",
            stats.records_read,
            stats.malformed_records,
            stats.out_of_bounds,
            stats.posts_collected,
            stats.snapshots_completed,
            stats.bursty_snapshots,
            stats.quiet_snapshots,
            stats.predicted_locations,
            stats.unlocated_posts,
            stats.clustered_posts,
            stats.run_duration_secs
        )
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub records_read: u64,
    pub malformed_records: u64,
    pub out_of_bounds: u64,
    pub posts_collected: u64,
    pub snapshots_completed: u64,
    pub bursty_snapshots: u64,
    pub quiet_snapshots: u64,
    pub predicted_locations: u64,
    pub unlocated_posts: u64,
    pub clustered_posts: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}

/// Thread-safe shared counters.
pub type SharedPipelineStats = Arc<PipelineStats>;

/// Create a new set of shared counters.
pub fn create_shared_stats() -> SharedPipelineStats {
    Arc::new(PipelineStats::new())
}
