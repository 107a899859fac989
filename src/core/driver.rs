//! The streaming state machine.
//!
//! [`StreamDriver`] consumes posts in arrival order, cuts the stream into
//! fixed-length slices and runs the detection stages on every slice that
//! closes:
//!
//! ```text
//! post ──▶ SpatialFilter ──▶ elapsed < interval? ──yes──▶ Snapshot::collect
//!                                   │ no
//!                                   ▼
//!              WARMUP: WordHistoryTracker::warmup
//!              EVALUATE: detect_bursts ─▶ similarity ─▶ prediction ─▶ DBSCAN ─▶ report
//!                                   │
//!                                   ▼
//!              slide window, reset snapshot, advance slice start, collect post
//! ```

use crate::config::{Config, NoBurstPolicy};
use crate::core::dbscan::EventClusterer;
use crate::core::history::WordHistoryTracker;
use crate::core::location::LocationPredictor;
use crate::core::report::{ClusterReport, ReportBuilder};
use crate::core::similarity::{SimilarityGraphBuilder, SimilarityMode};
use crate::core::snapshot::{BurstyTermSet, Snapshot};
use crate::core::space::{SpaceBoundingBox, SpatialFilter};
use crate::core::windowing::{SlidingWindow, SnapshotSummary};
use crate::error::{ConfigError, EngineError, EngineResult};
use crate::ingest::Post;
use crate::stats::SharedPipelineStats;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

/// Phase of the driver, derived from the current snapshot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Fewer than H snapshots recorded; history only
    Warmup,
    /// Bursts are evaluated at every rollover
    Evaluate,
}

/// Owns all cross-slice state and runs the stages at each rollover.
pub struct StreamDriver {
    filter: SpatialFilter,
    snapshot: Snapshot,
    window: SlidingWindow,
    history: WordHistoryTracker,
    graph_builder: SimilarityGraphBuilder,
    predictor: LocationPredictor,
    clusterer: EventClusterer,
    reports: ReportBuilder,
    stats: SharedPipelineStats,
    slice_start: DateTime<Utc>,
    interval_ms: i64,
    policy: NoBurstPolicy,
}

impl StreamDriver {
    /// Create a driver from a validated configuration.
    pub fn new(
        config: &Config,
        mode: SimilarityMode,
        stats: SharedPipelineStats,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let interval_ms = i64::try_from(config.snapshot_interval.as_millis())
            .map_err(|_| ConfigError::invalid("snapshot_interval", "too large"))?;

        Ok(Self {
            filter: SpatialFilter::new(SpaceBoundingBox::from_config(&config.space)?),
            snapshot: Snapshot::new(0),
            window: SlidingWindow::new(config.window_size),
            history: WordHistoryTracker::new(config.sequence_length, config.burst.threshold),
            graph_builder: SimilarityGraphBuilder::new(mode, config.similarity.min_weight),
            predictor: LocationPredictor::new(),
            clusterer: EventClusterer::from_config(&config.clustering),
            reports: ReportBuilder::new(config.output.precision),
            stats,
            slice_start: config.start_time()?,
            interval_ms,
            policy: config.no_burst_policy,
        })
    }

    /// Get the current phase.
    pub fn state(&self) -> DriverState {
        if self.snapshot.index() < self.history.history_length() as u64 {
            DriverState::Warmup
        } else {
            DriverState::Evaluate
        }
    }

    /// Get the snapshot being filled.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Get the sliding window of completed snapshots.
    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// Get the term history tracker.
    pub fn history(&self) -> &WordHistoryTracker {
        &self.history
    }

    /// Get the start of the current slice.
    pub fn slice_start(&self) -> DateTime<Utc> {
        self.slice_start
    }

    /// Get the exclusive end of the current slice.
    pub fn slice_end(&self) -> DateTime<Utc> {
        self.slice_start + Duration::milliseconds(self.interval_ms)
    }

    /// Get the id stamped on every report of this run.
    pub fn run_id(&self) -> Uuid {
        self.reports.run_id()
    }

    /// Get the number of decimals used for text output.
    pub fn precision(&self) -> usize {
        self.reports.precision()
    }

    /// Feed one post.
    ///
    /// Returns a report when the post closed a slice that produced clusters.
    pub fn process(&mut self, post: Post) -> EngineResult<Option<ClusterReport>> {
        let post_id = post.id;
        let Some(post) = self.filter.normalize(post) else {
            self.stats.record_out_of_bounds();
            debug!(post_id, "post outside bounding box dropped");
            return Ok(None);
        };

        let elapsed_ms = (post.created_at - self.slice_start).num_milliseconds();
        if elapsed_ms < 0 {
            return Err(EngineError::TimeWentBackwards {
                elapsed_secs: elapsed_ms.div_euclid(1000),
            });
        }
        if elapsed_ms < self.interval_ms {
            self.collect(post);
            return Ok(None);
        }

        let steps = elapsed_ms / self.interval_ms;
        let report = match self.state() {
            DriverState::Warmup => {
                self.history.warmup(&self.snapshot);
                None
            }
            DriverState::Evaluate => match self.history.detect_bursts(&self.snapshot) {
                Some(bursty) => Some(self.evaluate(bursty)?),
                None => {
                    self.stats.record_quiet_snapshot();
                    info!(
                        snapshot = self.snapshot.index(),
                        posts = self.snapshot.post_count(),
                        "no bursty terms"
                    );
                    if self.policy == NoBurstPolicy::CarryOver {
                        self.snapshot.advance_index();
                        self.advance_start(steps);
                        self.stats.record_snapshot_completed();
                        debug!(post_id, "triggering post discarded");
                        return Ok(None);
                    }
                    None
                }
            },
        };

        self.roll_over(steps)?;
        self.collect(post);
        Ok(report)
    }

    /// Close the stream. The partial slice in flight is not evaluated.
    pub fn finish(self) -> SnapshotSummary {
        let pending = self.snapshot.summary(self.slice_start, self.slice_end());
        debug!(
            snapshot = pending.index,
            posts = pending.post_count,
            "stream ended with a partial slice"
        );
        pending
    }

    fn collect(&mut self, post: Post) {
        self.snapshot.collect(post);
        self.stats.record_collected();
    }

    /// Similarity, prediction and clustering over the closing snapshot.
    fn evaluate(&mut self, bursty: BurstyTermSet) -> EngineResult<ClusterReport> {
        self.stats.record_bursty_snapshot();
        self.snapshot.set_bursty_terms(bursty);
        self.snapshot.generate_word_index_map()?;

        let graph = self.graph_builder.build(&self.snapshot);
        let outcome = self.predictor.predict(&graph, &mut self.snapshot);
        self.stats.record_predictions(
            outcome.predicted.len() as u64,
            outcome.unresolved.len() as u64,
        );

        let clustered = self.clusterer.cluster_snapshot(&self.snapshot);
        self.stats.record_clustered(clustered.len() as u64);

        let report = self.reports.build(
            &self.snapshot,
            &self.window,
            self.filter.space(),
            (self.slice_start, self.slice_end()),
            &clustered,
        );
        info!(
            snapshot = report.snapshot_index,
            bursty_terms = report.bursty_terms.len(),
            clusters = report.cluster_count,
            noise = report.noise_count,
            "snapshot clustered"
        );
        Ok(report)
    }

    fn roll_over(&mut self, steps: i64) -> EngineResult<()> {
        let summary = self.snapshot.summary(self.slice_start, self.slice_end());
        if let Some(evicted) = self.window.slide(summary) {
            debug!(evicted = evicted.index, "summary left the sliding window");
        }
        self.snapshot.reset(self.snapshot.index() + 1)?;
        self.advance_start(steps);
        self.stats.record_snapshot_completed();
        debug!(
            snapshot = self.snapshot.index(),
            start = %self.slice_start,
            "rolled over to next snapshot"
        );
        Ok(())
    }

    fn advance_start(&mut self, steps: i64) {
        self.slice_start += Duration::milliseconds(steps * self.interval_ms);
    }
}
