//! The streaming event detection engine.
//!
//! This module contains:
//! - Spatial gating and normalization of incoming posts
//! - The per-slice snapshot accumulator and the sliding window of summaries
//! - Term history tracking and burst detection
//! - Similarity graph construction, location prediction and DBSCAN clustering
//! - The driver that ties the stages together, and its reports

pub mod dbscan;
pub mod driver;
pub mod embedding;
pub mod history;
pub mod location;
pub mod report;
pub mod similarity;
pub mod snapshot;
pub mod space;
pub mod windowing;

// Re-export commonly used types
pub use dbscan::{ClusterLabel, ClusteredPost, EventClusterer};
pub use driver::{DriverState, StreamDriver};
pub use embedding::{cosine_similarity, EmbeddingTable};
pub use history::{burst_score, WordHistoryEntry, WordHistoryTracker};
pub use location::{LocationPredictor, PredictionOutcome};
pub use report::{ClusterReport, ReportBuilder, ReportPoint, ReportTerm, PRODUCER_NAME};
pub use similarity::{SimilarityGraph, SimilarityGraphBuilder, SimilarityMode};
pub use snapshot::{BurstyTerm, BurstyTermSet, Snapshot};
pub use space::{SpaceBoundingBox, SpatialFilter};
pub use windowing::{SlidingWindow, SnapshotSummary};
