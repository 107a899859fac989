//! Run statistics for the detection pipeline.

pub mod counters;

// Re-export commonly used types
pub use counters::{create_shared_stats, PipelineStats, SharedPipelineStats, StatsSnapshot};
