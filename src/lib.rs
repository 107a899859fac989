//! Geo Event Detector - streaming detection of localized events.
//!
//! This library segments a stream of geotagged social-media posts into
//! fixed-length time slices, finds terms whose frequency spikes against
//! their recent history, links posts that share those terms, infers
//! locations for posts without coordinates and clusters the result in
//! space.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Geo Event Detector                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────────┐        │
//! │  │ PostReader  │──▶│  Spatial    │──▶│    Snapshot     │        │
//! │  │  (thread)   │   │  Filter     │   │  (time slice)   │        │
//! │  └─────────────┘   └─────────────┘   └─────────────────┘        │
//! │                                              │ rollover         │
//! │                                              ▼                  │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────────┐        │
//! │  │   DBSCAN    │◀──│  Location   │◀──│  Word history   │        │
//! │  │  clusters   │   │  predictor  │   │ + similarity    │        │
//! │  └─────────────┘   └─────────────┘   └─────────────────┘        │
//! │         │                                                       │
//! │         ▼                                                       │
//! │  ┌─────────────┐   ┌─────────────┐                              │
//! │  │   Cluster   │   │   Sliding   │                              │
//! │  │   report    │   │   window    │                              │
//! │  └─────────────┘   └─────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use geo_event_detector::{create_shared_stats, Config, PostParser, SimilarityMode, StreamDriver};
//!
//! let config = Config::load().expect("configuration");
//! let parser = PostParser::new(config.timezone().expect("timezone"));
//! let mut driver =
//!     StreamDriver::new(&config, SimilarityMode::OverlapOnly, create_shared_stats())
//!         .expect("driver");
//!
//! let line = r#"{"id": 1, "user": {"id": 7}, "created_at": "2017-08-26 00:00:05",
//!               "coordinates": {"coordinates": [-95.36, 29.76]}, "text": "flooding on I-45"}"#;
//! if let Ok(post) = parser.parse_line(line) {
//!     if let Some(report) = driver.process(post).expect("engine") {
//!         print!("{}", report.to_text(driver.precision()));
//!     }
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod ingest;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::{Config, NoBurstPolicy, OutputFormat};
pub use core::{ClusterLabel, ClusterReport, SimilarityMode, StreamDriver};
pub use error::{ConfigError, EngineError, ParseError};
pub use ingest::{Point, Post, PostParser, PostReader};
pub use stats::{create_shared_stats, PipelineStats, SharedPipelineStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
