//! Configuration for the event detection engine.

use crate::error::ConfigError;
use crate::ingest::PostParser;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Duration of each snapshot (time slice)
    #[serde(with = "duration_serde")]
    pub snapshot_interval: Duration,

    /// Start of the first snapshot
    pub start_time: String,

    /// Timezone used for timestamps without an offset
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Number of snapshots in a term's rolling history (warm-up length)
    pub sequence_length: usize,

    /// Number of snapshot summaries kept in the sliding window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    #[serde(default)]
    pub space: SpaceConfig,

    #[serde(default)]
    pub burst: BurstConfig,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// What to do when an evaluated snapshot has no bursty terms
    #[serde(default)]
    pub no_burst_policy: NoBurstPolicy,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_window_size() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_secs(3600),
            start_time: "2017-08-26 00:00:00".to_string(),
            timezone: default_timezone(),
            sequence_length: 8,
            window_size: default_window_size(),
            space: SpaceConfig::default(),
            burst: BurstConfig::default(),
            similarity: SimilarityConfig::default(),
            clustering: ClusteringConfig::default(),
            output: OutputConfig::default(),
            no_burst_policy: NoBurstPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load and validate configuration from `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the default configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("geo-event-detector")
            .join("config.json")
    }

    /// Parsed timezone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::invalid("timezone", e.to_string()))
    }

    /// Parsed start of the first snapshot.
    pub fn start_time(&self) -> Result<DateTime<Utc>, ConfigError> {
        PostParser::new(self.timezone()?)
            .parse_timestamp(&self.start_time)
            .map_err(|e| ConfigError::invalid("start_time", e.to_string()))
    }

    /// Check every field, reporting the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_interval.as_secs() == 0 {
            return Err(ConfigError::invalid(
                "snapshot_interval",
                "must be at least one second",
            ));
        }
        self.start_time()?;
        if self.sequence_length == 0 {
            return Err(ConfigError::invalid("sequence_length", "must be at least 1"));
        }
        if self.window_size == 0 {
            return Err(ConfigError::invalid("window_size", "must be at least 1"));
        }
        self.space.validate()?;
        if !self.burst.threshold.is_finite() {
            return Err(ConfigError::invalid("burst.threshold", "must be finite"));
        }
        self.similarity.validate()?;
        self.clustering.validate()?;
        if self.output.precision > 15 {
            return Err(ConfigError::invalid("output.precision", "must be at most 15"));
        }
        Ok(())
    }
}

/// Bounding box of the monitored area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceConfig {
    /// `[min_longitude, min_latitude, max_longitude, max_latitude]`
    pub bounding_box: Vec<f64>,
    /// Size of the normalized coordinate space along the longer side
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for SpaceConfig {
    fn default() -> Self {
        // Greater Houston
        Self {
            bounding_box: vec![-95.8, 29.5, -95.0, 30.1],
            scale: default_scale(),
        }
    }
}

impl SpaceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let [min_lon, min_lat, max_lon, max_lat] = match self.bounding_box.as_slice() {
            [a, b, c, d] => [*a, *b, *c, *d],
            other => {
                return Err(ConfigError::invalid(
                    "space.bounding_box",
                    format!("expected 4 values, got {}", other.len()),
                ))
            }
        };
        if !(min_lon < max_lon && min_lat < max_lat) {
            return Err(ConfigError::invalid(
                "space.bounding_box",
                "minimum corner must be below and left of maximum corner",
            ));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ConfigError::invalid("space.scale", "must be positive"));
        }
        Ok(())
    }
}

/// Burst detection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstConfig {
    /// A term is bursty when its score exceeds this value
    pub threshold: f64,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self { threshold: 3.0 }
    }
}

/// Similarity graph parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// GloVe-style term vectors; overlap-only weighting when absent
    #[serde(default)]
    pub embedding_path: Option<PathBuf>,
    /// Share of the edge weight taken from embedding cosine similarity
    #[serde(default = "default_embedding_weight")]
    pub embedding_weight: f64,
    /// Edges lighter than this are dropped
    #[serde(default)]
    pub min_weight: f64,
}

fn default_embedding_weight() -> f64 {
    0.3
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            embedding_path: None,
            embedding_weight: default_embedding_weight(),
            min_weight: 0.0,
        }
    }
}

impl SimilarityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.embedding_weight) {
            return Err(ConfigError::invalid(
                "similarity.embedding_weight",
                "must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_weight) {
            return Err(ConfigError::invalid(
                "similarity.min_weight",
                "must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// DBSCAN parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Neighborhood radius in normalized coordinates
    pub eps: f64,
    /// Minimum neighborhood size (the point itself included) of a core point
    pub min_pts: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            eps: 0.02,
            min_pts: 3,
        }
    }
}

impl ClusteringConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(ConfigError::invalid("clustering.eps", "must be positive"));
        }
        if self.min_pts == 0 {
            return Err(ConfigError::invalid("clustering.min_pts", "must be at least 1"));
        }
        Ok(())
    }
}

/// Output format for cluster reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One `lon lat label` line per clustered post
    #[default]
    Text,
    /// One JSON report per snapshot
    Json,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Decimal places for emitted coordinates
    #[serde(default = "default_precision")]
    pub precision: usize,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_precision() -> usize {
    6
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            format: OutputFormat::default(),
        }
    }
}

/// Handling of an evaluated snapshot that yields no bursty terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoBurstPolicy {
    /// Slide the window and reset the snapshot like any other rollover
    #[default]
    Rollover,
    /// Advance index and start time only; keep the accumulated posts and
    /// drop the post that triggered the rollover
    CarryOver,
}

/// Serde support for Duration as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
