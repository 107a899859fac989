//! Error types for the event detection engine.
//!
//! Errors fall into three groups:
//! - [`ConfigError`]: bad or missing configuration, fatal before the stream starts
//! - [`ParseError`]: a single malformed record, recovered by skipping it
//! - [`EngineError`]: a broken engine invariant, fatal

use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    /// A field is present but its value cannot be used.
    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors raised while turning one raw record into a post.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("unrecognized timestamp `{0}`")]
    Timestamp(String),

    #[error("invalid coordinates: {0}")]
    Coordinates(String),
}

/// Engine invariant violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A post is older than the start of the slice being accumulated.
    #[error("post is {elapsed_secs}s before the current slice start")]
    TimeWentBackwards { elapsed_secs: i64 },

    /// The snapshot index was asked to move anywhere but forward by one.
    #[error("snapshot index moved from {from} to {to}")]
    IndexDiscontinuity { from: u64, to: u64 },

    /// The word index map was requested before bursty terms were assigned.
    #[error("bursty terms have not been assigned to snapshot {0}")]
    BurstyTermsUnset(u64),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_message_names_field() {
        let err = ConfigError::invalid("clustering.eps", "must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid value for `clustering.eps`: must be positive"
        );
    }

    #[test]
    fn test_time_went_backwards_message() {
        let err = EngineError::TimeWentBackwards { elapsed_secs: -5 };
        assert!(err.to_string().contains("-5s"));
    }
}
