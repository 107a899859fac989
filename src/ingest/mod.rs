//! Ingestion of raw post records.
//!
//! This module turns lines of JSON into [`Post`]s and feeds them to the
//! engine from a background thread.

pub mod parser;
pub mod post;
pub mod reader;

// Re-export commonly used types
pub use parser::{extract_terms, PostParser};
pub use post::{AuthorId, Point, Post, PostId};
pub use reader::{PostReader, ReaderError};
