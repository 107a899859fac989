//! Post and coordinate types shared by every pipeline stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unique post identifier.
pub type PostId = u64;

/// Author identifier.
pub type AuthorId = u64;

/// A coordinate pair.
///
/// Raw posts carry geographic degrees. Once a post passes the spatial
/// filter its point lives in the bounding box's normalized space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub longitude: f64,
    pub latitude: f64,
}

impl Point {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.longitude - other.longitude;
        let dy = self.latitude - other.latitude;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A single geotagged (or geotag-less) post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: PostId,
    /// Author of the post
    pub author: AuthorId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Terms extracted from the post content
    pub terms: BTreeSet<String>,
    /// Whether the location must be inferred from similar posts
    pub needs_location_prediction: bool,
    coordinates: Option<Point>,
}

impl Post {
    /// Create a post with known coordinates.
    pub fn geotagged(
        id: PostId,
        author: AuthorId,
        created_at: DateTime<Utc>,
        terms: BTreeSet<String>,
        point: Point,
    ) -> Self {
        Self {
            id,
            author,
            created_at,
            terms,
            needs_location_prediction: false,
            coordinates: Some(point),
        }
    }

    /// Create a post whose location has to be predicted.
    pub fn unlocated(
        id: PostId,
        author: AuthorId,
        created_at: DateTime<Utc>,
        terms: BTreeSet<String>,
    ) -> Self {
        Self {
            id,
            author,
            created_at,
            terms,
            needs_location_prediction: true,
            coordinates: None,
        }
    }

    pub fn coordinates(&self) -> Option<Point> {
        self.coordinates
    }

    pub fn has_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }

    /// Replace the coordinates of a geotagged post (spatial normalization).
    pub(crate) fn relocate(&mut self, point: Point) {
        self.coordinates = Some(point);
    }

    /// Assign an inferred location.
    ///
    /// Returns `false` and leaves the post untouched if it already has
    /// coordinates; a prediction is written at most once.
    pub fn assign_predicted(&mut self, point: Point) -> bool {
        if self.coordinates.is_some() {
            return false;
        }
        self.coordinates = Some(point);
        true
    }
}
