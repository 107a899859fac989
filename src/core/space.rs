//! Bounding box gate and coordinate normalization.
//!
//! Geotagged posts outside the monitored area are dropped. Posts inside are
//! moved into a box-relative space where both axes share one scale factor,
//! so Euclidean distances in that space are isotropic.

use crate::config::SpaceConfig;
use crate::error::ConfigError;
use crate::ingest::{Point, Post};
use serde::{Deserialize, Serialize};

/// A closed longitude/latitude rectangle with a normalized coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpaceBoundingBox {
    pub min_longitude: f64,
    pub min_latitude: f64,
    pub max_longitude: f64,
    pub max_latitude: f64,
    pub scale: f64,
}

impl SpaceBoundingBox {
    pub fn new(min: Point, max: Point, scale: f64) -> Self {
        Self {
            min_longitude: min.longitude,
            min_latitude: min.latitude,
            max_longitude: max.longitude,
            max_latitude: max.latitude,
            scale,
        }
    }

    pub fn from_config(config: &SpaceConfig) -> Result<Self, ConfigError> {
        match config.bounding_box.as_slice() {
            [min_lon, min_lat, max_lon, max_lat] => Ok(Self::new(
                Point::new(*min_lon, *min_lat),
                Point::new(*max_lon, *max_lat),
                config.scale,
            )),
            other => Err(ConfigError::invalid(
                "space.bounding_box",
                format!("expected 4 values, got {}", other.len()),
            )),
        }
    }

    /// Whether the point lies in the box; edges count as inside.
    pub fn contains(&self, point: &Point) -> bool {
        (self.min_longitude..=self.max_longitude).contains(&point.longitude)
            && (self.min_latitude..=self.max_latitude).contains(&point.latitude)
    }

    /// Longer of the two sides, in degrees.
    fn span(&self) -> f64 {
        (self.max_longitude - self.min_longitude).max(self.max_latitude - self.min_latitude)
    }

    /// Map a geographic point into normalized space.
    ///
    /// The south-west corner maps to the origin and the longer side maps to
    /// `[0, scale]`.
    pub fn normalize(&self, point: &Point) -> Point {
        let factor = self.scale / self.span();
        Point::new(
            (point.longitude - self.min_longitude) * factor,
            (point.latitude - self.min_latitude) * factor,
        )
    }

    /// Inverse of [`normalize`](Self::normalize).
    pub fn restore(&self, point: &Point) -> Point {
        let factor = self.span() / self.scale;
        Point::new(
            point.longitude * factor + self.min_longitude,
            point.latitude * factor + self.min_latitude,
        )
    }
}

/// Gate applied to every post before it enters a snapshot.
#[derive(Debug, Clone)]
pub struct SpatialFilter {
    space: SpaceBoundingBox,
}

impl SpatialFilter {
    pub fn new(space: SpaceBoundingBox) -> Self {
        Self { space }
    }

    pub fn space(&self) -> &SpaceBoundingBox {
        &self.space
    }

    /// Gate and normalize a post.
    ///
    /// Posts awaiting location prediction pass through unchanged. Geotagged
    /// posts outside the box yield `None`; those inside come back with
    /// normalized coordinates.
    pub fn normalize(&self, mut post: Post) -> Option<Post> {
        if post.needs_location_prediction {
            return Some(post);
        }
        let point = post.coordinates()?;
        if !self.space.contains(&point) {
            return None;
        }
        post.relocate(self.space.normalize(&point));
        Some(post)
    }
}
