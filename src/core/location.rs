//! Location inference for posts without coordinates.
//!
//! A post awaiting prediction takes the similarity-weighted centroid of its
//! graph neighbors that were located before the pass started. Posts with no
//! such neighbor stay unlocated and are left out of clustering.

use crate::core::similarity::SimilarityGraph;
use crate::core::snapshot::Snapshot;
use crate::ingest::{Point, PostId};
use std::collections::HashMap;
use tracing::debug;

/// Outcome of one prediction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionOutcome {
    /// Posts that received coordinates
    pub predicted: Vec<PostId>,
    /// Posts left without coordinates
    pub unresolved: Vec<PostId>,
}

/// Weighted-centroid location predictor.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationPredictor;

impl LocationPredictor {
    pub fn new() -> Self {
        Self
    }

    /// Weighted centroid of the located neighbors of `id`.
    fn centroid(
        graph: &SimilarityGraph,
        id: PostId,
        anchors: &HashMap<PostId, Point>,
    ) -> Option<Point> {
        let (mut lon, mut lat, mut total) = (0.0, 0.0, 0.0);
        for (neighbor, weight) in graph.neighbors(id) {
            if let Some(point) = anchors.get(&neighbor) {
                lon += weight * point.longitude;
                lat += weight * point.latitude;
                total += weight;
            }
        }
        (total > 0.0).then(|| Point::new(lon / total, lat / total))
    }

    /// Assign coordinates to every post in `snapshot` awaiting prediction.
    pub fn predict(&self, graph: &SimilarityGraph, snapshot: &mut Snapshot) -> PredictionOutcome {
        let anchors: HashMap<PostId, Point> = snapshot
            .posts()
            .filter_map(|p| p.coordinates().map(|c| (p.id, c)))
            .collect();

        let mut outcome = PredictionOutcome::default();
        for id in snapshot.post_ids() {
            let Some(post) = snapshot.post_mut(id) else {
                continue;
            };
            if !post.needs_location_prediction || post.has_coordinates() {
                continue;
            }
            match Self::centroid(graph, id, &anchors) {
                Some(point) => {
                    post.assign_predicted(point);
                    outcome.predicted.push(id);
                }
                None => outcome.unresolved.push(id),
            }
        }

        debug!(
            snapshot = snapshot.index(),
            predicted = outcome.predicted.len(),
            unresolved = outcome.unresolved.len(),
            "location prediction finished"
        );
        outcome
    }
}
