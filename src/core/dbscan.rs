//! Density-based spatial clustering (DBSCAN) of located posts.
//!
//! Conventions:
//! - a point's neighborhood includes the point itself, and `q` is a
//!   neighbor of `p` iff `distance(p, q) <= eps`
//! - `p` is a core point iff its neighborhood holds at least `min_pts` points
//! - clusters are the connected components of core points
//! - a non-core point within `eps` of a core point joins the cluster of its
//!   nearest core neighbor (ties go to the lower post id); anything else is noise
//!
//! Points are processed in post-id order, so membership does not depend on
//! the order in which posts are handed in.

use crate::config::ClusteringConfig;
use crate::core::snapshot::Snapshot;
use crate::ingest::{Point, PostId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Cluster assignment of one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterLabel {
    Cluster(usize),
    Noise,
}

impl ClusterLabel {
    /// Numeric form: the cluster id, or `-1` for noise.
    pub fn as_i64(&self) -> i64 {
        match self {
            ClusterLabel::Cluster(id) => *id as i64,
            ClusterLabel::Noise => -1,
        }
    }

    pub fn is_noise(&self) -> bool {
        matches!(self, ClusterLabel::Noise)
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

/// A located post with its cluster label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusteredPost {
    pub post_id: PostId,
    pub point: Point,
    pub label: ClusterLabel,
}

/// DBSCAN over normalized coordinates.
#[derive(Debug, Clone, Copy)]
pub struct EventClusterer {
    eps: f64,
    min_pts: usize,
}

impl EventClusterer {
    pub fn new(eps: f64, min_pts: usize) -> Self {
        Self { eps, min_pts }
    }

    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self::new(config.eps, config.min_pts)
    }

    /// Cluster every post of `snapshot` that has coordinates.
    pub fn cluster_snapshot(&self, snapshot: &Snapshot) -> Vec<ClusteredPost> {
        let points = snapshot
            .posts()
            .filter_map(|p| p.coordinates().map(|c| (p.id, c)))
            .collect();
        self.cluster(points)
    }

    /// Cluster the given points; output is sorted by post id.
    pub fn cluster(&self, mut points: Vec<(PostId, Point)>) -> Vec<ClusteredPost> {
        points.sort_by_key(|(id, _)| *id);
        points.dedup_by_key(|(id, _)| *id);

        let neighborhoods: Vec<Vec<usize>> = (0..points.len())
            .map(|i| self.region_query(&points, i))
            .collect();
        let is_core: Vec<bool> = neighborhoods
            .iter()
            .map(|n| n.len() >= self.min_pts)
            .collect();

        let mut labels: Vec<Option<usize>> = vec![None; points.len()];
        let mut next_cluster = 0;

        // Connected components of core points.
        for seed in 0..points.len() {
            if !is_core[seed] || labels[seed].is_some() {
                continue;
            }
            labels[seed] = Some(next_cluster);
            let mut queue = VecDeque::from([seed]);
            while let Some(current) = queue.pop_front() {
                for &neighbor in &neighborhoods[current] {
                    if is_core[neighbor] && labels[neighbor].is_none() {
                        labels[neighbor] = Some(next_cluster);
                        queue.push_back(neighbor);
                    }
                }
            }
            next_cluster += 1;
        }

        // Border points follow their nearest core neighbor.
        for i in 0..points.len() {
            if is_core[i] {
                continue;
            }
            let nearest = neighborhoods[i]
                .iter()
                .filter(|&&j| is_core[j])
                .min_by(|&&a, &&b| {
                    let da = points[i].1.distance(&points[a].1);
                    let db = points[i].1.distance(&points[b].1);
                    da.total_cmp(&db).then(a.cmp(&b))
                });
            let label = nearest.and_then(|&j| labels[j]);
            labels[i] = label;
        }

        points
            .iter()
            .zip(labels)
            .map(|(&(post_id, point), label)| ClusteredPost {
                post_id,
                point,
                label: label.map_or(ClusterLabel::Noise, ClusterLabel::Cluster),
            })
            .collect()
    }

    /// Indices of all points within `eps` of point `i`, itself included.
    fn region_query(&self, points: &[(PostId, Point)], i: usize) -> Vec<usize> {
        let origin = points[i].1;
        points
            .iter()
            .enumerate()
            .filter(|(_, (_, p))| origin.distance(p) <= self.eps)
            .map(|(j, _)| j)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use std::collections::{BTreeMap, BTreeSet};

    fn p(id: PostId, x: f64, y: f64) -> (PostId, Point) {
        (id, Point::new(x, y))
    }

    /// Membership as a set of clusters, each a set of post ids.
    fn partition(result: &[ClusteredPost]) -> BTreeSet<BTreeSet<PostId>> {
        let mut groups: BTreeMap<ClusterLabel, BTreeSet<PostId>> = BTreeMap::new();
        for c in result {
            if !c.label.is_noise() {
                groups.entry(c.label).or_default().insert(c.post_id);
            }
        }
        groups.into_values().collect()
    }

    fn noise(result: &[ClusteredPost]) -> BTreeSet<PostId> {
        result
            .iter()
            .filter(|c| c.label.is_noise())
            .map(|c| c.post_id)
            .collect()
    }

    #[test]
    fn test_pair_below_min_pts_is_noise() {
        let clusterer = EventClusterer::new(0.1, 3);
        let result = clusterer.cluster(vec![p(1, 0.0, 0.0), p(2, 0.05, 0.0)]);
        assert!(result.iter().all(|c| c.label == ClusterLabel::Noise));
    }

    #[test]
    fn test_two_dense_groups_and_noise() {
        let clusterer = EventClusterer::new(0.1, 3);
        let result = clusterer.cluster(vec![
            p(1, 0.0, 0.0),
            p(2, 0.05, 0.0),
            p(3, 0.0, 0.05),
            p(4, 0.8, 0.8),
            p(5, 0.85, 0.8),
            p(6, 0.8, 0.85),
            p(7, 0.4, 0.4),
        ]);

        let expected: BTreeSet<BTreeSet<PostId>> = [
            [1, 2, 3].into_iter().collect(),
            [4, 5, 6].into_iter().collect(),
        ]
        .into_iter()
        .collect();
        assert_eq!(partition(&result), expected);
        assert_eq!(noise(&result), [7].into_iter().collect());
    }

    #[test]
    fn test_eps_boundary_is_inclusive() {
        let clusterer = EventClusterer::new(0.5, 2);
        let result = clusterer.cluster(vec![p(1, 0.0, 0.0), p(2, 0.5, 0.0)]);
        assert_eq!(result[0].label, result[1].label);
        assert!(!result[0].label.is_noise());

        let result = clusterer.cluster(vec![p(1, 0.0, 0.0), p(2, 0.5000001, 0.0)]);
        assert!(result.iter().all(|c| c.label.is_noise()));
    }

    #[test]
    fn test_border_point_joins_nearest_core() {
        // Two chains of four core points; border point 9 sits between
        // them, slightly closer to the left chain.
        let clusterer = EventClusterer::new(1.0, 4);
        let result = clusterer.cluster(vec![
            p(1, 0.0, 0.0),
            p(2, 0.3, 0.0),
            p(3, 0.6, 0.0),
            p(4, 0.9, 0.0),
            p(9, 1.8, 0.0),
            p(5, 2.75, 0.0),
            p(6, 3.05, 0.0),
            p(7, 3.35, 0.0),
            p(8, 3.65, 0.0),
        ]);
        let label_of = |id: PostId| result.iter().find(|c| c.post_id == id).unwrap().label;

        assert!(!label_of(4).is_noise());
        assert_ne!(label_of(4), label_of(5));
        assert_eq!(label_of(9), label_of(4));
    }

    #[test]
    fn test_membership_is_permutation_invariant() {
        let mut points = Vec::new();
        for i in 0..40u64 {
            let x = (i % 7) as f64 * 0.07 + (i / 20) as f64 * 0.5;
            let y = (i % 5) as f64 * 0.06;
            points.push(p(i, x, y));
        }
        let clusterer = EventClusterer::new(0.08, 3);
        let baseline = clusterer.cluster(points.clone());

        let mut rng = rand::rngs::StdRng::seed_from_u64(17);
        for _ in 0..10 {
            points.shuffle(&mut rng);
            let shuffled = clusterer.cluster(points.clone());
            assert_eq!(partition(&shuffled), partition(&baseline));
            assert_eq!(noise(&shuffled), noise(&baseline));
        }
    }

    #[test]
    fn test_label_numeric_form() {
        assert_eq!(ClusterLabel::Cluster(4).as_i64(), 4);
        assert_eq!(ClusterLabel::Noise.to_string(), "-1");
    }
}
