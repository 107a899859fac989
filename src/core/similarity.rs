//! Post-to-post similarity graph over bursty terms.
//!
//! Two posts are connected only if they share at least one bursty term.
//! The base weight is the Jaccard overlap of their bursty-term sets; terms
//! that are not bursty never influence the graph. With an embedding table
//! the weight is blended with the cosine similarity of the posts' mean
//! bursty-term vectors.

use crate::config::SimilarityConfig;
use crate::core::embedding::{cosine_similarity, EmbeddingTable};
use crate::core::snapshot::Snapshot;
use crate::error::ConfigError;
use crate::ingest::{Post, PostId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// How edge weights are computed, fixed at configuration time.
#[derive(Debug, Clone, Default)]
pub enum SimilarityMode {
    /// Jaccard overlap of bursty terms
    #[default]
    OverlapOnly,
    /// `(1 - weight) * overlap + weight * cosine`
    OverlapPlusEmbedding {
        embeddings: Arc<EmbeddingTable>,
        weight: f64,
    },
}

impl SimilarityMode {
    /// Build the mode from configuration, loading the embedding table if one is named.
    pub fn from_config(config: &SimilarityConfig) -> Result<Self, ConfigError> {
        match &config.embedding_path {
            Some(path) => Ok(SimilarityMode::OverlapPlusEmbedding {
                embeddings: Arc::new(EmbeddingTable::load(path)?),
                weight: config.embedding_weight,
            }),
            None => Ok(SimilarityMode::OverlapOnly),
        }
    }
}

/// Sparse, undirected, weighted graph over the posts of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct SimilarityGraph {
    adjacency: BTreeMap<PostId, BTreeMap<PostId, f64>>,
    edge_count: usize,
}

impl SimilarityGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with no edges; no-op if present.
    pub fn add_node(&mut self, id: PostId) {
        self.adjacency.entry(id).or_default();
    }

    /// Connect two posts. Self-edges are ignored.
    pub fn add_edge(&mut self, a: PostId, b: PostId, weight: f64) {
        if a == b {
            return;
        }
        let fresh = self.adjacency.entry(a).or_default().insert(b, weight).is_none();
        self.adjacency.entry(b).or_default().insert(a, weight);
        if fresh {
            self.edge_count += 1;
        }
    }

    /// Check if `id` is a node of the graph.
    pub fn contains_node(&self, id: PostId) -> bool {
        self.adjacency.contains_key(&id)
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Get the number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Get the weight of the edge between `a` and `b`.
    pub fn weight(&self, a: PostId, b: PostId) -> Option<f64> {
        self.adjacency.get(&a).and_then(|n| n.get(&b)).copied()
    }

    /// Neighbors of `id` in ascending id order.
    pub fn neighbors(&self, id: PostId) -> impl Iterator<Item = (PostId, f64)> + '_ {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|n| n.iter().map(|(&other, &w)| (other, w)))
    }

    /// Get the number of neighbors of `id`.
    pub fn degree(&self, id: PostId) -> usize {
        self.adjacency.get(&id).map_or(0, BTreeMap::len)
    }

    /// Iterate over node ids in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = PostId> + '_ {
        self.adjacency.keys().copied()
    }
}

/// Builds a [`SimilarityGraph`] from a snapshot with a word index map.
#[derive(Debug, Clone, Default)]
pub struct SimilarityGraphBuilder {
    mode: SimilarityMode,
    min_weight: f64,
}

impl SimilarityGraphBuilder {
    /// Create a builder; edges lighter than `min_weight` are dropped.
    pub fn new(mode: SimilarityMode, min_weight: f64) -> Self {
        Self { mode, min_weight }
    }

    /// Get the similarity mode.
    pub fn mode(&self) -> &SimilarityMode {
        &self.mode
    }

    /// Build the graph for `snapshot`.
    ///
    /// Every post becomes a node; posts without bursty terms stay isolated.
    pub fn build(&self, snapshot: &Snapshot) -> SimilarityGraph {
        let mut graph = SimilarityGraph::new();
        let mut profiles: BTreeMap<PostId, Vec<usize>> = BTreeMap::new();
        for post in snapshot.posts() {
            graph.add_node(post.id);
            profiles.insert(post.id, bursty_profile(snapshot, post));
        }

        let mut pairs: BTreeSet<(PostId, PostId)> = BTreeSet::new();
        for term in snapshot.bursty_terms().terms() {
            let Some(ids) = snapshot.posts_with_term(term) else {
                continue;
            };
            let ids: Vec<PostId> = ids.iter().copied().collect();
            for (i, &a) in ids.iter().enumerate() {
                for &b in &ids[i + 1..] {
                    pairs.insert((a, b));
                }
            }
        }

        let vectors = self.post_vectors(snapshot);
        for (a, b) in pairs {
            let overlap = jaccard(&profiles[&a], &profiles[&b]);
            if overlap <= 0.0 {
                continue;
            }
            let weight = match (&self.mode, vectors.get(&a), vectors.get(&b)) {
                (SimilarityMode::OverlapPlusEmbedding { weight, .. }, Some(va), Some(vb)) => {
                    let cosine = cosine_similarity(va, vb).clamp(0.0, 1.0);
                    (1.0 - weight) * overlap + weight * cosine
                }
                _ => overlap,
            };
            if weight >= self.min_weight {
                graph.add_edge(a, b, weight);
            }
        }

        debug!(
            snapshot = snapshot.index(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "similarity graph built"
        );
        graph
    }

    /// Mean bursty-term vector per post, empty without embeddings.
    fn post_vectors(&self, snapshot: &Snapshot) -> BTreeMap<PostId, Vec<f64>> {
        let SimilarityMode::OverlapPlusEmbedding { embeddings, .. } = &self.mode else {
            return BTreeMap::new();
        };
        snapshot
            .posts()
            .filter_map(|post| {
                let bursty = post
                    .terms
                    .iter()
                    .map(String::as_str)
                    .filter(|t| snapshot.word_index(t).is_some());
                embeddings.aggregate(bursty).map(|v| (post.id, v))
            })
            .collect()
    }
}

/// Sorted word indices of the post's bursty terms.
fn bursty_profile(snapshot: &Snapshot, post: &Post) -> Vec<usize> {
    let mut profile: Vec<usize> = post
        .terms
        .iter()
        .filter_map(|t| snapshot.word_index(t))
        .collect();
    profile.sort_unstable();
    profile
}

/// Jaccard index of two sorted index lists.
fn jaccard(a: &[usize], b: &[usize]) -> f64 {
    let (mut i, mut j, mut shared) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - shared;
    if union == 0 {
        0.0
    } else {
        shared as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::BurstyTermSet;
    use crate::ingest::post::fixtures::{located, unlocated};

    fn snapshot(posts: Vec<Post>, bursty: &[&str]) -> Snapshot {
        let mut snapshot = Snapshot::new(7);
        for post in posts {
            snapshot.collect(post);
        }
        let mut set = BurstyTermSet::new();
        for term in bursty {
            set.insert(*term, 5.0);
        }
        snapshot.set_bursty_terms(set);
        snapshot.generate_word_index_map().unwrap();
        snapshot
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard(&[0, 1], &[1, 2]), 1.0 / 3.0);
        assert_eq!(jaccard(&[0], &[0]), 1.0);
        assert_eq!(jaccard(&[], &[]), 0.0);
    }

    #[test]
    fn test_graph_is_symmetric_without_self_loops() {
        let snap = snapshot(
            vec![
                located(1, &["flood", "bayou", "rescue"], 0.1, 0.1),
                located(2, &["flood", "rescue"], 0.2, 0.2),
                unlocated(3, &["flood", "shelter"]),
            ],
            &["flood", "rescue", "shelter"],
        );
        let graph = SimilarityGraphBuilder::default().build(&snap);

        for a in graph.nodes() {
            assert!(graph.weight(a, a).is_none());
            for (b, w) in graph.neighbors(a) {
                assert_eq!(graph.weight(b, a), Some(w));
                assert!((0.0..=1.0).contains(&w));
            }
        }
        assert_eq!(graph.edge_count(), 3);
        // {flood, rescue} vs {flood, rescue}
        assert_eq!(graph.weight(1, 2), Some(1.0));
        // {flood, rescue} vs {flood, shelter}
        assert_eq!(graph.weight(1, 3), Some(1.0 / 3.0));
    }

    #[test]
    fn test_posts_without_shared_bursty_terms_are_not_connected() {
        let snap = snapshot(
            vec![
                located(1, &["flood", "downtown", "street", "water"], 0.1, 0.1),
                located(2, &["fire", "downtown", "street", "water"], 0.2, 0.2),
                located(3, &["downtown"], 0.3, 0.3),
            ],
            &["flood", "fire"],
        );
        let graph = SimilarityGraphBuilder::default().build(&snap);

        assert_eq!(graph.edge_count(), 0);
        assert!(graph.weight(1, 2).is_none());
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.degree(3), 0);
    }

    #[test]
    fn test_min_weight_drops_light_edges() {
        let snap = snapshot(
            vec![
                located(1, &["flood", "rescue"], 0.1, 0.1),
                located(2, &["flood", "shelter"], 0.2, 0.2),
            ],
            &["flood", "rescue", "shelter"],
        );
        let graph = SimilarityGraphBuilder::new(SimilarityMode::OverlapOnly, 0.5).build(&snap);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.contains_node(1));
    }

    #[test]
    fn test_embedding_blend() {
        let mut table = EmbeddingTable::new();
        table.insert("flood", vec![1.0, 0.0]);
        table.insert("rescue", vec![1.0, 0.0]);
        table.insert("shelter", vec![0.0, 1.0]);
        let mode = SimilarityMode::OverlapPlusEmbedding {
            embeddings: Arc::new(table),
            weight: 0.5,
        };

        let snap = snapshot(
            vec![
                located(1, &["flood", "rescue"], 0.1, 0.1),
                located(2, &["flood", "shelter"], 0.2, 0.2),
                located(3, &["flood", "unknownword"], 0.3, 0.3),
            ],
            &["flood", "rescue", "shelter", "unknownword"],
        );
        let graph = SimilarityGraphBuilder::new(mode, 0.0).build(&snap);

        // post 1 mean = (1, 0); post 2 mean = (0.5, 0.5); cosine = 1/sqrt(2)
        let expected = 0.5 * (1.0 / 3.0) + 0.5 * std::f64::consts::FRAC_1_SQRT_2;
        assert!((graph.weight(1, 2).unwrap() - expected).abs() < 1e-9);
        // post 3 mean = (1, 0), same direction as post 1
        assert!((graph.weight(1, 3).unwrap() - (0.5 / 3.0 + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_embedding_mode_without_vectors_falls_back_to_overlap() {
        let mode = SimilarityMode::OverlapPlusEmbedding {
            embeddings: Arc::new(EmbeddingTable::new()),
            weight: 0.7,
        };
        let snap = snapshot(
            vec![
                located(1, &["flood", "rescue"], 0.1, 0.1),
                located(2, &["flood", "shelter"], 0.2, 0.2),
            ],
            &["flood", "rescue", "shelter"],
        );
        let graph = SimilarityGraphBuilder::new(mode, 0.0).build(&snap);
        assert_eq!(graph.weight(1, 2), Some(1.0 / 3.0));
    }
}
