//! The per-slice accumulator.
//!
//! A [`Snapshot`] gathers every post of one time slice together with the
//! term and author indices the later stages read. It is reused across
//! slices: [`Snapshot::reset`] clears it in one step and moves it to the
//! next index.

use crate::core::windowing::SnapshotSummary;
use crate::error::{EngineError, EngineResult};
use crate::ingest::{AuthorId, Post, PostId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A term flagged as bursty, with the score that put it over the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstyTerm {
    pub term: String,
    pub score: f64,
}

/// Bursty terms of one snapshot, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurstyTermSet {
    terms: Vec<BurstyTerm>,
}

impl BurstyTermSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a term; a term already present keeps its first score.
    pub fn insert(&mut self, term: impl Into<String>, score: f64) {
        let term = term.into();
        if !self.contains(&term) {
            self.terms.push(BurstyTerm { term, score });
        }
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.iter().any(|t| t.term == term)
    }

    pub fn score(&self, term: &str) -> Option<f64> {
        self.terms.iter().find(|t| t.term == term).map(|t| t.score)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BurstyTerm> {
        self.terms.iter()
    }

    /// Term strings in discovery order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.term.as_str())
    }
}

/// Posts and indices of one time slice.
#[derive(Debug, Clone)]
pub struct Snapshot {
    index: u64,
    posts: HashMap<PostId, Post>,
    word_posts: BTreeMap<String, BTreeSet<PostId>>,
    author_posts: HashMap<AuthorId, BTreeSet<PostId>>,
    bursty_terms: BurstyTermSet,
    word_index: HashMap<String, usize>,
}

impl Snapshot {
    /// Create an empty snapshot with the given index.
    pub fn new(index: u64) -> Self {
        Self {
            index,
            posts: HashMap::new(),
            word_posts: BTreeMap::new(),
            author_posts: HashMap::new(),
            bursty_terms: BurstyTermSet::new(),
            word_index: HashMap::new(),
        }
    }

    /// Get the snapshot index.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Register a post in the post map, the term index and the author index.
    ///
    /// A post whose id is already present replaces the earlier one.
    pub fn collect(&mut self, post: Post) {
        if let Some(previous) = self.posts.remove(&post.id) {
            self.unindex(&previous);
        }

        for term in &post.terms {
            self.word_posts
                .entry(term.clone())
                .or_default()
                .insert(post.id);
        }
        self.author_posts
            .entry(post.author)
            .or_default()
            .insert(post.id);
        self.posts.insert(post.id, post);
    }

    fn unindex(&mut self, post: &Post) {
        for term in &post.terms {
            if let Some(ids) = self.word_posts.get_mut(term) {
                ids.remove(&post.id);
                if ids.is_empty() {
                    self.word_posts.remove(term);
                }
            }
        }
        if let Some(ids) = self.author_posts.get_mut(&post.author) {
            ids.remove(&post.id);
            if ids.is_empty() {
                self.author_posts.remove(&post.author);
            }
        }
    }

    /// Clear every mapping and move to `new_index`, which must be the next index.
    pub fn reset(&mut self, new_index: u64) -> EngineResult<()> {
        self.check_next(new_index)?;
        self.posts.clear();
        self.word_posts.clear();
        self.author_posts.clear();
        self.bursty_terms = BurstyTermSet::new();
        self.word_index.clear();
        self.index = new_index;
        Ok(())
    }

    /// Move to the next index without clearing anything.
    pub(crate) fn advance_index(&mut self) {
        self.index += 1;
    }

    fn check_next(&self, new_index: u64) -> EngineResult<()> {
        if new_index != self.index + 1 {
            return Err(EngineError::IndexDiscontinuity {
                from: self.index,
                to: new_index,
            });
        }
        Ok(())
    }

    /// Set the bursty terms and drop any stale word index map.
    pub fn set_bursty_terms(&mut self, bursty_terms: BurstyTermSet) {
        self.bursty_terms = bursty_terms;
        self.word_index.clear();
    }

    /// Get the bursty terms of this snapshot.
    pub fn bursty_terms(&self) -> &BurstyTermSet {
        &self.bursty_terms
    }

    /// Give every bursty term a dense index in discovery order.
    pub fn generate_word_index_map(&mut self) -> EngineResult<()> {
        if self.bursty_terms.is_empty() {
            return Err(EngineError::BurstyTermsUnset(self.index));
        }
        self.word_index = self
            .bursty_terms
            .terms()
            .enumerate()
            .map(|(i, term)| (term.to_string(), i))
            .collect();
        Ok(())
    }

    /// Get the dense index of a bursty term.
    pub fn word_index(&self, term: &str) -> Option<usize> {
        self.word_index.get(term).copied()
    }

    /// Get the size of the word index map.
    pub fn word_index_len(&self) -> usize {
        self.word_index.len()
    }

    /// Get a post by id.
    pub fn post(&self, id: PostId) -> Option<&Post> {
        self.posts.get(&id)
    }

    /// Get a post by id for updating.
    pub fn post_mut(&mut self, id: PostId) -> Option<&mut Post> {
        self.posts.get_mut(&id)
    }

    /// Iterate over posts in no particular order.
    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.values()
    }

    /// Post ids in ascending order.
    pub fn post_ids(&self) -> Vec<PostId> {
        let mut ids: Vec<PostId> = self.posts.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Term index, ordered by term.
    pub fn word_posts(&self) -> &BTreeMap<String, BTreeSet<PostId>> {
        &self.word_posts
    }

    /// Get the ids of posts containing `term`.
    pub fn posts_with_term(&self, term: &str) -> Option<&BTreeSet<PostId>> {
        self.word_posts.get(term)
    }

    /// Number of posts containing `term`.
    pub fn term_count(&self, term: &str) -> usize {
        self.word_posts.get(term).map_or(0, BTreeSet::len)
    }

    /// Get the ids of posts by `author`.
    pub fn posts_by_author(&self, author: AuthorId) -> Option<&BTreeSet<PostId>> {
        self.author_posts.get(&author)
    }

    /// Get the number of posts.
    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    /// Get the number of distinct authors.
    pub fn author_count(&self) -> usize {
        self.author_posts.len()
    }

    /// Check if no post has been collected.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Compact description for the sliding window.
    pub fn summary(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SnapshotSummary {
        SnapshotSummary {
            index: self.index,
            start,
            end,
            post_count: self.posts.len(),
            author_count: self.author_posts.len(),
            geotagged_count: self.posts.values().filter(|p| p.has_coordinates()).count(),
            bursty_terms: self.bursty_terms.terms().map(str::to_string).collect(),
        }
    }
}
