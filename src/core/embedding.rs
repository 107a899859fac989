//! Term embedding lookup.
//!
//! Vectors are read from GloVe-style text files, one `term v1 v2 ... vd`
//! record per line. The first well-formed line fixes the dimension and
//! later lines of another width are skipped.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// In-memory `term -> vector` table.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingTable {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl EmbeddingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let table = Self::from_reader(BufReader::new(file))
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        if table.is_empty() {
            return Err(ConfigError::invalid(
                "similarity.embedding_path",
                format!("{} holds no vectors", path.display()),
            ));
        }
        info!(
            terms = table.len(),
            dimension = table.dimension,
            "embedding table loaded"
        );
        Ok(table)
    }

    /// Read a table from GloVe-style lines.
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut table = Self::new();
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(term) = fields.next() else {
                continue;
            };
            let vector: Result<Vec<f32>, _> = fields.map(str::parse::<f32>).collect();
            match vector {
                Ok(vector) => {
                    if !table.insert(term, vector) {
                        skipped += 1;
                    }
                }
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(skipped, "skipped malformed embedding lines");
        }
        Ok(table)
    }

    /// Insert a vector; rejected when empty or of the wrong dimension.
    pub fn insert(&mut self, term: impl Into<String>, vector: Vec<f32>) -> bool {
        if vector.is_empty() || (self.dimension != 0 && vector.len() != self.dimension) {
            return false;
        }
        self.dimension = vector.len();
        self.vectors.insert(term.into(), vector);
        true
    }

    pub fn get(&self, term: &str) -> Option<&[f32]> {
        self.vectors.get(term).map(Vec::as_slice)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Mean vector of the terms that have an embedding.
    pub fn aggregate<'a, I>(&self, terms: I) -> Option<Vec<f64>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut sum = vec![0.0f64; self.dimension];
        let mut found = 0usize;
        for vector in terms.into_iter().filter_map(|t| self.get(t)) {
            for (acc, &v) in sum.iter_mut().zip(vector) {
                *acc += f64::from(v);
            }
            found += 1;
        }
        if found == 0 {
            return None;
        }
        sum.iter_mut().for_each(|v| *v /= found as f64);
        Some(sum)
    }
}

/// Cosine similarity; zero when either vector has no length.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
