//! In-memory vector index with exact cosine search

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::Chunk;

/// Search result with passage text and similarity
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The retrieved passage
    pub text: String,
    /// Raw cosine similarity in [-1, 1], higher is better
    pub score: f32,
    /// Insertion position of the entry in the index
    pub chunk_index: usize,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    text: String,
    vector: Vec<f32>,
}

/// Append-only collection of (passage, vector) pairs
///
/// Search is a full linear scan: corpora are a single uploaded document, so
/// exact top-k is cheap and no approximate structure is kept.
pub struct VectorIndex {
    /// Embeds queries (and chunks when adding)
    embedder: Arc<dyn EmbeddingProvider>,
    /// Entries in insertion order
    entries: Vec<IndexEntry>,
    /// Dimensionality fixed by the first inserted vector
    dimensions: Option<usize>,
}

impl VectorIndex {
    /// Create an empty index
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
            dimensions: None,
        }
    }

    /// Embed every chunk in one batch and index the results
    ///
    /// Fails with `EmptyCorpus` if `chunks` is empty.
    pub async fn build(embedder: Arc<dyn EmbeddingProvider>, chunks: &[Chunk]) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let mut index = Self::new(embedder);
        index.add_chunks(chunks).await?;

        tracing::info!(
            "Built vector index: {} entries, {} dimensions (embedder: {})",
            index.len(),
            index.dimensions.unwrap_or(0),
            index.embedder.name()
        );

        Ok(index)
    }

    /// Embed and append chunks; nothing is appended if any vector is rejected
    pub async fn add_chunks(&mut self, chunks: &[Chunk]) -> Result<usize> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        if vectors.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let mut dimensions = self.dimensions;
        for vector in &vectors {
            dimensions = Some(check_vector(vector, dimensions)?);
        }

        self.dimensions = dimensions;
        self.entries.extend(
            texts
                .into_iter()
                .zip(vectors)
                .map(|(text, vector)| IndexEntry { text, vector }),
        );

        Ok(chunks.len())
    }

    /// Append a passage with a precomputed vector
    pub fn insert(&mut self, text: impl Into<String>, vector: Vec<f32>) -> Result<()> {
        self.dimensions = Some(check_vector(&vector, self.dimensions)?);
        self.entries.push(IndexEntry {
            text: text.into(),
            vector,
        });
        Ok(())
    }

    /// Embed `query` and return the `k` most similar passages, best first
    ///
    /// Returns every entry when `k` exceeds the index size.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("query must not be empty".to_string()));
        }
        validate_k(k)?;
        if self.entries.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let query_vector = self.embedder.embed(query).await?;
        self.search_by_vector(&query_vector, k)
    }

    /// Rank entries against an already embedded query
    ///
    /// Ties keep insertion order.
    pub fn search_by_vector(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        validate_k(k)?;
        if self.entries.is_empty() {
            return Err(Error::EmptyIndex);
        }
        check_vector(query, self.dimensions)?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.vector)))
            .collect();

        // Stable sort, so equal scores stay in insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult {
                text: self.entries[i].text.clone(),
                score,
                chunk_index: i,
            })
            .collect())
    }

    /// Number of indexed passages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality, once anything is indexed
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}

fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::InvalidQuery("k must be a positive integer".to_string()));
    }
    Ok(())
}

/// Reject empty, non-finite or wrongly sized vectors; returns the dimensionality
fn check_vector(vector: &[f32], expected: Option<usize>) -> Result<usize> {
    if vector.is_empty() {
        return Err(Error::embedding("Embedding is empty"));
    }
    if let Some(expected) = expected {
        if vector.len() != expected {
            return Err(Error::embedding(format!(
                "Dimension mismatch: expected {}, got {}",
                expected,
                vector.len()
            )));
        }
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::embedding("Embedding contains NaN or infinite values"));
    }
    Ok(vector.len())
}

/// Compute cosine similarity between two embeddings
///
/// A zero vector has no direction and scores 0 against everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}
