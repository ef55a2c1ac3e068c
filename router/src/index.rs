//! Capability index: a similarity-searchable store of short capability
//! phrases, each tagged with its owning handler.
//!
//! The index is built once at startup from every registered handler's
//! phrases and treated as immutable afterwards; changing the roster
//! means rebuilding the index. The embedding behind it is pluggable;
//! the default is a deterministic feature-hashing embedder that needs
//! no model weights and no network.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failure from the embedding provider behind the index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding provider failed: {0}")]
    Provider(String),
}

/// Turns text into a fixed-dimension vector. Implementations may call
/// out to a remote embedding service; the router bounds that call with
/// a timeout and bounded retries.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f64>, IndexError>;
}

/// Deterministic in-process embedder: tokens are hashed into buckets
/// via SHA-256 with a digest-derived sign, then L2-normalized. Similar
/// token sets land on similar vectors, which is enough signal to rank
/// a few dozen capability phrases.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>, IndexError> {
        Ok(hashing_embedding(text, self.dimensions))
    }
}

/// Lowercased ASCII-alphanumeric tokens; `_` survives, everything else
/// splits. The same tokenizer feeds the embedder, the keyword route,
/// and observation relevancy so all three signals see the same tokens.
pub fn tokenize_ascii(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn hashing_embedding(text: &str, dimensions: usize) -> Vec<f64> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokenize_ascii(text) {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut vector = vec![0.0_f64; dimensions];
    for (token, count) in counts {
        let digest = Sha256::digest(token.as_bytes());
        let bucket =
            u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize % dimensions;
        let sign = if digest[4] % 2 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * count as f64;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Cosine similarity in [-1, 1]. Empty or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Round a score to 4 decimal places for presentation.
pub fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

/// One indexed phrase scored against a query.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityMatch {
    pub phrase: String,
    pub handler: String,
    /// Cosine similarity in [-1, 1]; callers floor at 0 for confidence.
    pub score: f64,
}

struct IndexEntry {
    phrase: String,
    handler: String,
    vector: Vec<f64>,
}

/// The built index. Read-only after construction.
pub struct CapabilityIndex {
    embedder: Box<dyn Embedder>,
    entries: Vec<IndexEntry>,
}

impl CapabilityIndex {
    /// Embed every `(phrase, handler)` pair up front. Phrase order is
    /// preserved so equal-scoring matches rank deterministically.
    pub async fn build(
        embedder: Box<dyn Embedder>,
        phrases: Vec<(String, String)>,
    ) -> Result<Self, IndexError> {
        let mut entries = Vec::with_capacity(phrases.len());
        for (phrase, handler) in phrases {
            let vector = embedder.embed(&phrase).await?;
            entries.push(IndexEntry {
                phrase,
                handler,
                vector,
            });
        }
        tracing::debug!(phrases = entries.len(), "capability index built");
        Ok(Self { embedder, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nearest phrases to `query`, best first; at most `top_k` results.
    /// Equal scores order by phrase, then handler, so results are
    /// stable across runs.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<CapabilityMatch>, IndexError> {
        if top_k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let mut matches: Vec<CapabilityMatch> = self
            .entries
            .iter()
            .map(|entry| CapabilityMatch {
                phrase: entry.phrase.clone(),
                handler: entry.handler.clone(),
                score: cosine_similarity(&query_vector, &entry.vector),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.phrase.cmp(&b.phrase))
                .then_with(|| a.handler.cmp(&b.handler))
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}
