use ensemble_core::{EnsembleError, EnsembleResult};
use async_trait::async_trait;
use std::collections::HashMap;

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the embedding vector for a single text.
    async fn embed(&self, text: &str) -> EnsembleResult<Vec<f32>>;

    /// Dimension of the embedding vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Deterministic local embedding with no external API dependency.
///
/// Hashes unigrams and word bigrams into a fixed-size vector with TF
/// weighting, then L2-normalizes. Adequate for matching a short query
/// against tool descriptions; swap in an API-backed provider for anything
/// more demanding.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    /// Creates a provider producing vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .map(str::to_string)
            .collect()
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> EnsembleResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EnsembleError::Config("cannot embed empty text".into()));
        }

        let tokens = Self::tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];
        if tokens.is_empty() {
            return Ok(vector);
        }

        let mut counts: HashMap<String, f32> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.clone()).or_insert(0.0) += 1.0;
        }
        // Bigrams carry phrase-level signal, at half the unigram weight.
        for pair in tokens.windows(2) {
            *counts.entry(format!("{} {}", pair[0], pair[1])).or_insert(0.0) += 0.5;
        }

        let total = tokens.len() as f32;
        for (term, count) in &counts {
            let slot = fnv1a(term.as_bytes()) as usize % self.dimension;
            vector[slot] += count / total;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Cosine similarity between two vectors; 0.0 when either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
