//! Local feature-hashing embedder.
//!
//! Maps each lowercase word to a signed bucket via SHA-256 and L2-normalises the
//! counts. Stable across runs and platforms, so vectors persisted in the store
//! stay comparable with later queries. Quality is lexical, not semantic.

use super::Embedder;
use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Deterministic bag-of-words embedder that needs no network access.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Create an embedder producing vectors of `dimensions` length (at least 1).
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::cosine_similarity;

    #[tokio::test]
    async fn test_hash_embedding_is_deterministic_and_normalised() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Vacation policy for employees").await.unwrap();
        let b = embedder.embed("vacation POLICY for employees!").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_related_text_scores_higher() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed("vacation policy").await.unwrap();
        let related = embedder.embed("the vacation policy grants 30 days").await.unwrap();
        let unrelated = embedder.embed("quarterly revenue grew in march").await.unwrap();

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed("  ...  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
