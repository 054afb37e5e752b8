//! Embedding generation for semantic search.

mod hashing;
mod openai;

pub use hashing::HashEmbedder;
pub use openai::OpenAIEmbedder;

use crate::config::{EmbeddingProvider, EmbeddingSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Build the embedder selected by the configuration.
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let dimensions = settings.dimensions as usize;
    Ok(match settings.provider {
        EmbeddingProvider::OpenAI => {
            Arc::new(OpenAIEmbedder::with_config(&settings.model, dimensions)?)
        }
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(dimensions)),
    })
}
