//! OpenAI embeddings implementation.

use super::Embedder;
use crate::error::{BrokerError, Result};
use crate::openai::create_client;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI has a limit on inputs per request.
const BATCH_SIZE: usize = 100;

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create an embedder with the default model (`text-embedding-3-small`, 1536 dims).
    pub fn new() -> Result<Self> {
        Self::with_config("text-embedding-3-small", 1536)
    }

    /// Create an embedder with a custom model and dimensions.
    pub fn with_config(model: &str, dimensions: usize) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
            dimensions,
        })
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| BrokerError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting {} embeddings from {}", texts.len(), self.model);

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()))
                .dimensions(self.dimensions as u32)
                .build()
                .map_err(|e| BrokerError::Embedding(format!("Failed to build request: {}", e)))?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| BrokerError::OpenAI(format!("Embedding API error: {}", e)))?;

            let mut data = response.data;
            data.sort_by_key(|e| e.index);
            all_embeddings.extend(data.into_iter().map(|e| e.embedding));
        }

        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
