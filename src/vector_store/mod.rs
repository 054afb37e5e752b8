//! Vector store abstraction for Tollgate.
//!
//! Provides a trait-based interface for different vector index backends. The
//! index is only written by ingestion: documents are upserted, and a source's
//! documents can be swapped wholesale with [`VectorStore::replace_source`].
//! Every embedding in one index has the same number of dimensions.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::config::VectorStoreSettings;
use crate::error::{BrokerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Number of characters shown in `list_documents` previews.
pub const PREVIEW_CHARS: usize = 200;

/// A document stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique document ID.
    pub id: String,
    /// Text content.
    pub content: String,
    /// Where the content came from (file path, URL, ...).
    pub source: String,
    /// Free-form metadata.
    pub metadata: Map<String, Value>,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with a caller-chosen ID.
    pub fn with_id(id: String, content: String, source: String, embedding: Vec<f32>) -> Self {
        Self {
            id,
            content,
            source,
            metadata: Map::new(),
            embedding,
            indexed_at: Utc::now(),
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// First [`PREVIEW_CHARS`] characters of the content, with an ellipsis if cut.
    pub fn preview(&self) -> String {
        if self.content.chars().count() <= PREVIEW_CHARS {
            self.content.clone()
        } else {
            let cut: String = self.content.chars().take(PREVIEW_CHARS).collect();
            format!("{}...", cut)
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store a document, replacing any document with the same ID.
    async fn upsert(&self, doc: &Document) -> Result<()>;

    /// Bulk upsert documents.
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize>;

    /// Atomically replace every document indexed from `source` with `docs`.
    ///
    /// Not reachable from the broker; ingestion uses it so a shrunk file
    /// leaves no stale chunks behind.
    async fn replace_source(&self, source: &str, docs: &[Document]) -> Result<usize>;

    /// Search for the `limit` most similar documents.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(query_embedding, limit, f32::MIN).await
    }

    /// Search with a minimum similarity threshold.
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>>;

    /// List up to `limit` documents, most recently indexed first.
    async fn list(&self, limit: usize) -> Result<Vec<Document>>;

    /// Fetch a document by ID.
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Get total document count.
    async fn document_count(&self) -> Result<usize>;
}

/// Open the vector store selected by the configuration.
pub fn open_vector_store(settings: &VectorStoreSettings, path: &Path) -> Result<Arc<dyn VectorStore>> {
    match settings.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteVectorStore::new(path)?)),
        "memory" => Ok(Arc::new(MemoryVectorStore::new())),
        other => Err(BrokerError::Config(format!(
            "Unknown vector store provider: {}",
            other
        ))),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Reject documents whose embedding is empty or does not match `stored`, the
/// dimensions already in the index. An empty index takes the first document's.
fn check_dimensions(docs: &[Document], stored: Option<usize>) -> Result<()> {
    let expected = stored.or_else(|| docs.first().map(|d| d.embedding.len()));
    for doc in docs {
        let dims = doc.embedding.len();
        if dims == 0 {
            return Err(BrokerError::Validation(format!(
                "document '{}' has an empty embedding",
                doc.id
            )));
        }
        if let Some(expected) = expected.filter(|&e| e != dims) {
            return Err(BrokerError::Validation(format!(
                "document '{}' has {} dimensions, the index holds {}",
                doc.id, dims, expected
            )));
        }
    }
    Ok(())
}

/// Score, filter, and rank candidates. Shared by every backend.
///
/// Candidates with a different dimension count than the query are skipped.
fn rank(
    candidates: impl Iterator<Item = Document>,
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = candidates
        .filter(|doc| doc.embedding.len() == query_embedding.len())
        .map(|doc| {
            let score = cosine_similarity(query_embedding, &doc.embedding);
            SearchResult { document: doc, score }
        })
        .filter(|r| r.score >= min_score)
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
    results.truncate(limit);
    results
}
