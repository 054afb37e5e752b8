//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{check_dimensions, rank, Document, SearchResult, VectorStore};
use crate::error::{BrokerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
pub struct MemoryVectorStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Document>>> {
        self.documents
            .read()
            .map_err(|e| BrokerError::Backend(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Document>>> {
        self.documents
            .write()
            .map_err(|e| BrokerError::Backend(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, doc: &Document) -> Result<()> {
        self.upsert_batch(std::slice::from_ref(doc)).await?;
        Ok(())
    }

    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let mut store = self.write()?;
        check_dimensions(docs, store.values().next().map(|d| d.embedding.len()))?;
        for doc in docs {
            store.insert(doc.id.clone(), doc.clone());
        }
        Ok(docs.len())
    }

    async fn replace_source(&self, source: &str, docs: &[Document]) -> Result<usize> {
        let mut store = self.write()?;
        let stored = store
            .values()
            .find(|d| d.source != source)
            .map(|d| d.embedding.len());
        check_dimensions(docs, stored)?;

        store.retain(|_, d| d.source != source);
        for doc in docs {
            store.insert(doc.id.clone(), doc.clone());
        }
        Ok(docs.len())
    }

    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let docs = self.read()?;
        Ok(rank(docs.values().cloned(), query_embedding, limit, min_score))
    }

    async fn list(&self, limit: usize) -> Result<Vec<Document>> {
        let docs = self.read()?;
        let mut listed: Vec<Document> = docs.values().cloned().collect();
        listed.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at).then_with(|| a.id.cmp(&b.id)));
        listed.truncate(limit);
        Ok(listed)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
