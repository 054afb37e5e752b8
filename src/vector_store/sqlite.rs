//! SQLite-based vector store implementation.
//!
//! Embeddings are stored as little-endian f32 blobs and cosine similarity is
//! computed in Rust over a full scan. Fine for the document counts an agent
//! knowledge base holds; a dedicated ANN index would replace the scan beyond that.

use super::{check_dimensions, rank, Document, SearchResult, VectorStore};
use crate::error::{BrokerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        source TEXT NOT NULL,
        metadata TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_documents_indexed_at ON documents(indexed_at);
    CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source);
"#;

const SELECT_COLUMNS: &str = "SELECT id, content, source, metadata, embedding, indexed_at FROM documents";

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a vector store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| BrokerError::Backend(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
        let metadata_json: String = row.get(3)?;
        let embedding_bytes: Vec<u8> = row.get(4)?;
        let indexed_at_str: String = row.get(5)?;

        Ok(Document {
            id: row.get(0)?,
            content: row.get(1)?,
            source: row.get(2)?,
            metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    /// Dimensions of the stored embeddings, ignoring documents from `except_source`.
    fn stored_dimensions(conn: &Connection, except_source: Option<&str>) -> Result<Option<usize>> {
        let bytes: Option<i64> = conn
            .query_row(
                "SELECT length(embedding) FROM documents WHERE ?1 IS NULL OR source != ?1 LIMIT 1",
                params![except_source],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes.map(|b| b as usize / 4))
    }

    fn insert(conn: &Connection, doc: &Document) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO documents (id, content, source, metadata, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                doc.id,
                doc.content,
                doc.source,
                serde_json::to_string(&doc.metadata)?,
                Self::embedding_to_bytes(&doc.embedding),
                doc.indexed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, doc), fields(id = %doc.id))]
    async fn upsert(&self, doc: &Document) -> Result<()> {
        let conn = self.lock()?;
        check_dimensions(std::slice::from_ref(doc), Self::stored_dimensions(&conn, None)?)?;
        Self::insert(&conn, doc)?;
        debug!("Upserted document {}", doc.id);
        Ok(())
    }

    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let conn = self.lock()?;
        check_dimensions(docs, Self::stored_dimensions(&conn, None)?)?;
        let tx = conn.unchecked_transaction()?;
        for doc in docs {
            Self::insert(&tx, doc)?;
        }
        tx.commit()?;

        info!("Batch upserted {} documents", docs.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn replace_source(&self, source: &str, docs: &[Document]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        check_dimensions(docs, Self::stored_dimensions(&tx, Some(source))?)?;

        let removed = tx.execute("DELETE FROM documents WHERE source = ?1", params![source])?;
        for doc in docs {
            Self::insert(&tx, doc)?;
        }
        tx.commit()?;

        debug!("Replaced {} document(s) from {} with {}", removed, source, docs.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(SELECT_COLUMNS)?;
        let docs = stmt
            .query_map([], Self::row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let results = rank(docs.into_iter(), query_embedding, limit, min_score);
        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn list(&self, limit: usize) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY indexed_at DESC, id ASC LIMIT ?1",
            SELECT_COLUMNS
        ))?;
        let docs = stmt
            .query_map(params![limit as i64], Self::row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(docs)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            Self::row_to_document,
        );

        match result {
            Ok(doc) => Ok(Some(doc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn doc(id: &str, content: &str, embedding: Vec<f32>) -> Document {
        let mut metadata = Map::new();
        metadata.insert("department".to_string(), json!("hr"));
        Document::with_id(id.to_string(), content.to_string(), "handbook.txt".to_string(), embedding)
            .with_metadata(metadata)
    }

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory().unwrap();

        store.upsert(&doc("a", "Vacation policy", vec![1.0, 0.0, 0.0])).await.unwrap();
        store.upsert(&doc("b", "Expense policy", vec![0.0, 1.0, 0.0])).await.unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "a");
        assert!((results[0].score - 1.0).abs() < 0.001);

        let fetched = store.get("b").await.unwrap().unwrap();
        assert_eq!(fetched.metadata["department"], json!("hr"));
        assert_eq!(fetched.embedding, vec![0.0, 1.0, 0.0]);

        assert!(store.get("missing").await.unwrap().is_none());
        assert_eq!(store.document_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_threshold_filters_low_scores() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .upsert_batch(&[doc("a", "x", vec![1.0, 0.0]), doc("b", "y", vec![0.0, 1.0])])
            .await
            .unwrap();

        let results = store.search_with_threshold(&[1.0, 0.0], 10, 0.5).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vectors.db");

        {
            let store = SqliteVectorStore::new(&path).unwrap();
            store.upsert(&doc("a", "persisted", vec![0.5, 0.5])).await.unwrap();
        }

        let reopened = SqliteVectorStore::new(&path).unwrap();
        let listed = reopened.list(10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "persisted");
    }

    #[tokio::test]
    async fn test_mismatched_dimensions_rejected() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.upsert(&doc("ok", "fits", vec![1.0, 0.0, 0.0])).await.unwrap();

        let err = store.upsert(&doc("short", "too short", vec![1.0, 0.0])).await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        let err = store
            .upsert_batch(&[doc("c", "fits", vec![0.0, 0.0, 1.0]), doc("d", "short", vec![1.0])])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let hits = store.search_with_threshold(&[1.0, 0.0, 0.0], 10, 0.0).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_replace_source_is_atomic() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .upsert_batch(&[
                doc("handbook.txt#0", "a", vec![1.0, 0.0]),
                doc("handbook.txt#1", "b", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let err = store
            .replace_source("handbook.txt", &[doc("handbook.txt#0", "x", vec![])])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(store.document_count().await.unwrap(), 2);

        store
            .replace_source("handbook.txt", &[doc("handbook.txt#0", "new", vec![0.5, 0.5])])
            .await
            .unwrap();
        assert_eq!(store.document_count().await.unwrap(), 1);
        assert!(store.get("handbook.txt#1").await.unwrap().is_none());
    }
}
