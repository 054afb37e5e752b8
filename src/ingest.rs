//! Document ingestion into the vector index.
//!
//! Text files are cut into overlapping character windows, embedded, and
//! stored with ids of the form `{source}#{n}`. Re-ingesting a file replaces
//! every window previously indexed from it.

use crate::config::IngestSettings;
use crate::embedding::Embedder;
use crate::error::{BrokerError, Result};
use crate::vector_store::{Document, VectorStore};
use serde_json::{json, Map};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File extensions picked up when walking a directory.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "rst", "text"];

/// Split `text` into windows of at most `size` characters, each starting
/// `size - overlap` characters after the previous one.
pub fn split_windows(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    let step = size.saturating_sub(overlap).max(1);

    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        if !window.trim().is_empty() {
            windows.push(window.trim().to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    windows
}

/// Per-file ingestion result.
#[derive(Debug, Clone)]
pub struct IngestedFile {
    pub source: String,
    pub chunks: usize,
}

pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunk_chars: usize,
    overlap_chars: usize,
}

impl Ingestor {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, settings: &IngestSettings) -> Self {
        Self {
            store,
            embedder,
            chunk_chars: settings.chunk_chars,
            overlap_chars: settings.overlap_chars,
        }
    }

    /// Index `text` under `source`. Returns the number of windows stored.
    pub async fn ingest_text(&self, source: &str, text: &str) -> Result<usize> {
        let windows = split_windows(text, self.chunk_chars, self.overlap_chars);
        if windows.is_empty() {
            debug!("Nothing to index in {}", source);
            return self.store.replace_source(source, &[]).await;
        }

        let embeddings = self.embedder.embed_batch(&windows).await?;
        if embeddings.len() != windows.len() {
            return Err(BrokerError::Embedding(format!(
                "expected {} embeddings, got {}",
                windows.len(),
                embeddings.len()
            )));
        }

        let docs: Vec<Document> = windows
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(n, (content, embedding))| {
                let mut metadata = Map::new();
                metadata.insert("source".to_string(), json!(source));
                metadata.insert("chunk".to_string(), json!(n));
                Document::with_id(format!("{}#{}", source, n), content, source.to_string(), embedding)
                    .with_metadata(metadata)
            })
            .collect();

        let stored = self.store.replace_source(source, &docs).await?;
        info!("Indexed {} chunk(s) from {}", stored, source);
        Ok(stored)
    }

    /// Read and index one file.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestedFile> {
        let text = std::fs::read_to_string(path)?;
        let source = path.display().to_string();
        let chunks = self.ingest_text(&source, &text).await?;
        Ok(IngestedFile { source, chunks })
    }

    /// Index a file, or every text file under a directory.
    pub async fn ingest_path(&self, path: &Path) -> Result<Vec<IngestedFile>> {
        let mut ingested = Vec::new();
        for file in collect_files(path)? {
            match self.ingest_file(&file).await {
                Ok(result) => ingested.push(result),
                Err(BrokerError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    warn!("Skipping {:?}: not valid UTF-8", file);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(ingested)
    }
}

/// Files to ingest under `path`, sorted for a stable order.
pub fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(BrokerError::NotFound(format!("{}", path.display())));
    }

    let mut files = Vec::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry_path = entry?.path();
            if entry_path.is_dir() {
                pending.push(entry_path);
            } else if has_text_extension(&entry_path) {
                files.push(entry_path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
