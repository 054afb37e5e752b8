//! Ingest command implementation.

use crate::cli::preflight::{self, Requirement};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::ingest::Ingestor;
use crate::vector_store::open_vector_store;
use anyhow::Result;
use std::path::PathBuf;

/// Index every path given on the command line.
pub async fn run_ingest(paths: &[PathBuf], settings: &Settings) -> Result<()> {
    if let Err(e) = preflight::check(Requirement::Embedding, settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tollgate doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let store = open_vector_store(&settings.vector_store, &settings.vector_store_path())?;
    let embedder = create_embedder(&settings.embedding)?;
    let ingestor = Ingestor::new(store.clone(), embedder, &settings.ingest);

    let mut files = 0;
    let mut chunks = 0;
    for path in paths {
        let spinner = Output::spinner(&format!("Indexing {}...", path.display()));
        let result = ingestor.ingest_path(path).await;
        spinner.finish_and_clear();

        match result {
            Ok(ingested) => {
                for file in &ingested {
                    Output::kv(&file.source, &format!("{} chunk(s)", file.chunks));
                }
                files += ingested.len();
                chunks += ingested.iter().map(|f| f.chunks).sum::<usize>();
            }
            Err(e) => {
                Output::error(&format!("Failed to index {}: {}", path.display(), e));
                return Err(e.into());
            }
        }
    }

    Output::success(&format!(
        "Indexed {} chunk(s) from {} file(s). {} document(s) in the store.",
        chunks,
        files,
        store.document_count().await?
    ));
    Ok(())
}
