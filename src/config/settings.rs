//! Configuration settings for Tollgate.

use crate::coordinator::Domain;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub database: DatabaseSettings,
    pub vector_store: VectorStoreSettings,
    pub embedding: EmbeddingSettings,
    pub ingest: IngestSettings,
    pub agent: AgentSettings,
    pub coordinator: CoordinatorSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.tollgate".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Relational database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database provider (sqlite).
    pub provider: String,
    /// Path to the SQLite database file.
    pub sqlite_path: String,
    /// Row limit applied to `read_records` when the caller gives none.
    pub read_limit: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.tollgate/database.db".to_string(),
            read_limit: 100,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Default top-k for `search_documents`.
    pub search_limit: u32,
    /// Default page size for `list_documents`.
    pub list_limit: u32,
    /// Minimum cosine similarity for search hits.
    pub min_score: f32,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.tollgate/vectors.db".to_string(),
            search_limit: 5,
            list_limit: 20,
            min_score: 0.0,
        }
    }
}

/// Embedding provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI embeddings API.
    #[default]
    OpenAI,
    /// Local feature-hashing embedder; no network access.
    Hash,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(EmbeddingProvider::OpenAI),
            "hash" | "local" => Ok(EmbeddingProvider::Hash),
            _ => Err(format!("Unknown embedding provider: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::OpenAI => write!(f, "openai"),
            EmbeddingProvider::Hash => write!(f, "hash"),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai, hash).
    pub provider: EmbeddingProvider,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Document ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Target chunk size in characters.
    pub chunk_chars: usize,
    /// Characters shared between consecutive chunks.
    pub overlap_chars: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk_chars: 1000,
            overlap_chars: 200,
        }
    }
}

/// LLM agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Chat model driving the tool-calling loop.
    pub model: String,
    /// Maximum LLM round-trips per sub-request.
    pub max_iterations: usize,
    /// HTTP timeout for OpenAI requests, in seconds.
    pub timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_iterations: 15,
            timeout_secs: 300,
        }
    }
}

/// Task routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Words that signal a database task.
    pub relational_keywords: Vec<String>,
    /// Words that signal a document-search task.
    pub vector_keywords: Vec<String>,
    /// Domain used when a task carries no signal at all.
    pub default_domain: Domain,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| w.to_string()).collect();
        Self {
            relational_keywords: words(&[
                "database", "db", "table", "tables", "record", "records", "row", "rows",
                "insert", "create", "update", "register", "store", "save", "sql", "column",
                "columns", "schema", "registro", "banco", "tabela", "crie", "atualize",
            ]),
            vector_keywords: words(&[
                "document", "documents", "doc", "docs", "search", "find", "lookup", "policy",
                "policies", "manual", "knowledge", "semantic", "pdf", "documentos", "busque",
                "política", "políticas",
            ]),
            default_domain: Domain::Vector,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::BrokerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tollgate")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded relational database path.
    pub fn database_path(&self) -> PathBuf {
        Self::expand_path(&self.database.sqlite_path)
    }

    /// Get the expanded vector store path.
    pub fn vector_store_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [database]
            sqlite_path = "/tmp/app.db"

            [embedding]
            provider = "hash"
            dimensions = 64
            "#,
        )
        .unwrap();

        assert_eq!(settings.database.sqlite_path, "/tmp/app.db");
        assert_eq!(settings.database.read_limit, 100);
        assert_eq!(settings.embedding.provider, EmbeddingProvider::Hash);
        assert_eq!(settings.embedding.dimensions, 64);
        assert_eq!(settings.vector_store.search_limit, 5);
        assert_eq!(settings.coordinator.default_domain, Domain::Vector);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.agent.model = "gpt-4.1".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.agent.model, "gpt-4.1");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = PathBuf::from("/nonexistent/tollgate/config.toml");
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.vector_store.list_limit, 20);
    }
}
