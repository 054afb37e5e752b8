//! Error types for Tollgate.

use thiserror::Error;

/// Library-level error type for broker operations.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden operation: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Agent error: {0}")]
    Agent(String),
}

impl BrokerError {
    /// Stable machine-readable code reported alongside tool failures.
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::UnknownOperation(_) => "unknown_operation",
            BrokerError::Validation(_) => "validation_error",
            BrokerError::Forbidden(_) => "forbidden_operation",
            BrokerError::NotFound(_) => "not_found",
            BrokerError::Backend(_)
            | BrokerError::Database(_)
            | BrokerError::Embedding(_)
            | BrokerError::OpenAI(_)
            | BrokerError::Http(_) => "backend_error",
            BrokerError::Config(_) => "config_error",
            BrokerError::Io(_) | BrokerError::Json(_) | BrokerError::TomlParse(_) => {
                "internal_error"
            }
            BrokerError::Agent(_) => "agent_error",
        }
    }
}

/// Result type alias for Tollgate operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
