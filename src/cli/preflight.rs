//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting work
//! that would otherwise fail midway.

use crate::config::{EmbeddingProvider, Settings};
use crate::error::{BrokerError, Result};

/// Requirements for different commands.
#[derive(Debug, Clone, Copy)]
pub enum Requirement {
    /// Running agents always needs the chat API.
    Agent,
    /// Embedding text needs the API only for the OpenAI provider.
    Embedding,
}

/// Run pre-flight checks for the given requirement.
pub fn check(requirement: Requirement, settings: &Settings) -> Result<()> {
    match requirement {
        Requirement::Agent => {
            check_api_key()?;
            check(Requirement::Embedding, settings)?;
        }
        Requirement::Embedding => {
            if settings.embedding.provider == EmbeddingProvider::OpenAI {
                check_api_key()?;
            }
        }
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(BrokerError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(BrokerError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}
