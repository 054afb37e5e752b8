//! Shared OpenAI client construction.

use crate::error::{BrokerError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with the default timeout.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client whose HTTP requests give up after `timeout`.
///
/// Credentials come from `OPENAI_API_KEY` via [`OpenAIConfig::default`].
pub fn create_client_with_timeout(timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BrokerError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(OpenAIConfig::default()).with_http_client(http_client))
}
