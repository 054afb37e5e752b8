//! Configuration module for Tollgate.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    AgentSettings, CoordinatorSettings, DatabaseSettings, EmbeddingProvider, EmbeddingSettings,
    GeneralSettings, IngestSettings, Settings, VectorStoreSettings,
};
