//! Tollgate - a tool broker between LLM agents and their data stores
//!
//! Agents never hold a database handle. Every read or write they make is a
//! named operation from a fixed allow-list, validated before it reaches a
//! backing store:
//!
//! - relational: `create_record`, `read_records`, `update_record`,
//!   `execute_query` (read-only), `list_tables`, `describe_table`
//! - documents: `search_documents`, `list_documents`, `get_document`
//!
//! No operation deletes data.
//!
//! # Architecture
//!
//! - `broker` - allow-list, argument validation, dispatch
//! - `relational` - relational store trait and SQLite backend
//! - `vector_store` - document index trait with SQLite and in-memory backends
//! - `embedding` - embedding providers
//! - `coordinator` - routes free-form tasks to one or both domains
//! - `agent` - LLM agents that act only through the broker
//! - `ingest` - loads text files into the document index
//! - `mcp` - MCP stdio server
//! - `config` - configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tollgate::broker::ToolBroker;
//! use tollgate::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let broker = ToolBroker::from_settings(&settings)?;
//!
//!     let users = broker
//!         .invoke("read_records", Some(&json!({"table": "users", "limit": 10})))
//!         .await?;
//!     println!("{}", users["count"]);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod broker;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod mcp;
pub mod openai;
pub mod relational;
pub mod vector_store;

pub use error::{BrokerError, Result};
