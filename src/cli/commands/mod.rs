//! CLI command implementations.

mod agent;
mod call;
mod config;
mod doctor;
mod ingest;
mod mcp;
mod route;
mod serve;
mod tools;

pub use agent::run_agent;
pub use call::run_call;
pub use config::run_config;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use mcp::run_mcp;
pub use route::run_route;
pub use serve::run_serve;
pub use tools::run_tools;
