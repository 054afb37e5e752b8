//! MCP (Model Context Protocol) server.
//!
//! Exposes the tool broker to MCP clients over stdio, one JSON-RPC 2.0
//! message per line. A server can be scoped to a single domain.

mod protocol;
mod server;

pub use server::McpServer;
