//! MCP command implementation.

use crate::broker::{Scope, ToolBroker};
use crate::config::Settings;
use crate::mcp::McpServer;
use anyhow::Result;

/// Run the MCP server over stdio.
pub async fn run_mcp(scope: Scope, settings: &Settings) -> Result<()> {
    let broker = ToolBroker::from_settings(settings)?.with_scope(scope);
    McpServer::new(broker).run().await
}
