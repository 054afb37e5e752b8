//! Tools command implementation.

use crate::broker::{definition, Scope, ToolName};
use crate::cli::Output;
use anyhow::Result;

/// List the tools visible under `scope`.
pub fn run_tools(scope: Scope) -> Result<()> {
    Output::header(&format!("Tools ({})", scope));
    for tool in ToolName::ALL.into_iter().filter(|t| scope.allows(t.domain())) {
        let def = definition(tool);
        Output::tool(&def.name, &tool.domain().to_string(), &def.description);
    }
    println!();
    Ok(())
}
