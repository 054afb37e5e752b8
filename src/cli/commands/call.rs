//! Call command implementation.

use crate::agent::{parse_arguments, render_result};
use crate::broker::ToolBroker;
use crate::config::Settings;
use anyhow::Result;

/// Invoke one tool and print its JSON payload.
pub async fn run_call(tool: &str, arguments: &str, settings: &Settings) -> Result<()> {
    let broker = ToolBroker::from_settings(settings)?;

    let outcome = match parse_arguments(arguments) {
        Ok(args) => broker.invoke(tool, Some(&args)).await,
        Err(e) => Err(e),
    };
    println!("{}", render_result(&outcome));

    outcome.map(|_| ()).map_err(Into::into)
}
