//! Route command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::coordinator::Classifier;
use anyhow::Result;

/// Print the routing plan for a task.
pub fn run_route(task: &str, json: bool, settings: &Settings) -> Result<()> {
    let plan = Classifier::new(&settings.coordinator).plan(task);

    if json {
        Output::json(&serde_json::to_value(&plan)?);
        return Ok(());
    }

    Output::header(if plan.is_mixed() { "Mixed task" } else { "Single-domain task" });
    for (i, step) in plan.steps.iter().enumerate() {
        Output::step(i + 1, &step.domain.to_string(), &step.task);
    }
    println!();
    Ok(())
}
