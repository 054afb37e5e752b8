//! Agent command implementation.

use crate::agent::AgentHandler;
use crate::broker::ToolBroker;
use crate::cli::output::preview;
use crate::cli::preflight::{self, Requirement};
use crate::cli::Output;
use crate::config::Settings;
use crate::coordinator::{Classifier, Coordinator};
use anyhow::Result;
use std::sync::Arc;

/// Route a task and run one agent per domain it touches.
pub async fn run_agent(task: &str, model: Option<String>, settings: &Settings) -> Result<()> {
    if let Err(e) = preflight::check(Requirement::Agent, settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tollgate doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let mut agent_settings = settings.agent.clone();
    if let Some(model) = model {
        agent_settings.model = model;
    }

    let broker = ToolBroker::from_settings(settings)?;
    let coordinator = Coordinator::new(
        Classifier::new(&settings.coordinator),
        Arc::new(AgentHandler::new(broker, agent_settings)),
    );

    let plan = coordinator.plan(task);
    if plan.is_mixed() {
        Output::header("Plan");
        for (i, step) in plan.steps.iter().enumerate() {
            Output::step(i + 1, &step.domain.to_string(), &step.task);
        }
        println!();
    }

    let spinner = Output::spinner("Agent working...");
    match coordinator.run(task).await {
        Ok(outcome) => {
            spinner.finish_and_clear();
            println!("\n{}\n", outcome.combined);

            for step in &outcome.steps {
                Output::info(&format!("{}: {}", step.domain, preview(&step.task, 60)));
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Agent failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
