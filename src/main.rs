//! Tollgate CLI entry point.

use anyhow::Result;
use clap::Parser;
use tollgate::cli::{commands, Cli, Commands};
use tollgate::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(cli.config.as_ref())?;

    // Logs go to stderr; stdout carries MCP and JSON output.
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("tollgate={}", log_level)),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings, cli.config.as_ref()).await?;
        }

        Commands::Mcp { scope } => {
            commands::run_mcp(*scope, &settings).await?;
        }

        Commands::Tools { scope } => {
            commands::run_tools(*scope)?;
        }

        Commands::Call { tool, arguments } => {
            commands::run_call(tool, arguments, &settings).await?;
        }

        Commands::Ingest { paths } => {
            commands::run_ingest(paths, &settings).await?;
        }

        Commands::Route { task, json } => {
            commands::run_route(task, *json, &settings)?;
        }

        Commands::Agent { task, model } => {
            commands::run_agent(task, model.clone(), &settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, &settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, cli.config.as_ref(), &settings)?;
        }
    }

    Ok(())
}
