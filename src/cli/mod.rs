//! CLI module for Tollgate.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::broker::Scope;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tollgate - a tool broker between LLM agents and their data stores
///
/// Agents reach a relational database and a document index only through a
/// fixed allow-list of validated operations. Nothing on that list deletes data.
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "TOLLGATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check configuration and backing stores
    Doctor,

    /// Start an MCP server on stdio
    Mcp {
        /// Which tools to expose: relational, vector or all
        #[arg(short, long, default_value = "all")]
        scope: Scope,
    },

    /// List the tools on the allow-list
    Tools {
        /// Which tools to list: relational, vector or all
        #[arg(short, long, default_value = "all")]
        scope: Scope,
    },

    /// Invoke a single tool and print its JSON result
    Call {
        /// Tool name (e.g. read_records)
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// Index text files into the document store
    Ingest {
        /// Files or directories to index
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Show how a task would be routed without running it
    Route {
        /// Free-form task description
        task: String,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Route a task and run an agent for each domain it touches
    Agent {
        /// Free-form task description
        task: String,

        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Start HTTP API server exposing the broker
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scoped_mcp() {
        let cli = Cli::parse_from(["tollgate", "mcp", "--scope", "relational"]);
        assert!(matches!(cli.command, Commands::Mcp { scope: Scope::Relational }));
    }

    #[test]
    fn test_call_arguments_default_to_empty_object() {
        let cli = Cli::parse_from(["tollgate", "-vv", "call", "list_tables"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Call { tool, arguments } => {
                assert_eq!(tool, "list_tables");
                assert_eq!(arguments, "{}");
            }
            other => panic!("Expected Call, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_scope_rejected() {
        assert!(Cli::try_parse_from(["tollgate", "tools", "--scope", "both"]).is_err());
    }
}
