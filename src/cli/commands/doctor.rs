//! Doctor command - verify configuration and backing stores.

use crate::cli::Output;
use crate::config::{EmbeddingProvider, Settings};
use crate::relational::open_relational_store;
use crate::vector_store::open_vector_store;
use console::style;
use std::path::{Path, PathBuf};

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: Option<&PathBuf>) -> anyhow::Result<()> {
    Output::header("Tollgate Doctor");
    println!();
    println!("Checking configuration and backing stores...\n");

    let mut checks = Vec::new();

    println!("{}", style("API Configuration").bold());
    let api_check = check_openai_api_key(&settings.embedding.provider);
    api_check.print();
    checks.push(api_check);

    println!();

    println!("{}", style("Stores").bold());
    let store_checks = vec![
        check_data_dir(settings),
        check_database(settings).await,
        check_vector_store(settings).await,
    ];
    for check in &store_checks {
        check.print();
    }
    checks.extend(store_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path);
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Tollgate.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Tollgate is ready to use.");
    }

    Ok(())
}

/// Check if OpenAI API key is configured. Only an error when embeddings need it.
fn check_openai_api_key(provider: &EmbeddingProvider) -> CheckResult {
    let required = *provider == EmbeddingProvider::OpenAI;
    let missing = |message: &str| {
        let hint = "Set with: export OPENAI_API_KEY='sk-...'";
        if required {
            CheckResult::error("OPENAI_API_KEY", message, hint)
        } else {
            CheckResult::warning("OPENAI_API_KEY", &format!("{} (needed for agents)", message), hint)
        }
    };

    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Ok(key) if key.is_empty() => missing("empty"),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => missing("not set"),
    }
}

fn check_data_dir(settings: &Settings) -> CheckResult {
    let data_dir = settings.data_dir();
    if data_dir.exists() {
        CheckResult::ok("Data directory", &format!("{}", data_dir.display()))
    } else {
        CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        )
    }
}

/// Open the relational store and count its tables.
async fn check_database(settings: &Settings) -> CheckResult {
    let path = settings.database_path();
    let store = match open_relational_store(&settings.database, &path) {
        Ok(store) => store,
        Err(e) => {
            return CheckResult::error(
                "Database",
                &format!("{}: {}", path.display(), e),
                "Check [database] in the config file",
            )
        }
    };

    match store.list_tables().await {
        Ok(tables) if tables.is_empty() => CheckResult::warning(
            "Database",
            &format!("{} (no tables)", describe_file(&path)),
            "Agents can only write to tables that already exist",
        ),
        Ok(tables) => CheckResult::ok(
            "Database",
            &format!("{}, {} table(s)", describe_file(&path), tables.len()),
        ),
        Err(e) => CheckResult::error("Database", &e.to_string(), "Is the file a SQLite database?"),
    }
}

/// Open the vector store and count its documents.
async fn check_vector_store(settings: &Settings) -> CheckResult {
    let path = settings.vector_store_path();
    let store = match open_vector_store(&settings.vector_store, &path) {
        Ok(store) => store,
        Err(e) => {
            return CheckResult::error(
                "Vector store",
                &format!("{}: {}", path.display(), e),
                "Check [vector_store] in the config file",
            )
        }
    };

    match store.document_count().await {
        Ok(0) => CheckResult::warning(
            "Vector store",
            &format!("{} (empty)", describe_file(&path)),
            "Index documents with: tollgate ingest <paths>",
        ),
        Ok(count) => CheckResult::ok(
            "Vector store",
            &format!("{}, {} document(s)", describe_file(&path), count),
        ),
        Err(e) => CheckResult::error("Vector store", &e.to_string(), "Re-create the store file"),
    }
}

fn describe_file(path: &Path) -> String {
    let size = std::fs::metadata(path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "in memory".to_string());
    format!("{} ({})", path.display(), size)
}

fn check_config_file(config_path: Option<&PathBuf>) -> CheckResult {
    let config_path = config_path
        .cloned()
        .unwrap_or_else(Settings::default_config_path);
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: tollgate config edit",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
