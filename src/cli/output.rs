//! CLI output formatting utilities.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a tool name with its description.
    pub fn tool(name: &str, domain: &str, description: &str) {
        println!(
            "  {} {} {}",
            style("*").cyan(),
            style(name).bold(),
            style(format!("[{}]", domain)).dim()
        );
        println!("    {}", description);
    }

    /// Print one step of a routing plan.
    pub fn step(index: usize, domain: &str, task: &str) {
        println!(
            "  {} {} {}",
            style(format!("{}.", index)).cyan(),
            style(domain).bold(),
            task
        );
    }

    /// Pretty-print a JSON value to stdout.
    pub fn json(value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(template);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Shorten a single-line preview of `text` to `max_chars` characters.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
