use console::style;
use serde::Serialize;
use std::fmt::Display;

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Status messages go to stderr so stdout stays clean for documents and data.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Human
            },
        }
    }

    pub fn success(&self, message: impl Display) {
        match self.format {
            OutputFormat::Human => {
                eprintln!("{} {}", style("✓").green().bold(), message);
            }
            OutputFormat::Json => {}
        }
    }

    pub fn info(&self, message: impl Display) {
        match self.format {
            OutputFormat::Human => {
                eprintln!("{} {}", style("ℹ").blue().bold(), message);
            }
            OutputFormat::Json => {}
        }
    }

    pub fn warning(&self, message: impl Display) {
        match self.format {
            OutputFormat::Human => {
                eprintln!("{} {}", style("⚠").yellow().bold(), message);
            }
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "status": "warning",
                    "message": message.to_string(),
                });
                eprintln!("{}", output);
            }
        }
    }

    pub fn error(&self, message: impl Display) {
        match self.format {
            OutputFormat::Human => {
                eprintln!("{} {}", style("✗").red().bold(), message);
            }
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "status": "error",
                    "message": message.to_string(),
                });
                eprintln!("{}", output);
            }
        }
    }

    /// Emit a command result: `{status, data}` in JSON mode, nothing otherwise
    pub fn result<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.format == OutputFormat::Json {
            let output = serde_json::json!({
                "status": "success",
                "data": data,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Ok(())
    }

    pub fn kv(&self, key: impl Display, value: impl Display) {
        if self.format == OutputFormat::Human {
            println!("{}: {}", style(key).bold(), value);
        }
    }

    pub fn section(&self, title: impl Display) {
        if self.format == OutputFormat::Human {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}
