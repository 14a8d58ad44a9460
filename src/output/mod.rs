//! Rendering of check, crawl and store reports.
//!
//! Every renderer returns a `String` so callers can print it or write it to
//! a file; the `print_*` helpers do the former.

mod json;
mod table;

pub use json::{render_json, RunReport};
pub use table::{render_project, render_store, render_submodules};

use crate::cache::StoredEntry;
use crate::check::ProjectReport;
use crate::crawler::AggregateReport;
use anyhow::Result;
use std::path::Path;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// Markdown tables, for pull request comments
    Markdown,
    /// JSON format for programmatic use
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Unknown format: {}. Use 'table', 'markdown', or 'json'",
                s
            )),
        }
    }
}

impl OutputFormat {
    pub fn is_interactive(&self) -> bool {
        *self == OutputFormat::Table
    }
}

/// Renders the result of `govuln run`: the project and, if crawled, its
/// internal submodules.
pub fn format_run(
    project: &ProjectReport,
    submodules: Option<&AggregateReport>,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(&RunReport { project, submodules }),
        OutputFormat::Table | OutputFormat::Markdown => {
            let markdown = format == OutputFormat::Markdown;
            let mut out = render_project(project, markdown);
            if let Some(submodules) = submodules {
                out.push('\n');
                out.push_str(&render_submodules(submodules, markdown));
            }
            Ok(out)
        }
    }
}

pub fn print_run(
    project: &ProjectReport,
    submodules: Option<&AggregateReport>,
    format: OutputFormat,
) -> Result<()> {
    println!("{}", format_run(project, submodules, format)?);
    Ok(())
}

pub fn print_store(root: &Path, entries: &[StoredEntry], format: OutputFormat) -> Result<()> {
    let out = match format {
        OutputFormat::Json => {
            let list: Vec<_> = entries.iter().map(|e| &e.entry).collect();
            render_json(&list)?
        }
        OutputFormat::Table => render_store(root, entries, false),
        OutputFormat::Markdown => render_store(root, entries, true),
    };
    println!("{}", out);
    Ok(())
}
