use std::path::Path;

use tabled::{settings::Style, Table, Tabled};

use crate::cache::StoredEntry;
use crate::check::ProjectReport;
use crate::crawler::AggregateReport;

/// Advisory ids listed in a submodule row before the rest is summarized.
const MAX_LISTED_IDS: usize = 2;

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Vulnerability")]
    id: String,
    #[tabled(rename = "Introduced")]
    introduced: String,
    #[tabled(rename = "Fixed")]
    fixed: String,
    #[tabled(rename = "Current")]
    current: String,
}

#[derive(Tabled)]
struct SubmoduleRow {
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Vulnerabilities")]
    vulnerabilities: String,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Error")]
    reason: String,
}

#[derive(Tabled)]
struct StoreRow {
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Last Update")]
    last_update: String,
    #[tabled(rename = "Vulnerabilities")]
    vulnerable: String,
}

fn styled<T: Tabled>(rows: Vec<T>, markdown: bool) -> String {
    let mut table = Table::new(rows);
    if markdown {
        table.with(Style::markdown());
    } else {
        table.with(Style::rounded());
    }
    table.to_string()
}

pub fn render_project(report: &ProjectReport, markdown: bool) -> String {
    let mut out = String::new();
    let title = match &report.version {
        Some(version) => format!("{} {}", report.identity, version),
        None => report.identity.to_string(),
    };
    out.push_str(&title);
    if report.from_cache {
        out.push_str(" (cached)");
    }
    out.push_str("\n\n");

    if report.vulnerabilities.is_empty() {
        out.push_str("SUCCESS!! No vulnerabilities found\n");
    } else {
        let rows: Vec<VulnRow> = report
            .vulnerabilities
            .iter()
            .flat_map(|(package, findings)| {
                findings.iter().map(move |f| VulnRow {
                    package: package.to_string(),
                    id: f.id.clone(),
                    introduced: f.introduced.to_string(),
                    fixed: f.fixed.to_string(),
                    current: f.current.to_string(),
                })
            })
            .collect();
        out.push_str(&styled(rows, markdown));
        out.push_str(&format!(
            "\nTotal: {} affected packages, {} findings\n",
            report.vulnerabilities.len(),
            report.vulnerabilities.finding_count()
        ));
    }

    if !report.unparsable.is_empty() {
        out.push_str("\nSkipped unparsable versions:\n");
        for skipped in &report.unparsable {
            out.push_str(&format!("  {} {}\n", skipped.package, skipped.version));
        }
    }

    out
}

/// "SAFE" for a clean module, otherwise the first ids and a "+N" tail.
fn summarize_ids(ids: &[String]) -> String {
    if ids.is_empty() {
        return "SAFE".to_string();
    }
    let listed = ids[..ids.len().min(MAX_LISTED_IDS)].join(", ");
    if ids.len() > MAX_LISTED_IDS {
        format!("{} +{}", listed, ids.len() - MAX_LISTED_IDS)
    } else {
        listed
    }
}

pub fn render_submodules(report: &AggregateReport, markdown: bool) -> String {
    let mut out = String::from("Internal submodules\n\n");

    if report.is_empty() {
        out.push_str("No internal submodules checked.\n");
    } else {
        let rows: Vec<SubmoduleRow> = report
            .rows()
            .map(|(module, version, ids)| SubmoduleRow {
                module: module.to_string(),
                version: version.to_string(),
                vulnerabilities: summarize_ids(ids),
            })
            .collect();
        out.push_str(&styled(rows, markdown));
        out.push('\n');
    }

    if !report.failures().is_empty() {
        out.push_str("\nNot assessed:\n");
        let rows: Vec<FailureRow> = report
            .failures()
            .iter()
            .map(|f| FailureRow {
                module: f.module.clone(),
                version: f.version.clone(),
                reason: f.reason.clone(),
            })
            .collect();
        out.push_str(&styled(rows, markdown));
        out.push('\n');
    }

    if report.cancelled() {
        out.push_str("\nCrawl interrupted; results are partial.\n");
    }

    out
}

pub fn render_store(root: &Path, entries: &[StoredEntry], markdown: bool) -> String {
    let mut out = format!("Store path: {}\n\n", root.display());

    if entries.is_empty() {
        out.push_str("Store is empty.\n");
        return out;
    }

    let rows: Vec<StoreRow> = entries
        .iter()
        .map(|stored| {
            let entry = &stored.entry;
            StoreRow {
                kind: if entry.package_version.is_empty() { "Project" } else { "Package" },
                name: if entry.package_name.is_empty() {
                    entry.project.display().to_string()
                } else {
                    entry.package_name.clone()
                },
                version: entry.package_version.clone(),
                last_update: entry
                    .last_update
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                vulnerable: if entry.has_vulnerabilities { "yes" } else { "no" }.to_string(),
            }
        })
        .collect();
    out.push_str(&styled(rows, markdown));

    let size: u64 = entries.iter().map(|e| e.size).sum();
    out.push_str(&format!("\nFiles: {}  Size: {} bytes\n", entries.len(), size));
    out
}
