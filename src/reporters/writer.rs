use crate::core::models::{Confidence, FactRow, HostFinding};
use crate::core::state::ResultCollection;
use crate::utils::fs::atomic_write;
use crate::utils::time::{default_report_name, format_duration, format_utc};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use minijinja::{context, Environment};
use serde::Serialize;
use std::path::{Path, PathBuf};

const REPORT_TEMPLATE: &str = include_str!("../../report_templates/host_report.md.j2");

#[derive(Serialize)]
struct EvidenceView {
    command: String,
    output: String,
    timestamp: String,
    fence: String,
}

#[derive(Serialize)]
struct HostView {
    title: String,
    heading: String,
    anchor: String,
    verified: Vec<FactRow>,
    notes: Vec<String>,
    evidence: Vec<EvidenceView>,
}

/// Escapes a value for a single Markdown table cell.
fn cell(value: String) -> String {
    value
        .replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

/// A code fence longer than any backtick run inside `body`.
fn fence_for(body: &str) -> String {
    let longest = body
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

/// GitHub-style heading anchor.
fn anchor(heading: &str) -> String {
    heading
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

fn host_view(number: usize, host: &HostFinding) -> HostView {
    let title = match host.hostname() {
        Some(name) => format!("{} ({})", host.address(), name),
        None => host.address().to_string(),
    };
    let heading = format!("Host {}: {}", number, title);

    let (verified, unverified): (Vec<FactRow>, Vec<FactRow>) = host
        .fact_rows()
        .into_iter()
        .partition(|row| row.confidence == Confidence::Verified);

    HostView {
        anchor: anchor(&heading),
        title,
        heading,
        verified,
        notes: unverified.into_iter().map(|row| row.value).collect(),
        evidence: host
            .evidence()
            .iter()
            .map(|e| EvidenceView {
                command: e.command.clone(),
                fence: fence_for(&e.output),
                output: e.output.clone(),
                timestamp: format_utc(e.timestamp),
            })
            .collect(),
    }
}

fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_filter("cell", cell);
    env.add_template("host_report.md", REPORT_TEMPLATE)
        .context("Failed to load report template")?;
    Ok(env)
}

/// Renders the Markdown report. Hosts appear in address order.
pub fn render(results: &ResultCollection, end_time: DateTime<Utc>) -> Result<String> {
    let env = environment()?;
    let template = env.get_template("host_report.md")?;

    let hosts: Vec<HostView> = results
        .hosts()
        .enumerate()
        .map(|(i, host)| host_view(i + 1, host))
        .collect();

    let rendered = template
        .render(context! {
            start_time => format_utc(results.start_time()),
            host_count => results.len(),
            hosts => hosts,
            end_time => format_utc(end_time),
            duration => format_duration(end_time - results.start_time()),
            version => env!("CARGO_PKG_VERSION"),
        })
        .context("Failed to render report")?;

    Ok(rendered + "\n")
}

/// `host_enumeration_report_<UTC stamp>.md` in the working directory.
pub fn default_report_path(now: DateTime<Utc>) -> PathBuf {
    let name = default_report_name(now);
    std::env::current_dir()
        .map(|dir| dir.join(&name))
        .unwrap_or_else(|_| PathBuf::from(name))
}

/// Writes the report (and optionally a JSON summary next to it). Returns
/// the paths written, Markdown first.
pub fn write_all(results: &ResultCollection, path: &Path, json_summary: bool) -> Result<Vec<PathBuf>> {
    let content = render(results, Utc::now())?;
    atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write report to {:?}", path))?;
    tracing::info!("Report written to {:?}", path);

    let mut written = vec![path.to_path_buf()];

    if json_summary {
        let json_path = path.with_extension("json");
        let json = serde_json::to_string_pretty(results)?;
        atomic_write(&json_path, json.as_bytes())
            .with_context(|| format!("Failed to write JSON summary to {:?}", json_path))?;
        written.push(json_path);
    }

    Ok(written)
}
