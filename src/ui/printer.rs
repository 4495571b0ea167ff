use crate::core::models::HostFinding;
use crate::core::state::ResultCollection;
use crate::executors::toolchain::ToolchainStatus;
use colored::*;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use std::path::PathBuf;

fn status_cell(host: &HostFinding) -> Cell {
    if host.is_failed() {
        Cell::new("failed").fg(Color::Red)
    } else {
        Cell::new("done").fg(Color::Green)
    }
}

/// One row per host, in address order.
pub fn summary_table(results: &ResultCollection) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Address").add_attribute(Attribute::Bold),
            Cell::new("Hostname").add_attribute(Attribute::Bold),
            Cell::new("Platform").add_attribute(Attribute::Bold),
            Cell::new("Services").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for host in results.hosts() {
        table.add_row(vec![
            Cell::new(host.address()),
            Cell::new(host.hostname().unwrap_or("-")),
            Cell::new(host.platform_kind()),
            Cell::new(host.services().len()),
            status_cell(host),
        ]);
    }

    table
}

pub fn print_toolchain_warnings(status: &ToolchainStatus) {
    if status.scanner_missing {
        eprintln!(
            "{} nmap was not found on PATH; hosts will be reported as failed",
            "warning:".yellow().bold()
        );
    }
    if !status.missing_probes.is_empty() {
        eprintln!(
            "{} optional probe tools missing: {}",
            "warning:".yellow().bold(),
            status.missing_probes.join(", ")
        );
    }
}

pub fn print_summary(results: &ResultCollection, written: &[PathBuf]) {
    println!("\n{}", "═══════════════════════════════════════".green().bold());
    println!("{}", "Host Enumeration Complete".green().bold());
    println!("{}", "═══════════════════════════════════════".green().bold());

    if results.is_empty() {
        println!("\n  No hosts were enumerated.");
    } else {
        println!("\n{}", summary_table(results));
    }

    let failed = results.failed_count();
    println!(
        "\n  Hosts: {}  Failed: {}",
        results.len().to_string().green().bold(),
        if failed > 0 {
            failed.to_string().red().bold()
        } else {
            failed.to_string().normal()
        }
    );

    for path in written {
        println!("  {} {}", "Written:".cyan().bold(), path.display());
    }
}
