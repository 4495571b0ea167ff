use anyhow::{bail, Context, Result};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use std::fs;
use std::path::Path;

/// Texts of all level-two headings that introduce a host section.
pub fn host_headings(markdown: &str) -> Vec<String> {
    let mut headings = Vec::new();
    let mut current: Option<String> = None;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { level: HeadingLevel::H2, .. }) => {
                current = Some(String::new());
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(HeadingLevel::H2)) => {
                if let Some(text) = current.take() {
                    if text.starts_with("Host ") {
                        headings.push(text);
                    }
                }
            }
            _ => {}
        }
    }

    headings
}

/// Re-reads a written report and checks it has one section per host.
pub fn validate_report(path: &Path, expected_hosts: usize) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Report file missing or unreadable: {:?}", path))?;

    if content.trim().is_empty() {
        bail!("Report file is empty: {:?}", path);
    }

    let found = host_headings(&content).len();
    if found != expected_hosts {
        bail!(
            "Report {:?} has {} host section(s), expected {}",
            path,
            found,
            expected_hosts
        );
    }

    tracing::info!("Report validated: {} host section(s)", found);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Address, HostFinding};
    use crate::core::state::ResultCollection;
    use crate::reporters::writer::write_all;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_headings_inside_code_blocks_do_not_count() {
        let md = "# Report\n\n## Host 1: 10.0.0.1\n\n```\n## Host 9: fake\n```\n\n## Report Summary\n";
        assert_eq!(host_headings(md), vec!["Host 1: 10.0.0.1".to_string()]);
    }

    #[test]
    fn test_written_report_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");

        let mut results = ResultCollection::new();
        for last in 1..=3 {
            let mut host = HostFinding::new(Address::new(10, 0, 0, last));
            host.record_evidence("nmap -sV", "## Host 99: not a heading");
            results.insert(host);
        }
        write_all(&results, &path, false).unwrap();

        assert!(validate_report(&path, 3).is_ok());
        assert!(validate_report(&path, 4).is_err());
    }

    #[test]
    fn test_empty_or_missing_report_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        assert!(validate_report(&path, 0).is_err());

        std::fs::write(&path, "  \n").unwrap();
        assert!(validate_report(&path, 0).is_err());
    }
}
