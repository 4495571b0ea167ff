use crate::core::models::{PlatformExtract, PlatformKind, Proto, Service};
use crate::plugins::types::ScanExtractor;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;
use tracing::debug;

fn ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("valid nmap pattern")
}

static PORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| ci(r"(\d+)/(tcp|udp)\s+(\w+)\s+(\S+)(?:\s+(.+))?"));
static REPORT_FOR: LazyLock<Regex> = LazyLock::new(|| ci(r"Nmap scan report for\s+([^\s(]+)"));
static NAME_WITH_IP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9.-]+)\s+\((\d+\.\d+\.\d+\.\d+)\)").expect("valid pattern"));
static DOTTED_QUAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("valid pattern"));
static WINDOWS_VERSION_HINT: LazyLock<Regex> =
    LazyLock::new(|| ci(r"Windows\s+(Server\s+)?(\d{4}|\d+\.\d+)"));

/// Platform patterns, tried family by family. A capture group, when
/// present, is the version.
static WINDOWS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"Windows\s+(\d+\.?\d*|Server\s+\d{4}|XP|Vista|7|8|10|11)",
        r"Microsoft\s+Windows\s+(\d+\.?\d*|Server\s+\d{4}|XP|Vista|7|8|10|11)",
        r"Win32",
        r"\bWindows\b",
    ]
    .iter()
    .map(|p| ci(p))
    .collect()
});
static LINUX: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"Linux\s+(\d+\.\d+\.\d+)",
        r"Ubuntu\s+(\d+\.\d+)",
        r"Debian\s+(\d+)",
        r"CentOS\s+(\d+)",
        r"Red\s+Hat\s+(\d+)",
        r"\bLinux\b",
    ]
    .iter()
    .map(|p| ci(p))
    .collect()
});
static UNIX: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"Unix", r"FreeBSD", r"OpenBSD", r"NetBSD", r"Solaris"]
        .iter()
        .map(|p| ci(p))
        .collect()
});

/// Extracts facts from nmap's normal (human-readable) output.
#[derive(Clone, Copy, Debug, Default)]
pub struct NmapExtractor;

impl NmapExtractor {
    fn first_match(patterns: &[Regex], raw: &str) -> Option<Option<String>> {
        patterns.iter().find_map(|re| {
            re.captures(raw)
                .map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        })
    }

    /// Returns the platform family and, when the pattern carries one, a
    /// version string.
    pub fn detect_platform(raw: &str) -> Option<(PlatformKind, Option<String>)> {
        if let Some(version) = Self::first_match(&WINDOWS, raw) {
            return Some((PlatformKind::Windows, version));
        }
        if let Some(version) = Self::first_match(&LINUX, raw) {
            return Some((PlatformKind::Linux, version));
        }
        if UNIX.iter().any(|re| re.is_match(raw)) {
            return Some((PlatformKind::Unix, None));
        }
        None
    }

    /// Free-text OS hints. These are guesses and stay unverified.
    pub fn platform_notes(raw: &str) -> Vec<String> {
        let mut notes = Vec::new();

        for line in raw.lines().map(str::trim) {
            if let Some(details) = line.strip_prefix("OS details:") {
                let details = details.trim();
                if details.is_empty() {
                    continue;
                }
                if WINDOWS_VERSION_HINT.is_match(details) {
                    notes.push(format!("OS version appears to be {}", details));
                } else {
                    notes.push(format!("OS details: {}", details));
                }
            } else if let Some(guesses) = line.strip_prefix("Aggressive OS guesses:") {
                notes.push(format!("OS guesses: {}", guesses.trim()));
            } else if let Some(cpe) = line.strip_prefix("OS CPE:") {
                notes.push(format!("OS CPE: {}", cpe.trim()));
            }
        }

        notes
    }
}

impl ScanExtractor for NmapExtractor {
    fn extract_capabilities(&self, raw: &str) -> Vec<Service> {
        let services: Vec<Service> = raw
            .lines()
            .filter_map(|line| PORT_LINE.captures(line))
            .filter(|cap| cap[3].eq_ignore_ascii_case("open"))
            .filter_map(|cap| {
                let port = cap[1].parse::<u16>().ok()?;
                let proto = Proto::parse(&cap[2])?;
                Some(Service {
                    name: cap[4].to_string(),
                    port,
                    proto,
                    version: cap
                        .get(5)
                        .map(|m| m.as_str().trim().to_string())
                        .filter(|v| !v.is_empty()),
                    state: "open".to_string(),
                })
            })
            .collect();

        debug!("Extracted {} open services", services.len());
        services
    }

    fn extract_platform(&self, raw: &str) -> PlatformExtract {
        let (kind, version) = match Self::detect_platform(raw) {
            Some((kind, version)) => (Some(kind), version),
            None => (None, None),
        };

        PlatformExtract {
            kind,
            version,
            notes: Self::platform_notes(raw),
        }
    }

    fn extract_hostname(&self, raw: &str) -> Option<String> {
        if let Some(cap) = REPORT_FOR.captures(raw) {
            let name = &cap[1];
            return if DOTTED_QUAD.is_match(name) {
                None
            } else {
                Some(name.to_string())
            };
        }

        NAME_WITH_IP.captures(raw).map(|cap| cap[1].to_string())
    }
}
