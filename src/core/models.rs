use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

/// A validated IPv4 host address. Never carries a prefix.
pub type Address = Ipv4Addr;

/// Workgroup name reported by hosts that are not domain-joined.
pub const PLACEHOLDER_WORKGROUP: &str = "WORKGROUP";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    Tcp,
    Udp,
}

impl Proto {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Some(Proto::Tcp),
            "udp" => Some(Proto::Udp),
            _ => None,
        }
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proto::Tcp => f.write_str("tcp"),
            Proto::Udp => f.write_str("udp"),
        }
    }
}

/// A discovered service descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,    // e.g., "http", "microsoft-ds"
    pub port: u16,
    pub proto: Proto,
    pub version: Option<String>,
    pub state: String,   // "open" for everything the extractor keeps
}

impl Service {
    pub fn open(name: impl Into<String>, port: u16, proto: Proto) -> Self {
        Self {
            name: name.into(),
            port,
            proto,
            version: None,
            state: "open".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformKind {
    Windows,
    Linux,
    Unix,
    #[default]
    Unknown,
}

impl PlatformKind {
    pub fn is_specific(self) -> bool {
        self != PlatformKind::Unknown
    }

    /// Combines the current kind with newer evidence. A specific kind is
    /// never replaced by `Unknown`.
    pub fn refine(self, incoming: PlatformKind) -> PlatformKind {
        if incoming.is_specific() { incoming } else { self }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlatformKind::Windows => "Windows",
            PlatformKind::Linux => "Linux",
            PlatformKind::Unix => "Unix",
            PlatformKind::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Confidence tier of a fact. Unverified facts stay unverified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Verified,
    Unverified,
}

/// A command that was run against the host and its raw output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Evidence {
    pub command: String,
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

impl Evidence {
    pub fn new(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Platform facts pulled out of one scan pass. `kind` and `version` are
/// verified extractions; `notes` are hints.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformExtract {
    pub kind: Option<PlatformKind>,
    pub version: Option<String>,
    pub notes: Vec<String>,
}

/// Everything a single scan pass contributes to a finding.
#[derive(Clone, Debug)]
pub struct ScanPass {
    pub command: String,
    pub raw_output: String,
    pub services: Vec<Service>,
    pub platform: PlatformExtract,
}

/// Facts pulled out of one follow-on probe.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeFindings {
    pub details: BTreeMap<String, String>,
    pub name: Option<String>,
    pub domain: Option<String>,
    pub notes: Vec<String>,
}

/// Per-host enumeration state machine.
///
/// `Pending -> Scanning -> {Failed | Scanned} -> [PlatformProbing] -> Done`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostPhase {
    #[default]
    Pending,
    Scanning,
    Failed,
    Scanned,
    PlatformProbing,
    Done,
}

impl HostPhase {
    pub fn can_advance_to(self, next: HostPhase) -> bool {
        use HostPhase::*;
        matches!(
            (self, next),
            (Pending, Scanning)
                | (Scanning, Failed)
                | (Scanning, Scanned)
                | (Scanned, PlatformProbing)
                | (Scanned, Done)
                | (PlatformProbing, Done)
                | (Failed, Done)
        )
    }
}

/// One row of rendered facts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FactRow {
    pub label: String,
    pub value: String,
    pub confidence: Confidence,
}

/// Everything known about one resolved host.
///
/// The address is fixed at construction. Every other field is only ever
/// enriched: services, evidence and notes are append-only, details are
/// last-write-wins per label, and the platform kind never falls back to
/// `Unknown`.
#[derive(Clone, Debug, Serialize)]
pub struct HostFinding {
    address: Address,
    hostname: Option<String>,
    domain: Option<String>,
    platform_kind: PlatformKind,
    platform_version: Option<String>,
    services: Vec<Service>,
    platform_details: BTreeMap<String, String>,
    evidence: Vec<Evidence>,
    unverified_notes: Vec<String>,
    phase: HostPhase,
    failure: Option<String>,
}

impl HostFinding {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            hostname: None,
            domain: None,
            platform_kind: PlatformKind::Unknown,
            platform_version: None,
            services: Vec::new(),
            platform_details: BTreeMap::new(),
            evidence: Vec::new(),
            unverified_notes: Vec::new(),
            phase: HostPhase::Pending,
            failure: None,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn platform_kind(&self) -> PlatformKind {
        self.platform_kind
    }

    pub fn platform_version(&self) -> Option<&str> {
        self.platform_version.as_deref()
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn platform_details(&self) -> &BTreeMap<String, String> {
        &self.platform_details
    }

    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    pub fn unverified_notes(&self) -> &[String] {
        &self.unverified_notes
    }

    pub fn phase(&self) -> HostPhase {
        self.phase
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn has_open_port(&self, port: u16, proto: Proto) -> bool {
        self.services
            .iter()
            .any(|s| s.port == port && s.proto == proto)
    }

    /// Moves the state machine forward. Illegal transitions are logged and
    /// ignored so a misbehaving caller cannot rewind a finished host.
    pub fn advance(&mut self, next: HostPhase) {
        if self.phase.can_advance_to(next) {
            tracing::debug!("{}: {:?} -> {:?}", self.address, self.phase, next);
            self.phase = next;
        } else {
            tracing::warn!(
                "{}: ignoring illegal phase change {:?} -> {:?}",
                self.address,
                self.phase,
                next
            );
        }
    }

    /// Applies one scan pass. Services are appended without deduplication,
    /// so repeated passes stay visible.
    pub fn record_scan_result(&mut self, pass: ScanPass) {
        self.evidence.push(Evidence::new(pass.command, pass.raw_output));
        self.services.extend(pass.services);

        if let Some(kind) = pass.platform.kind {
            self.platform_kind = self.platform_kind.refine(kind);
        }
        if let Some(version) = pass.platform.version {
            self.platform_version = Some(version);
        }

        self.unverified_notes.extend(pass.platform.notes);
    }

    /// Merges auxiliary platform facts, last write wins per label.
    pub fn record_platform_details<I>(&mut self, details: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (label, value) in details {
            self.platform_details.insert(label, value);
        }
    }

    /// Overwrites identity with newer evidence. The default workgroup name
    /// is not a domain and is never stored as one.
    pub fn set_identity(&mut self, name: Option<String>, domain: Option<String>) {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            self.hostname = Some(name);
        }

        if let Some(domain) = domain.filter(|d| !d.trim().is_empty()) {
            if domain.eq_ignore_ascii_case(PLACEHOLDER_WORKGROUP) {
                tracing::debug!("{}: not using placeholder workgroup as domain", self.address);
            } else {
                self.domain = Some(domain);
            }
        }
    }

    pub fn record_evidence(&mut self, command: impl Into<String>, output: impl Into<String>) {
        self.evidence.push(Evidence::new(command, output));
    }

    pub fn note(&mut self, hint: impl Into<String>) {
        self.unverified_notes.push(hint.into());
    }

    /// Captures a failed step. Later failures do not hide the first one.
    pub fn mark_failed(&mut self, command: impl Into<String>, error: impl Into<String>) {
        let error = error.into();
        self.evidence.push(Evidence::new(command, error.clone()));
        self.unverified_notes.push(format!("Enumeration error: {}", error));
        if self.failure.is_none() {
            self.failure = Some(error);
        }
    }

    /// Flattens the finding into labelled rows for rendering.
    pub fn fact_rows(&self) -> Vec<FactRow> {
        let verified = |label: &str, value: String| FactRow {
            label: label.to_string(),
            value,
            confidence: Confidence::Verified,
        };

        let mut rows = vec![verified("IP Address", self.address.to_string())];

        if let Some(hostname) = &self.hostname {
            rows.push(verified("Hostname", hostname.clone()));
        }
        if let Some(domain) = &self.domain {
            rows.push(verified("Domain", domain.clone()));
        }
        if self.platform_kind.is_specific() {
            rows.push(verified("Operating System Type", self.platform_kind.to_string()));
        }
        if let Some(version) = &self.platform_version {
            rows.push(verified("Operating System Version", version.clone()));
        }
        if !self.services.is_empty() {
            let list = self
                .services
                .iter()
                .map(|s| format!("{} ({}/{})", s.name, s.port, s.proto))
                .collect::<Vec<_>>()
                .join(", ");
            rows.push(verified("Active Services", list));
        }
        for (label, value) in &self.platform_details {
            rows.push(verified(label, value.clone()));
        }

        rows.extend(self.unverified_notes.iter().map(|note| FactRow {
            label: "Note".to_string(),
            value: note.clone(),
            confidence: Confidence::Unverified,
        }));

        rows
    }
}
