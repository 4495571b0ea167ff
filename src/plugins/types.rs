use async_trait::async_trait;
use crate::core::errors::ExecError;
use crate::core::models::{Address, HostFinding, PlatformExtract, ProbeFindings, Proto, Service};

/// Raw result of one external command.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub command: String,
    pub output: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Open ports and service versions.
    Services,
    /// Operating-system fingerprinting.
    Platform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Smb,
    NetBios,
    Ldap,
}

impl ProbeKind {
    /// Order in which probes run against a host.
    pub const ALL: [ProbeKind; 3] = [ProbeKind::Smb, ProbeKind::NetBios, ProbeKind::Ldap];

    pub fn name(self) -> &'static str {
        match self {
            ProbeKind::Smb => "smb",
            ProbeKind::NetBios => "netbios",
            ProbeKind::Ldap => "ldap",
        }
    }

    /// Directory-service probing only makes sense once LDAP was seen open.
    pub fn applies_to(self, finding: &HostFinding) -> bool {
        match self {
            ProbeKind::Smb | ProbeKind::NetBios => true,
            ProbeKind::Ldap => {
                finding.has_open_port(389, Proto::Tcp) || finding.has_open_port(636, Proto::Tcp)
            }
        }
    }
}

/// Runs the port scanner. Returns the raw text even on a non-zero exit.
#[async_trait]
pub trait ScanTool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn scan(&self, address: Address, mode: ScanMode) -> Result<ToolOutput, ExecError>;
}

/// Turns scanner text into typed facts. Never fails: no match is an empty
/// result.
pub trait ScanExtractor: Send + Sync {
    fn extract_capabilities(&self, raw: &str) -> Vec<Service>;
    fn extract_platform(&self, raw: &str) -> PlatformExtract;
    fn extract_hostname(&self, raw: &str) -> Option<String>;
}

/// Follow-on probes for hosts whose platform warrants a closer look.
#[async_trait]
pub trait PlatformProbe: Send + Sync {
    async fn probe(&self, address: Address, kind: ProbeKind) -> Result<ToolOutput, ExecError>;
    fn extract(&self, kind: ProbeKind, raw: &str) -> ProbeFindings;
}
