use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::targets::resolver::DEFAULT_MAX_RANGE_HOSTS;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub concurrency: ConcurrencyConfig,
    pub scan: ScanConfig,
    pub targets: TargetsConfig,
    pub tools: ToolsConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Hosts enumerated at once. 1 keeps the run sequential.
    pub max_hosts: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { max_hosts: 1 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound for the whole scanning step of one host.
    pub host_timeout_secs: u64,
}

impl ScanConfig {
    pub fn host_timeout(&self) -> Duration {
        Duration::from_secs(self.host_timeout_secs)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            host_timeout_secs: 1200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetsConfig {
    pub max_range_hosts: usize,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            max_range_hosts: DEFAULT_MAX_RANGE_HOSTS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    pub command: String,
    pub timeout_ms: u64,
}

impl ToolConfig {
    fn new(command: &str, timeout_secs: u64) -> Self {
        Self {
            command: command.to_string(),
            timeout_ms: timeout_secs * 1000,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self::new("", 60)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NmapConfig {
    pub command: String,
    pub service_args: Vec<String>,
    /// `-p` value; `None` means nmap's fast top-ports scan (`-F`).
    pub ports: Option<String>,
    /// Extra arguments appended to the service scan, shell-quoted.
    pub extra_args: Option<String>,
    pub platform_args: Vec<String>,
    pub service_timeout_ms: u64,
    pub platform_timeout_ms: u64,
}

impl NmapConfig {
    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }

    pub fn platform_timeout(&self) -> Duration {
        Duration::from_millis(self.platform_timeout_ms)
    }
}

impl Default for NmapConfig {
    fn default() -> Self {
        Self {
            command: "nmap".to_string(),
            service_args: ["-sV", "-sC", "-T4", "--open", "-Pn"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ports: None,
            extra_args: None,
            platform_args: ["-O", "--osscan-guess", "-T4", "-Pn"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            service_timeout_ms: 600_000,
            platform_timeout_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeToolsConfig {
    /// Base DNs tried when the anonymous root DSE query fails.
    pub ldap_base_dns: Vec<String>,
    pub enum4linux: ToolConfig,
    pub smbclient: ToolConfig,
    pub nmblookup: ToolConfig,
    pub nbtscan: ToolConfig,
    pub ldapsearch: ToolConfig,
}

impl Default for ProbeToolsConfig {
    fn default() -> Self {
        Self {
            ldap_base_dns: vec![
                "dc=example,dc=com".to_string(),
                "dc=domain,dc=local".to_string(),
                "dc=corp,dc=local".to_string(),
            ],
            enum4linux: ToolConfig::new("enum4linux", 300),
            smbclient: ToolConfig::new("smbclient", 60),
            nmblookup: ToolConfig::new("nmblookup", 30),
            nbtscan: ToolConfig::new("nbtscan", 30),
            ldapsearch: ToolConfig::new("ldapsearch", 60),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub nmap: NmapConfig,
    pub probes: ProbeToolsConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Also write `<report>.json` next to the Markdown report.
    pub json_summary: bool,
}
