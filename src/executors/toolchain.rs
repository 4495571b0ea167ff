use crate::config::GlobalConfig;
use which::which;

/// Result of looking up the configured tools on `PATH`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ToolchainStatus {
    pub scanner_missing: bool,
    pub missing_probes: Vec<String>,
}

impl ToolchainStatus {
    pub fn is_complete(&self) -> bool {
        !self.scanner_missing && self.missing_probes.is_empty()
    }
}

fn present(command: &str) -> bool {
    match which(command) {
        Ok(path) => {
            tracing::debug!("Found {}: {:?}", command, path);
            true
        }
        Err(_) => false,
    }
}

/// Warns about missing tools without stopping the run. A missing scanner
/// makes every host fail individually; a missing probe tool only loses
/// that probe's details.
pub fn check(config: &GlobalConfig) -> ToolchainStatus {
    let mut status = ToolchainStatus::default();

    let nmap = &config.tools.nmap.command;
    if !present(nmap) {
        tracing::warn!("{} not found on PATH; every host scan will fail", nmap);
        status.scanner_missing = true;
    }

    let probes = &config.tools.probes;
    for tool in [
        &probes.enum4linux,
        &probes.smbclient,
        &probes.nmblookup,
        &probes.nbtscan,
        &probes.ldapsearch,
    ] {
        if !present(&tool.command) {
            status.missing_probes.push(tool.command.clone());
        }
    }

    if status.missing_probes.is_empty() {
        tracing::info!("All probe tools found");
    } else {
        tracing::warn!(
            "Probe tools not found: {}. Windows hosts will have fewer details",
            status.missing_probes.join(", ")
        );
    }

    status
}
