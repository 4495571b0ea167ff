use async_trait::async_trait;
use crate::config::{ProbeToolsConfig, ToolConfig};
use crate::core::errors::ExecError;
use crate::core::models::{Address, ProbeFindings};
use crate::executors::command::execute;
use crate::parser::windows::{parse_ldap, parse_netbios, parse_smb};
use crate::plugins::types::{PlatformProbe, ProbeKind, ToolOutput};
use tracing::{debug, info};

/// SMB, NetBIOS and LDAP enumeration of Windows hosts. Each probe has a
/// fallback tool that runs when the preferred one gives nothing useful.
#[derive(Clone)]
pub struct WindowsProbe {
    config: ProbeToolsConfig,
}

async fn run(tool: &ToolConfig, args: Vec<String>) -> Result<ToolOutput, ExecError> {
    let command_line = format!("{} {}", tool.command, args.join(" "));
    info!("Running: {}", command_line);

    let result = execute(&tool.command, &args, tool.timeout()).await?;
    debug!("{} finished in {}ms", command_line, result.duration_ms);
    Ok(ToolOutput {
        command: command_line,
        output: result.combined(),
        exit_code: result.exit_code,
    })
}

fn text(result: &Result<ToolOutput, ExecError>) -> String {
    match result {
        Ok(out) => out.output.clone(),
        Err(e) => e.to_string(),
    }
}

fn command(result: &Result<ToolOutput, ExecError>) -> String {
    match result {
        Ok(out) => out.command.clone(),
        Err(e) => e.command_line(),
    }
}

/// Joins a failed primary attempt and its fallback into one piece of
/// evidence. Only when both tools could not run at all is it an error.
fn combine(
    primary_name: &str,
    primary: Result<ToolOutput, ExecError>,
    fallback_name: &str,
    fallback: Result<ToolOutput, ExecError>,
) -> Result<ToolOutput, ExecError> {
    if let (Err(_), Err(e)) = (&primary, &fallback) {
        debug!("{} and {} both unavailable", primary_name, fallback_name);
        return Err(e.clone());
    }

    let exit_code = match &fallback {
        Ok(out) => out.exit_code,
        Err(_) => primary.as_ref().map(|o| o.exit_code).unwrap_or(-1),
    };

    Ok(ToolOutput {
        command: format!("{} || {}", command(&primary), command(&fallback)),
        output: format!(
            "=== {} output ===\n{}\n\n=== {} output ===\n{}",
            primary_name,
            text(&primary),
            fallback_name,
            text(&fallback)
        ),
        exit_code,
    })
}

impl WindowsProbe {
    pub fn new(config: ProbeToolsConfig) -> Self {
        Self { config }
    }

    async fn smb(&self, address: Address) -> Result<ToolOutput, ExecError> {
        let target = address.to_string();
        let primary = run(&self.config.enum4linux, vec!["-a".into(), target.clone()]).await;

        // enum4linux often exits non-zero after printing useful tables.
        if let Ok(out) = &primary {
            if out.exit_code == 0 || out.output.contains("DOMAIN") || out.output.contains("WORKGROUP") {
                return primary;
            }
        }

        info!("enum4linux gave nothing usable for {}, trying smbclient", address);
        let fallback = run(&self.config.smbclient, vec!["-L".into(), target, "-N".into()]).await;
        combine("enum4linux", primary, "smbclient", fallback)
    }

    async fn netbios(&self, address: Address) -> Result<ToolOutput, ExecError> {
        let target = address.to_string();
        let primary = run(&self.config.nmblookup, vec!["-A".into(), target.clone()]).await;

        if matches!(&primary, Ok(out) if out.exit_code == 0) {
            return primary;
        }

        let fallback = run(&self.config.nbtscan, vec![target]).await;
        combine("nmblookup", primary, "nbtscan", fallback)
    }

    async fn ldap(&self, address: Address) -> Result<ToolOutput, ExecError> {
        let uri = format!("ldap://{}", address);
        let base_args = vec!["-x".to_string(), "-H".to_string(), uri.clone()];

        let mut root_dse = base_args.clone();
        root_dse.extend(["-s".to_string(), "base".to_string()]);
        let first = run(&self.config.ldapsearch, root_dse).await;

        if matches!(&first, Ok(out) if out.exit_code == 0) {
            return first;
        }

        for base_dn in &self.config.ldap_base_dns {
            let mut args = base_args.clone();
            args.extend(["-b".to_string(), base_dn.clone(), "-s".to_string(), "base".to_string()]);
            match run(&self.config.ldapsearch, args).await {
                Ok(out) if out.exit_code == 0 => return Ok(out),
                Ok(_) => debug!("LDAP base {} rejected by {}", base_dn, address),
                // A missing binary will not appear on the next attempt.
                Err(e) if !e.timed_out => return first.or(Err(e)),
                Err(e) => debug!("LDAP base {} on {}: {}", base_dn, address, e),
            }
        }

        first
    }
}

#[async_trait]
impl PlatformProbe for WindowsProbe {
    async fn probe(&self, address: Address, kind: ProbeKind) -> Result<ToolOutput, ExecError> {
        match kind {
            ProbeKind::Smb => self.smb(address).await,
            ProbeKind::NetBios => self.netbios(address).await,
            ProbeKind::Ldap => self.ldap(address).await,
        }
    }

    fn extract(&self, kind: ProbeKind, raw: &str) -> ProbeFindings {
        match kind {
            ProbeKind::Smb => parse_smb(raw),
            ProbeKind::NetBios => parse_netbios(raw),
            ProbeKind::Ldap => parse_ldap(raw),
        }
    }
}
