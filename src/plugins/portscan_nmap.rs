use async_trait::async_trait;
use crate::config::NmapConfig;
use crate::core::errors::ExecError;
use crate::core::models::Address;
use crate::executors::command::execute;
use crate::plugins::types::{ScanMode, ScanTool, ToolOutput};
use std::time::Duration;

#[derive(Clone)]
pub struct NmapScanner {
    config: NmapConfig,
}

impl NmapScanner {
    pub fn new(config: NmapConfig) -> Self {
        Self { config }
    }

    /// Builds the argument list for one scan mode.
    pub fn build_args(&self, address: Address, mode: ScanMode) -> Vec<String> {
        let mut args = match mode {
            ScanMode::Services => {
                let mut args = self.config.service_args.clone();
                match &self.config.ports {
                    Some(ports) => args.extend(["-p".to_string(), ports.clone()]),
                    None => args.push("-F".to_string()),
                }
                if let Some(extra) = &self.config.extra_args {
                    match shell_words::split(extra) {
                        Ok(words) => args.extend(words),
                        Err(e) => tracing::warn!("Ignoring nmap extra_args {:?}: {}", extra, e),
                    }
                }
                args
            }
            ScanMode::Platform => self.config.platform_args.clone(),
        };

        args.push(address.to_string());
        args
    }

    fn limit(&self, mode: ScanMode) -> Duration {
        match mode {
            ScanMode::Services => self.config.service_timeout(),
            ScanMode::Platform => self.config.platform_timeout(),
        }
    }
}

#[async_trait]
impl ScanTool for NmapScanner {
    fn name(&self) -> &'static str {
        "nmap"
    }

    async fn scan(&self, address: Address, mode: ScanMode) -> Result<ToolOutput, ExecError> {
        let args = self.build_args(address, mode);
        let command_line = format!("{} {}", self.config.command, args.join(" "));
        tracing::info!("Running: {}", command_line);

        let result = execute(&self.config.command, &args, self.limit(mode)).await?;

        if !result.success() {
            tracing::warn!("{} exited with status {}", command_line, result.exit_code);
        }
        tracing::debug!("{} finished in {}ms", command_line, result.duration_ms);

        Ok(ToolOutput {
            command: command_line,
            output: result.combined(),
            exit_code: result.exit_code,
        })
    }
}
