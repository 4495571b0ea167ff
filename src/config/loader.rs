use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use super::types::{GlobalConfig, ToolConfig};

const CONFIG_FILE: &str = "hostenum.toml";
const SYSTEM_CONFIG: &str = "/etc/hostenum/hostenum.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration, preferring an explicit path. An explicit path
    /// that exists but does not parse is an error.
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<GlobalConfig> {
        if let Some(path) = custom_path {
            if path.exists() {
                return Self::load_from_file(path)
                    .with_context(|| format!("Failed to load config from custom path: {:?}", path));
            }
            tracing::warn!("Custom config path does not exist: {:?}, falling back to defaults", path);
        }

        for path in Self::default_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from: {:?}", path);
                    return Ok(config);
                }
                Err(e) => {
                    tracing::warn!("Failed to load config from {:?}: {:#}", path, e);
                }
            }
        }

        tracing::info!("No configuration file found, using default settings");
        Ok(GlobalConfig::default())
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dirs) = ProjectDirs::from("", "", "hostenum") {
            paths.push(dirs.config_dir().join(CONFIG_FILE));
        }
        paths.push(PathBuf::from(SYSTEM_CONFIG));
        paths
    }

    fn load_from_file(path: &Path) -> Result<GlobalConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: GlobalConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {:?}", path))?;

        Self::validate_config(&config)?;

        Ok(config)
    }

    pub fn validate_config(config: &GlobalConfig) -> Result<()> {
        if config.concurrency.max_hosts == 0 {
            anyhow::bail!("concurrency.max_hosts must be greater than 0");
        }

        if config.scan.host_timeout_secs == 0 {
            anyhow::bail!("scan.host_timeout_secs must be greater than 0");
        }

        if config.targets.max_range_hosts == 0 {
            anyhow::bail!("targets.max_range_hosts must be greater than 0");
        }

        let nmap = &config.tools.nmap;
        if nmap.command.is_empty() {
            anyhow::bail!("nmap command cannot be empty");
        }
        if nmap.service_timeout_ms == 0 || nmap.platform_timeout_ms == 0 {
            anyhow::bail!("nmap timeouts must be greater than 0");
        }
        if let Some(extra) = &nmap.extra_args {
            shell_words::split(extra)
                .with_context(|| format!("nmap extra_args is not valid shell syntax: {}", extra))?;
        }

        let probes = &config.tools.probes;
        let named: [(&str, &ToolConfig); 5] = [
            ("enum4linux", &probes.enum4linux),
            ("smbclient", &probes.smbclient),
            ("nmblookup", &probes.nmblookup),
            ("nbtscan", &probes.nbtscan),
            ("ldapsearch", &probes.ldapsearch),
        ];
        for (name, tool) in named {
            if tool.command.is_empty() {
                anyhow::bail!("{} command cannot be empty", name);
            }
            if tool.timeout_ms == 0 {
                anyhow::bail!("{} timeout_ms must be greater than 0", name);
            }
        }

        Ok(())
    }

    /// Write the built-in defaults as a starting point for a config file.
    pub fn generate_template(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&GlobalConfig::default())
            .context("Failed to serialize configuration to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = GlobalConfig::default();
        assert_eq!(config.concurrency.max_hosts, 1);
        assert_eq!(config.tools.nmap.command, "nmap");
        assert_eq!(config.tools.probes.smbclient.timeout_ms, 60_000);
        assert!(ConfigLoader::validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_custom_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
[concurrency]
max_hosts = 4

[scan]
host_timeout_secs = 90

[tools.nmap]
command = "/opt/nmap/bin/nmap"
ports = "22,80,443,445"
extra_args = "--script-timeout 30s"

[tools.probes.ldapsearch]
command = "ldapsearch"
timeout_ms = 5000
"#;
        fs::write(&temp_file, config_content).unwrap();

        let config = ConfigLoader::load_with_custom_path(Some(temp_file.path())).unwrap();
        assert_eq!(config.concurrency.max_hosts, 4);
        assert_eq!(config.scan.host_timeout_secs, 90);
        assert_eq!(config.tools.nmap.command, "/opt/nmap/bin/nmap");
        assert_eq!(config.tools.nmap.ports.as_deref(), Some("22,80,443,445"));
        assert_eq!(config.tools.probes.ldapsearch.timeout_ms, 5000);
        // Untouched sections keep their defaults.
        assert_eq!(config.tools.nmap.service_args[0], "-sV");
        assert_eq!(config.tools.probes.enum4linux.command, "enum4linux");
    }

    #[test]
    fn test_validation_errors() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(&temp_file, "[concurrency]\nmax_hosts = 0\n").unwrap();

        let result = ConfigLoader::load_with_custom_path(Some(temp_file.path()));
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("max_hosts must be greater than 0"));
    }

    #[test]
    fn test_bad_extra_args_rejected() {
        let mut config = GlobalConfig::default();
        config.tools.nmap.extra_args = Some("--script 'unterminated".to_string());
        assert!(ConfigLoader::validate_config(&config).is_err());
    }

    #[test]
    fn test_template_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostenum.toml");
        ConfigLoader::generate_template(&path).unwrap();

        let config = ConfigLoader::load_with_custom_path(Some(&path)).unwrap();
        assert_eq!(config.tools.probes.ldap_base_dns.len(), 3);
    }
}
