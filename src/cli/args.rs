use clap::{ArgAction, Parser};
use std::path::PathBuf;

const AFTER_HELP: &str = "\
Target syntax (comma separated, mixed freely):
  192.168.1.10               single address
  192.168.1.0/24             range; network and broadcast are skipped
  dc01.corp.local            hostname, resolved with the system resolver

Examples:
  hostenum 192.168.1.10
  hostenum 192.168.1.0/24 -e 192.168.1.1,192.168.1.254
  hostenum 10.0.0.0/28,fileserver.lab -o reports/lab.md -j 4
  hostenum --write-config hostenum.toml

Hostnames trigger a confirmation prompt showing the DNS server in use, so a
name cannot silently resolve to a host outside the engagement.";

#[derive(Parser, Debug, Clone)]
#[command(name = "hostenum", version, about = "Enumerate hosts, services and platforms into a Markdown report", after_help = AFTER_HELP)]
pub struct Cli {
    /// Targets: addresses, CIDR ranges and hostnames, comma separated
    #[arg(value_name = "TARGETS", required_unless_present = "write_config")]
    pub targets: Option<String>,

    /// Targets to leave out, same syntax as TARGETS
    #[arg(short = 'e', long = "exclude", value_name = "TARGETS")]
    pub exclude: Option<String>,

    /// Report path (default: host_enumeration_report_<UTC time>.md)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Hosts enumerated at the same time
    #[arg(short = 'j', long = "jobs", value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Upper bound in seconds for the scan step of one host
    #[arg(long = "timeout", value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Also write a JSON summary next to the report
    #[arg(long = "json", action = ArgAction::SetTrue)]
    pub json: bool,

    /// Write the default configuration to FILE and exit
    #[arg(long = "write-config", value_name = "FILE")]
    pub write_config: Option<PathBuf>,

    /// Verbose human output
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Debug logs (implies verbose)
    #[arg(short = 'd', long = "debug", action = ArgAction::SetTrue)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_full_invocation() {
        let cli = Cli::try_parse_from([
            "hostenum",
            "10.0.0.0/30,dc01",
            "-e",
            "10.0.0.2",
            "-o",
            "out/report.md",
            "-j",
            "4",
            "--timeout",
            "90",
            "--json",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.targets.as_deref(), Some("10.0.0.0/30,dc01"));
        assert_eq!(cli.exclude.as_deref(), Some("10.0.0.2"));
        assert_eq!(cli.output, Some(PathBuf::from("out/report.md")));
        assert_eq!(cli.jobs, Some(4));
        assert_eq!(cli.timeout, Some(90));
        assert!(cli.json && cli.verbose && !cli.debug);
    }

    #[test]
    fn test_targets_required_unless_writing_config() {
        assert!(Cli::try_parse_from(["hostenum"]).is_err());
        assert!(Cli::try_parse_from(["hostenum", "--write-config", "h.toml"]).is_ok());
        assert!(Cli::try_parse_from(["hostenum", "10.0.0.1", "-j", "0"]).is_err());
    }
}
