use super::builder::contains_symbolic;
use crate::executors::command::execute;
use colored::Colorize;
use regex::Regex;
use std::io::{BufRead, Write};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

/// Returned by [`current_resolver`] when nothing could be determined.
pub const UNKNOWN_RESOLVER: &str = "unknown";

const RESOLV_CONF: &str = "/etc/resolv.conf";

/// Upper bound for each resolver introspection tool.
pub const QUERY_LIMIT: Duration = Duration::from_secs(10);

type Invocation<'a> = (&'a str, &'a [&'a str]);

const STATUS_TOOLS: &[Invocation<'static>] = &[("resolvectl", &["status"]), ("systemd-resolve", &["--status"])];

static NAMESERVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*nameserver\s+(\S+)").expect("valid nameserver regex"));
static DNS_SERVERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"DNS Servers?:\s*(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})").expect("valid dns regex")
});
static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})").expect("valid ipv4 regex")
});

/// Symbolic atoms go through DNS, and a wrong resolver puts the wrong
/// hosts in scope, so those specifications need an operator's yes.
pub fn requires_confirmation(spec: &str) -> bool {
    contains_symbolic(spec)
}

/// Best-effort lookup of the configured name server. Each helper tool
/// gets at most [`QUERY_LIMIT`].
pub async fn current_resolver() -> String {
    let found = if cfg!(windows) {
        from_ipconfig(QUERY_LIMIT).await
    } else {
        match from_resolv_conf() {
            Some(server) => Some(server),
            None => from_status_tools(STATUS_TOOLS, QUERY_LIMIT).await,
        }
    };

    found.unwrap_or_else(|| {
        warn!("Could not determine the configured DNS server");
        UNKNOWN_RESOLVER.to_string()
    })
}

fn from_resolv_conf() -> Option<String> {
    let content = std::fs::read_to_string(RESOLV_CONF).ok()?;
    parse_nameserver(&content)
}

/// stdout of `tool args`, or `None` if it could not run in time.
async fn query(tool: &str, args: &[&str], limit: Duration) -> Option<String> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    match execute(tool, &args, limit).await {
        Ok(result) => Some(result.stdout),
        Err(e) => {
            debug!("Resolver lookup skipped: {}", e);
            None
        }
    }
}

async fn from_status_tools(tools: &[Invocation<'_>], limit: Duration) -> Option<String> {
    for (tool, args) in tools {
        let Some(text) = query(tool, args, limit).await else {
            continue;
        };
        if let Some(cap) = DNS_SERVERS_RE.captures(&text) {
            return Some(cap[1].to_string());
        }
    }
    None
}

async fn from_ipconfig(limit: Duration) -> Option<String> {
    parse_ipconfig(&query("ipconfig", &["/all"], limit).await?)
}

fn parse_nameserver(content: &str) -> Option<String> {
    NAMESERVER_RE
        .captures(content)
        .map(|cap| cap[1].to_string())
}

/// The server list starts on the "DNS Servers" line and may continue on
/// the following lines.
fn parse_ipconfig(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.iter().position(|l| l.contains("DNS Server"))?;
    lines[start..lines.len().min(start + 5)]
        .iter()
        .find_map(|line| IPV4_RE.captures(line).map(|cap| cap[1].to_string()))
}

#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Yes,
    No,
    Unrecognized,
}

fn interpret(response: &str) -> Answer {
    match response.trim().to_ascii_lowercase().as_str() {
        "" | "n" | "no" => Answer::No,
        "y" | "yes" => Answer::Yes,
        _ => Answer::Unrecognized,
    }
}

/// Shows the specification and resolver, then waits for an explicit answer.
///
/// An empty line or end of input means no. Unrecognised answers ask again.
pub fn confirm<R, W>(spec: &str, resolver: &str, mut input: R, mut output: W) -> std::io::Result<bool>
where
    R: BufRead,
    W: Write,
{
    let rule = "=".repeat(70);
    writeln!(output)?;
    writeln!(output, "{}", rule.yellow())?;
    writeln!(output, "{}", "DNS SAFETY CHECK".yellow().bold())?;
    writeln!(output, "{}", rule.yellow())?;
    writeln!(output, "Target specification contains DNS records: {}", spec)?;
    writeln!(output, "Currently configured DNS server: {}", resolver.bold())?;
    writeln!(output)?;
    writeln!(
        output,
        "{} DNS misconfiguration could lead to scope violations.",
        "WARNING:".red().bold()
    )?;
    writeln!(output, "Please verify that the DNS server is correct before proceeding.")?;
    writeln!(output, "{}", rule.yellow())?;

    loop {
        write!(output, "\nProceed with enumeration? (y/N): ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            debug!("No answer on input, treating as no");
            return Ok(false);
        }

        match interpret(&line) {
            Answer::Yes => return Ok(true),
            Answer::No => return Ok(false),
            Answer::Unrecognized => {
                writeln!(
                    output,
                    "Please enter 'y' for yes or 'n' for no (or press Enter for No)."
                )?;
            }
        }
    }
}
