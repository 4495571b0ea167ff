//! Extraction for the SMB, NetBIOS and LDAP probe outputs.

use crate::core::models::ProbeFindings;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

fn line_pattern(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .expect("valid probe pattern")
}

static SMB_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| line_pattern(r"(?:Domain/Workgroup:|domain/workgroup name:)[ \t]*(\S.*)$"));
static SMB_COMPUTER: LazyLock<Regex> = LazyLock::new(|| line_pattern(r"Computer name:[ \t]*(\S.*)$"));
static SMB_OS_VERSION: LazyLock<Regex> = LazyLock::new(|| line_pattern(r"OS version:[ \t]*(\S.*)$"));
static SMB_USER: LazyLock<Regex> = LazyLock::new(|| line_pattern(r"user:\[([^\]]+)\]"));
static MAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:[0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}").expect("valid pattern"));
static DC_COMPONENT: LazyLock<Regex> = LazyLock::new(|| line_pattern(r"\bdc=([^,\s]+)"));
static NAMING_CONTEXT: LazyLock<Regex> = LazyLock::new(|| line_pattern(r"^namingContexts:[ \t]*(\S.*)$"));
static DEFAULT_CONTEXT: LazyLock<Regex> =
    LazyLock::new(|| line_pattern(r"^(?:defaultNamingContext|rootDomainNamingContext):[ \t]*(\S.*)$"));

const SHARE_TYPES: [&str; 3] = ["Disk", "IPC", "Printer"];

fn first_capture(re: &Regex, raw: &str) -> Option<String> {
    re.captures(raw)
        .map(|cap| cap[1].trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads the `Sharename Type Comment` table printed by smbclient and
/// enum4linux. Rows stop at the first blank or unrecognised line.
fn share_table(raw: &str) -> Vec<String> {
    let mut lines = raw.lines();
    let mut shares = Vec::new();

    while let Some(line) = lines.next() {
        let header: Vec<&str> = line.split_whitespace().collect();
        if header != ["Sharename", "Type", "Comment"] {
            continue;
        }

        let Some(rule) = lines.next() else { break };
        if !rule.trim_start().starts_with('-') {
            continue;
        }

        for row in lines.by_ref() {
            let mut cols = row.split_whitespace();
            match (cols.next(), cols.next()) {
                (Some(name), Some(kind)) if SHARE_TYPES.contains(&kind) => {
                    shares.push(format!("{} ({})", name, kind));
                }
                _ => break,
            }
        }
    }

    shares
}

pub fn parse_smb(raw: &str) -> ProbeFindings {
    let mut findings = ProbeFindings::default();

    if let Some(domain) = first_capture(&SMB_DOMAIN, raw) {
        findings.details.insert("Domain/Workgroup".to_string(), domain.clone());
        findings.domain = Some(domain);
    }

    if let Some(name) = first_capture(&SMB_COMPUTER, raw) {
        findings.details.insert("Computer Name".to_string(), name);
    }

    if let Some(version) = first_capture(&SMB_OS_VERSION, raw) {
        findings.notes.push(format!("OS Version is at least {}", version));
        findings.details.insert("OS Version".to_string(), version);
    }

    let shares = share_table(raw);
    if !shares.is_empty() {
        findings.details.insert("SMB Shares".to_string(), shares.join(", "));
    }

    let mut users: Vec<String> = Vec::new();
    for cap in SMB_USER.captures_iter(raw) {
        let user = cap[1].trim().to_string();
        if !users.contains(&user) {
            users.push(user);
        }
    }
    if !users.is_empty() {
        findings.details.insert("Users".to_string(), users.join(", "));
    }

    findings
}

/// Handles both the `nbtscan -v` (`<00> UNIQUE` / `<00> GROUP`) and the
/// `nmblookup -A` (`<00> -` / `<00> - <GROUP>`) name tables. A unique
/// workstation name only fills the host name when nothing better is known.
pub fn parse_netbios(raw: &str) -> ProbeFindings {
    let mut findings = ProbeFindings::default();

    for line in raw.lines() {
        let line = line.trim();
        if !line.contains("<00>") {
            continue;
        }
        let Some(name) = line.split_whitespace().next() else {
            continue;
        };

        if line.to_ascii_uppercase().contains("GROUP") {
            findings
                .details
                .entry("NetBIOS Domain".to_string())
                .or_insert_with(|| name.to_string());
        } else if !findings.details.contains_key("NetBIOS Name") {
            findings.details.insert("NetBIOS Name".to_string(), name.to_string());
            findings.name = Some(name.to_string());
        }
    }

    if let Some(mac) = MAC.find(raw) {
        findings.details.insert("MAC Address".to_string(), mac.as_str().to_string());
    }

    findings
}

/// Reads the root DSE. The domain comes from the default naming context
/// when the server advertises one, otherwise from the first context.
pub fn parse_ldap(raw: &str) -> ProbeFindings {
    let mut findings = ProbeFindings::default();

    let contexts: Vec<String> = NAMING_CONTEXT
        .captures_iter(raw)
        .map(|cap| cap[1].trim().to_string())
        .collect();

    let source = first_capture(&DEFAULT_CONTEXT, raw)
        .or_else(|| contexts.first().cloned())
        .or_else(|| {
            raw.lines()
                .find(|line| DC_COMPONENT.is_match(line))
                .map(str::to_string)
        });

    if let Some(dn) = source {
        let parts: Vec<&str> = DC_COMPONENT
            .captures_iter(&dn)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
            .collect();
        if !parts.is_empty() {
            let domain = parts.join(".");
            findings.details.insert("LDAP Domain".to_string(), domain.clone());
            findings.domain = Some(domain);
        }
    }

    if !contexts.is_empty() {
        findings.details.insert("Naming Contexts".to_string(), contexts.join(", "));
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ENUM4LINUX: &str = "\
 ==========================================
|    Getting domain SID for 10.0.0.10    |
 ==========================================
[+] Got domain/workgroup name: CORP
Domain/Workgroup: CORP
Computer name: DC01
OS version: 10.0

\tSharename       Type      Comment
\t---------       ----      -------
\tADMIN$          Disk      Remote Admin
\tC$              Disk      Default share
\tIPC$            IPC       Remote IPC
\tNETLOGON        Disk      Logon server share
Reconnecting with SMB1 for workgroup listing.
user:[Administrator] rid:[0x1f4]
user:[Guest] rid:[0x1f5]
user:[Administrator] rid:[0x1f4]
";

    #[test]
    fn test_smb_fields() {
        let findings = parse_smb(ENUM4LINUX);

        assert_eq!(findings.domain.as_deref(), Some("CORP"));
        assert_eq!(findings.details["Computer Name"], "DC01");
        assert_eq!(findings.details["OS Version"], "10.0");
        assert_eq!(
            findings.details["SMB Shares"],
            "ADMIN$ (Disk), C$ (Disk), IPC$ (IPC), NETLOGON (Disk)"
        );
        assert_eq!(findings.details["Users"], "Administrator, Guest");
        assert_eq!(findings.notes, vec!["OS Version is at least 10.0".to_string()]);
        assert_eq!(findings.name, None);
    }

    #[test]
    fn test_smb_workgroup_stays_a_detail() {
        let findings = parse_smb("Domain/Workgroup: WORKGROUP\n");
        assert_eq!(findings.details["Domain/Workgroup"], "WORKGROUP");
        // The finding itself refuses the placeholder as a domain.
        assert_eq!(findings.domain.as_deref(), Some("WORKGROUP"));
    }

    #[test]
    fn test_nmblookup_table() {
        let raw = "\
Looking up status of 10.0.0.10
\tDC01            <00> -         B <ACTIVE>
\tCORP            <00> - <GROUP> B <ACTIVE>
\tCORP            <1c> - <GROUP> B <ACTIVE>
\tDC01            <20> -         B <ACTIVE>

\tMAC Address = 00-0C-29-AB-CD-EF
";
        let findings = parse_netbios(raw);
        assert_eq!(findings.details["NetBIOS Name"], "DC01");
        assert_eq!(findings.details["NetBIOS Domain"], "CORP");
        assert_eq!(findings.details["MAC Address"], "00-0C-29-AB-CD-EF");
        assert_eq!(findings.name.as_deref(), Some("DC01"));
        assert_eq!(findings.domain, None);
    }

    #[test]
    fn test_nbtscan_table() {
        let raw = "\
NetBIOS Name Table for Host 10.0.0.30:

Name             Service          Type
----------------------------------------
FILESRV          <00>             UNIQUE
LAB              <00>             GROUP

Adapter address: 52:54:00:12:34:56
";
        let findings = parse_netbios(raw);
        assert_eq!(findings.details["NetBIOS Name"], "FILESRV");
        assert_eq!(findings.details["NetBIOS Domain"], "LAB");
        assert_eq!(findings.details["MAC Address"], "52:54:00:12:34:56");
    }

    #[test]
    fn test_ldap_root_dse() {
        let raw = "\
# extended LDIF
dn:
namingContexts: DC=corp,DC=local
namingContexts: CN=Configuration,DC=corp,DC=local
namingContexts: DC=DomainDnsZones,DC=corp,DC=local
defaultNamingContext: DC=corp,DC=local
";
        let findings = parse_ldap(raw);
        assert_eq!(findings.domain.as_deref(), Some("corp.local"));
        assert_eq!(findings.details["LDAP Domain"], "corp.local");
        assert_eq!(
            findings.details["Naming Contexts"],
            "DC=corp,DC=local, CN=Configuration,DC=corp,DC=local, DC=DomainDnsZones,DC=corp,DC=local"
        );
    }

    #[test]
    fn test_ldap_base_dn_search_without_contexts() {
        let findings = parse_ldap("dn: dc=lab,dc=example\nobjectClass: top\n");
        assert_eq!(findings.domain.as_deref(), Some("lab.example"));
        assert!(!findings.details.contains_key("Naming Contexts"));
    }

    #[test]
    fn test_unrelated_output_yields_nothing() {
        let raw = "ldap_sasl_bind(SIMPLE): Can't contact LDAP server (-1)\n";
        assert_eq!(parse_smb(raw), ProbeFindings::default());
        assert_eq!(parse_netbios(raw), ProbeFindings::default());
        assert_eq!(parse_ldap(raw), ProbeFindings::default());
    }
}
