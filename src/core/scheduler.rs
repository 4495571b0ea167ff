use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::time::timeout;

use super::errors::ExecError;
use super::events::HostEvent;
use super::models::{Address, HostFinding, HostPhase, PlatformKind, ScanPass};
use super::state::ResultCollection;
use crate::config::GlobalConfig;
use crate::parser::NmapExtractor;
use crate::plugins::types::{PlatformProbe, ProbeKind, ScanExtractor, ScanMode, ScanTool};
use crate::plugins::{NmapScanner, WindowsProbe};
use crate::targets::TargetSet;

/// Platforms that get follow-on probing after the scan.
fn needs_platform_probing(kind: PlatformKind) -> bool {
    kind == PlatformKind::Windows
}

/// Drives each host through scan, optional platform probing and
/// collection. One host's failure never reaches another host.
pub struct Orchestrator {
    scanner: Arc<dyn ScanTool>,
    extractor: Arc<dyn ScanExtractor>,
    probe: Arc<dyn PlatformProbe>,
    scan_timeout: Duration,
    max_hosts: usize,
    events: Option<mpsc::UnboundedSender<HostEvent>>,
}

impl Orchestrator {
    pub fn new(
        scanner: Arc<dyn ScanTool>,
        extractor: Arc<dyn ScanExtractor>,
        probe: Arc<dyn PlatformProbe>,
    ) -> Self {
        let defaults = GlobalConfig::default();
        Self {
            scanner,
            extractor,
            probe,
            scan_timeout: defaults.scan.host_timeout(),
            max_hosts: defaults.concurrency.max_hosts,
            events: None,
        }
    }

    /// nmap for scanning, its text extractor, and the Windows probes.
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(
            Arc::new(NmapScanner::new(config.tools.nmap.clone())),
            Arc::new(NmapExtractor),
            Arc::new(WindowsProbe::new(config.tools.probes.clone())),
        )
        .with_scan_timeout(config.scan.host_timeout())
        .with_max_hosts(config.concurrency.max_hosts)
    }

    pub fn with_scan_timeout(mut self, scan_timeout: Duration) -> Self {
        self.scan_timeout = scan_timeout;
        self
    }

    pub fn with_max_hosts(mut self, max_hosts: usize) -> Self {
        self.max_hosts = max_hosts.max(1);
        self
    }

    pub fn with_events(mut self, sender: mpsc::UnboundedSender<HostEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: HostEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    /// Runs one host to `Done`. Always returns a finding, failed or not.
    pub async fn enumerate_host(&self, address: Address) -> HostFinding {
        tracing::info!("Starting enumeration of {}", address);
        self.emit(HostEvent::Started(address));

        let mut finding = HostFinding::new(address);
        finding.advance(HostPhase::Scanning);

        let outcome = timeout(self.scan_timeout, self.scan(&mut finding)).await;
        let scanned = match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!("Scan of {} failed: {}", address, e);
                finding.mark_failed(e.command_line(), e.to_string());
                false
            }
            Err(_) => {
                tracing::warn!("Scan of {} exceeded {:?}", address, self.scan_timeout);
                finding.mark_failed(
                    format!("{} {}", self.scanner.name(), address),
                    format!("scan step timed out after {}s", self.scan_timeout.as_secs()),
                );
                false
            }
        };

        if scanned {
            finding.advance(HostPhase::Scanned);
            if needs_platform_probing(finding.platform_kind()) {
                finding.advance(HostPhase::PlatformProbing);
                self.probe_platform(&mut finding).await;
            }
        } else {
            finding.advance(HostPhase::Failed);
        }

        finding.advance(HostPhase::Done);
        tracing::info!(
            "Finished {}: {} service(s), platform {}",
            address,
            finding.services().len(),
            finding.platform_kind()
        );
        finding
    }

    /// Service discovery, then fingerprinting. Facts from a pass are kept
    /// even if a later pass fails or the step times out.
    async fn scan(&self, finding: &mut HostFinding) -> Result<(), ExecError> {
        let address = finding.address();

        for mode in [ScanMode::Services, ScanMode::Platform] {
            let out = self.scanner.scan(address, mode).await?;

            if out.exit_code != 0 {
                finding.note(format!(
                    "{} exited with status {}; output may be partial",
                    out.command, out.exit_code
                ));
            }

            let services = match mode {
                ScanMode::Services => self.extractor.extract_capabilities(&out.output),
                ScanMode::Platform => Vec::new(),
            };
            if let Some(name) = self.extractor.extract_hostname(&out.output) {
                finding.set_identity(Some(name), None);
            }

            finding.record_scan_result(ScanPass {
                platform: self.extractor.extract_platform(&out.output),
                services,
                command: out.command,
                raw_output: out.output,
            });
        }

        Ok(())
    }

    async fn probe_platform(&self, finding: &mut HostFinding) {
        let address = finding.address();

        for kind in ProbeKind::ALL {
            if !kind.applies_to(finding) {
                tracing::debug!("Skipping {} probe for {}", kind.name(), address);
                continue;
            }

            match self.probe.probe(address, kind).await {
                Ok(out) => {
                    let found = self.probe.extract(kind, &out.output);
                    finding.record_evidence(out.command, out.output);
                    finding.record_platform_details(found.details);

                    // A probe-level name only fills a gap left by the scan.
                    let name = found.name.filter(|_| finding.hostname().is_none());
                    finding.set_identity(name, found.domain);

                    for note in found.notes {
                        finding.note(note);
                    }
                }
                Err(e) => {
                    tracing::warn!("{} probe of {} failed: {}", kind.name(), address, e);
                    finding.record_evidence(e.command_line(), e.to_string());
                    finding.note(format!("{} probe failed: {}", kind.name(), e));
                }
            }
        }
    }

    /// Enumerates every target with at most `max_hosts` in flight and
    /// returns the filled collection. The collection ends up with exactly
    /// one entry per target.
    pub async fn execute_all(self: Arc<Self>, targets: &TargetSet, results: ResultCollection) -> ResultCollection {
        let semaphore = Arc::new(Semaphore::new(self.max_hosts));
        let results = Arc::new(Mutex::new(results));

        tracing::info!(
            "Enumerating {} host(s), {} at a time",
            targets.len(),
            self.max_hosts
        );

        let tasks = targets.iter().map(|&address| {
            let this = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            let results = Arc::clone(&results);

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let finding = this.enumerate_host(address).await;
                this.emit(HostEvent::Finished {
                    address,
                    failed: finding.is_failed(),
                    services: finding.services().len(),
                });
                results.lock().await.insert(finding);
            });

            async move { (address, handle.await) }
        });

        for (address, joined) in join_all(tasks).await {
            if let Err(e) = joined {
                if e.is_panic() {
                    tracing::error!("Worker for {} panicked, recorded as failed; run continues", address);
                } else {
                    tracing::error!("Worker for {} died: {}", address, e);
                }
                let mut finding = HostFinding::new(address);
                finding.advance(HostPhase::Scanning);
                finding.mark_failed("worker", format!("enumeration task aborted: {}", e));
                finding.advance(HostPhase::Failed);
                finding.advance(HostPhase::Done);
                self.emit(HostEvent::Finished {
                    address,
                    failed: true,
                    services: 0,
                });
                results.lock().await.insert(finding);
            }
        }

        match Arc::try_unwrap(results) {
            Ok(mutex) => mutex.into_inner(),
            Err(shared) => {
                let mut guard = shared.lock().await;
                let start = guard.start_time();
                std::mem::replace(&mut *guard, ResultCollection::starting_at(start))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{PlatformExtract, ProbeFindings, Proto, Service};
    use crate::plugins::types::ToolOutput;
    use crate::targets::builder::tests::StaticResolver;
    use crate::targets::{subtract, TargetSetBuilder};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone)]
    enum Reply {
        Text(&'static str, i32),
        Fail,
        Hang,
        Panic,
    }

    /// Scripted scanner: one reply per mode, overridable per address.
    struct FakeScanner {
        services: Reply,
        platform: Reply,
        per_host: BTreeMap<Address, Reply>,
    }

    impl FakeScanner {
        fn new(services: Reply, platform: Reply) -> Self {
            Self {
                services,
                platform,
                per_host: BTreeMap::new(),
            }
        }
    }

    #[async_trait]
    impl ScanTool for FakeScanner {
        fn name(&self) -> &'static str {
            "fake-nmap"
        }

        async fn scan(&self, address: Address, mode: ScanMode) -> Result<ToolOutput, ExecError> {
            let reply = match (self.per_host.get(&address), mode) {
                (Some(reply), ScanMode::Services) => reply.clone(),
                (_, ScanMode::Services) => self.services.clone(),
                (_, ScanMode::Platform) => self.platform.clone(),
            };
            let command = format!("fake-nmap {:?} {}", mode, address);
            match reply {
                Reply::Text(output, exit_code) => Ok(ToolOutput {
                    command,
                    output: output.to_string(),
                    exit_code,
                }),
                Reply::Fail => Err(ExecError {
                    tool: "fake-nmap".to_string(),
                    args: vec![address.to_string()],
                    reason: "failed to spawn: No such file or directory".to_string(),
                    timed_out: false,
                    duration_ms: 1,
                }),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    unreachable!("scan step should have timed out")
                }
                Reply::Panic => panic!("scanner crashed"),
            }
        }
    }

    /// Understands tiny `key=value` lines instead of real nmap output.
    struct KeyValueExtractor;

    impl ScanExtractor for KeyValueExtractor {
        fn extract_capabilities(&self, raw: &str) -> Vec<Service> {
            raw.lines()
                .filter_map(|l| l.strip_prefix("port="))
                .filter_map(|p| p.parse().ok())
                .map(|port| Service::open("svc", port, Proto::Tcp))
                .collect()
        }

        fn extract_platform(&self, raw: &str) -> PlatformExtract {
            let kind = raw.lines().find_map(|l| match l {
                "os=windows" => Some(PlatformKind::Windows),
                "os=linux" => Some(PlatformKind::Linux),
                _ => None,
            });
            PlatformExtract {
                kind,
                version: None,
                notes: vec![],
            }
        }

        fn extract_hostname(&self, raw: &str) -> Option<String> {
            raw.lines()
                .find_map(|l| l.strip_prefix("name="))
                .map(str::to_string)
        }
    }

    #[derive(Default)]
    struct FakeProbe {
        calls: StdMutex<Vec<ProbeKind>>,
        failing: Vec<ProbeKind>,
    }

    #[async_trait]
    impl PlatformProbe for FakeProbe {
        async fn probe(&self, address: Address, kind: ProbeKind) -> Result<ToolOutput, ExecError> {
            self.calls.lock().unwrap().push(kind);
            if self.failing.contains(&kind) {
                return Err(ExecError {
                    tool: kind.name().to_string(),
                    args: vec![address.to_string()],
                    reason: "timed out after 30s".to_string(),
                    timed_out: true,
                    duration_ms: 30_000,
                });
            }
            Ok(ToolOutput {
                command: format!("{} {}", kind.name(), address),
                output: kind.name().to_string(),
                exit_code: 0,
            })
        }

        fn extract(&self, kind: ProbeKind, _raw: &str) -> ProbeFindings {
            let mut found = ProbeFindings::default();
            match kind {
                ProbeKind::Smb => {
                    found.details.insert("Domain/Workgroup".into(), "CORP".into());
                    found.domain = Some("CORP".into());
                    found.notes.push("OS Version is at least 10.0".into());
                }
                ProbeKind::NetBios => {
                    found.details.insert("NetBIOS Name".into(), "DC01".into());
                    found.name = Some("DC01".into());
                }
                ProbeKind::Ldap => {
                    found.details.insert("LDAP Domain".into(), "corp.local".into());
                    found.domain = Some("corp.local".into());
                }
            }
            found
        }
    }

    fn orchestrator(scanner: FakeScanner, probe: Arc<FakeProbe>) -> Orchestrator {
        Orchestrator::new(Arc::new(scanner), Arc::new(KeyValueExtractor), probe)
    }

    fn addr(last: u8) -> Address {
        Address::new(10, 0, 0, last)
    }

    #[tokio::test]
    async fn test_linux_host_skips_probing() {
        let probe = Arc::new(FakeProbe::default());
        let orch = orchestrator(
            FakeScanner::new(Reply::Text("port=22\nname=web01", 0), Reply::Text("os=linux", 0)),
            probe.clone(),
        );

        let finding = orch.enumerate_host(addr(1)).await;

        assert_eq!(finding.phase(), HostPhase::Done);
        assert_eq!(finding.platform_kind(), PlatformKind::Linux);
        assert_eq!(finding.hostname(), Some("web01"));
        assert_eq!(finding.services().len(), 1);
        assert_eq!(finding.evidence().len(), 2);
        assert!(!finding.is_failed());
        assert!(probe.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_windows_host_runs_probes_and_ldap_domain_wins() {
        let probe = Arc::new(FakeProbe::default());
        let orch = orchestrator(
            FakeScanner::new(Reply::Text("port=445\nport=389", 0), Reply::Text("os=windows", 0)),
            probe.clone(),
        );

        let finding = orch.enumerate_host(addr(10)).await;

        assert_eq!(
            *probe.calls.lock().unwrap(),
            vec![ProbeKind::Smb, ProbeKind::NetBios, ProbeKind::Ldap]
        );
        assert_eq!(finding.domain(), Some("corp.local"));
        assert_eq!(finding.hostname(), Some("DC01"));
        assert_eq!(finding.platform_details()["Domain/Workgroup"], "CORP");
        assert!(finding
            .unverified_notes()
            .contains(&"OS Version is at least 10.0".to_string()));
        // Two scan passes plus three probes.
        assert_eq!(finding.evidence().len(), 5);
    }

    #[tokio::test]
    async fn test_ldap_probe_needs_directory_port() {
        let probe = Arc::new(FakeProbe::default());
        let orch = orchestrator(
            FakeScanner::new(Reply::Text("port=445\nname=ws01", 0), Reply::Text("os=windows", 0)),
            probe.clone(),
        );

        let finding = orch.enumerate_host(addr(11)).await;

        assert_eq!(*probe.calls.lock().unwrap(), vec![ProbeKind::Smb, ProbeKind::NetBios]);
        assert_eq!(finding.domain(), Some("CORP"));
        // The scanned name is not replaced by the NetBIOS name.
        assert_eq!(finding.hostname(), Some("ws01"));
    }

    #[tokio::test]
    async fn test_probe_failure_does_not_stop_later_probes() {
        let probe = Arc::new(FakeProbe {
            failing: vec![ProbeKind::Smb],
            ..FakeProbe::default()
        });
        let orch = orchestrator(
            FakeScanner::new(Reply::Text("port=636", 0), Reply::Text("os=windows", 0)),
            probe.clone(),
        );

        let finding = orch.enumerate_host(addr(12)).await;

        assert_eq!(probe.calls.lock().unwrap().len(), 3);
        assert!(!finding.is_failed());
        assert_eq!(finding.phase(), HostPhase::Done);
        assert!(finding
            .unverified_notes()
            .iter()
            .any(|n| n.starts_with("smb probe failed")));
        assert_eq!(finding.domain(), Some("corp.local"));
    }

    #[tokio::test]
    async fn test_scan_timeout_still_yields_finding_with_evidence() {
        let orch = orchestrator(
            FakeScanner::new(Reply::Text("port=80", 0), Reply::Hang),
            Arc::new(FakeProbe::default()),
        )
        .with_scan_timeout(Duration::from_millis(100));

        let finding = orch.enumerate_host(addr(2)).await;

        assert!(finding.is_failed());
        assert_eq!(finding.phase(), HostPhase::Done);
        assert!(finding
            .evidence()
            .iter()
            .any(|e| e.output.contains("timed out")));
        // The service pass finished before the hang and is kept.
        assert!(finding.has_open_port(80, Proto::Tcp));
    }

    #[tokio::test]
    async fn test_tool_failure_marks_host_failed() {
        let orch = orchestrator(
            FakeScanner::new(Reply::Fail, Reply::Text("os=linux", 0)),
            Arc::new(FakeProbe::default()),
        );

        let finding = orch.enumerate_host(addr(3)).await;

        assert!(finding.is_failed());
        assert_eq!(finding.platform_kind(), PlatformKind::Unknown);
        assert_eq!(finding.evidence()[0].command, "fake-nmap 10.0.0.3");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_kept_as_a_note() {
        let orch = orchestrator(
            FakeScanner::new(Reply::Text("port=22", 1), Reply::Text("", 0)),
            Arc::new(FakeProbe::default()),
        );

        let finding = orch.enumerate_host(addr(4)).await;

        assert!(!finding.is_failed());
        assert!(finding.has_open_port(22, Proto::Tcp));
        assert!(finding.unverified_notes()[0].contains("exited with status 1"));
    }

    #[tokio::test]
    async fn test_every_target_is_collected_once_in_order() {
        let mut scanner = FakeScanner::new(Reply::Text("port=22", 0), Reply::Text("os=linux", 0));
        scanner.per_host.insert(addr(2), Reply::Fail);
        scanner.per_host.insert(addr(3), Reply::Panic);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let orch = Arc::new(
            orchestrator(scanner, Arc::new(FakeProbe::default()))
                .with_max_hosts(3)
                .with_events(tx),
        );

        let targets: TargetSet = [addr(4), addr(1), addr(3), addr(2)].into_iter().collect();
        let results = orch.execute_all(&targets, ResultCollection::new()).await;

        let keys: Vec<Address> = results.hosts().map(|h| h.address()).collect();
        assert_eq!(keys, vec![addr(1), addr(2), addr(3), addr(4)]);
        assert_eq!(results.failed_count(), 2);
        assert!(results
            .get(&addr(3))
            .unwrap()
            .failure()
            .unwrap()
            .contains("aborted"));

        let mut finished = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, HostEvent::Finished { .. }) {
                finished += 1;
            }
        }
        assert_eq!(finished, 4);
    }

    #[tokio::test]
    async fn test_excluded_address_is_not_enumerated() {
        let builder = TargetSetBuilder::new(StaticResolver::with(&[]));
        let targets = subtract(&builder.build_set("10.0.0.1,10.0.0.2"), &builder.build_set("10.0.0.2"));

        let orch = Arc::new(orchestrator(
            FakeScanner::new(Reply::Text("port=22", 0), Reply::Text("os=linux", 0)),
            Arc::new(FakeProbe::default()),
        ));
        let results = orch.execute_all(&targets, ResultCollection::new()).await;

        assert_eq!(results.len(), 1);
        assert!(results.contains(&addr(1)));
    }
}
