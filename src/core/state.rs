use super::models::{Address, HostFinding};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// All findings of one run, keyed by address.
///
/// Iteration is always in address order regardless of the order hosts
/// finished in.
#[derive(Debug, Serialize)]
pub struct ResultCollection {
    start_time: DateTime<Utc>,
    hosts: BTreeMap<Address, HostFinding>,
}

impl ResultCollection {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            hosts: BTreeMap::new(),
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Inserts a finished host. An existing entry for the same address is
    /// replaced, not merged, and returned.
    pub fn insert(&mut self, finding: HostFinding) -> Option<HostFinding> {
        let previous = self.hosts.insert(finding.address(), finding);
        if let Some(prev) = &previous {
            tracing::warn!("Replacing earlier result for {}", prev.address());
        }
        previous
    }

    pub fn get(&self, address: &Address) -> Option<&HostFinding> {
        self.hosts.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.hosts.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostFinding> {
        self.hosts.values()
    }

    pub fn failed_count(&self) -> usize {
        self.hosts.values().filter(|h| h.is_failed()).count()
    }
}

impl Default for ResultCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_replaces_instead_of_merging() {
        let mut results = ResultCollection::new();
        let addr = Address::new(192, 168, 1, 10);

        let mut first = HostFinding::new(addr);
        first.note("first attempt");
        assert!(results.insert(first).is_none());

        let second = HostFinding::new(addr);
        let replaced = results.insert(second).unwrap();

        assert_eq!(replaced.unverified_notes().len(), 1);
        assert_eq!(results.len(), 1);
        assert!(results.get(&addr).unwrap().unverified_notes().is_empty());
    }

    #[test]
    fn test_iteration_is_in_address_order() {
        let mut results = ResultCollection::new();
        for last in [30u8, 2, 17] {
            results.insert(HostFinding::new(Address::new(10, 0, 0, last)));
        }

        let order: Vec<String> = results.hosts().map(|h| h.address().to_string()).collect();
        assert_eq!(order, vec!["10.0.0.2", "10.0.0.17", "10.0.0.30"]);
    }

    #[test]
    fn test_start_time_is_fixed() {
        let start = Utc.with_ymd_and_hms(2025, 11, 3, 14, 5, 0).unwrap();
        let mut results = ResultCollection::starting_at(start);
        results.insert(HostFinding::new(Address::new(10, 0, 0, 1)));

        assert_eq!(results.start_time(), start);
    }

    #[test]
    fn test_failed_count() {
        let mut results = ResultCollection::new();
        let mut bad = HostFinding::new(Address::new(10, 0, 0, 1));
        bad.mark_failed("nmap", "timed out");
        results.insert(bad);
        results.insert(HostFinding::new(Address::new(10, 0, 0, 2)));

        assert_eq!(results.failed_count(), 1);
    }
}
