//! Turns comma-separated target specifications into address sets.
//!
//! Each atom is handled on its own: a bad or unresolvable atom is dropped
//! with a warning and the rest of the specification still counts.

use super::resolver::{self, NameResolver, SystemResolver, DEFAULT_MAX_RANGE_HOSTS};
use crate::core::models::Address;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// A deduplicated set of addresses, iterated in ascending order.
pub type TargetSet = BTreeSet<Address>;

/// One comma-delimited unit of a specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Atom<'a> {
    Range(&'a str),
    Literal(Address),
    Symbolic(&'a str),
}

impl<'a> Atom<'a> {
    /// Classifies a trimmed, non-empty atom. Anything with a prefix
    /// separator is a range, whether or not it is well formed.
    pub fn classify(s: &'a str) -> Self {
        if s.contains('/') {
            Atom::Range(s)
        } else if let Ok(addr) = s.parse::<Address>() {
            Atom::Literal(addr)
        } else {
            Atom::Symbolic(s)
        }
    }
}

/// Splits a specification into classified atoms, skipping empty ones.
pub fn atoms(spec: &str) -> impl Iterator<Item = Atom<'_>> {
    spec.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Atom::classify)
}

/// True when any atom would need a name lookup. Performs no lookups.
pub fn contains_symbolic(spec: &str) -> bool {
    atoms(spec).any(|atom| matches!(atom, Atom::Symbolic(_)))
}

/// Plain set difference. Excluding an absent address is a no-op.
pub fn subtract(targets: &TargetSet, exclusions: &TargetSet) -> TargetSet {
    targets.difference(exclusions).copied().collect()
}

pub struct TargetSetBuilder<R = SystemResolver> {
    resolver: R,
    max_range_hosts: usize,
}

impl TargetSetBuilder<SystemResolver> {
    pub fn system() -> Self {
        Self::new(SystemResolver)
    }
}

impl<R: NameResolver> TargetSetBuilder<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            max_range_hosts: DEFAULT_MAX_RANGE_HOSTS,
        }
    }

    pub fn with_max_range_hosts(mut self, max_range_hosts: usize) -> Self {
        self.max_range_hosts = max_range_hosts;
        self
    }

    /// Resolves every atom and unions the results. Never fails as a whole;
    /// an empty set is a valid answer.
    pub fn build_set(&self, spec: &str) -> TargetSet {
        let mut set = TargetSet::new();

        for atom in atoms(spec) {
            match atom {
                Atom::Range(range) => {
                    let hosts = resolver::expand_range(range, self.max_range_hosts);
                    if !hosts.is_empty() {
                        info!("Expanded {} to {} hosts", range, hosts.len());
                    }
                    set.extend(hosts);
                }
                Atom::Literal(addr) => {
                    set.insert(addr);
                }
                Atom::Symbolic(name) => match self.resolver.resolve_symbolic(name) {
                    Some(addr) => {
                        info!("Resolved {} to {}", name, addr);
                        set.insert(addr);
                    }
                    None => warn!("Could not resolve {}, skipping", name),
                },
            }
        }

        set
    }
}
