use crate::core::models::Address;
use ipnet::Ipv4Net;
use std::net::{IpAddr, ToSocketAddrs};
use tracing::{debug, warn};

/// Largest range expanded by default: a /12.
pub const DEFAULT_MAX_RANGE_HOSTS: usize = 1 << 20;

/// Syntactic IPv4 dotted-quad check. No lookups.
pub fn is_literal_address(s: &str) -> bool {
    s.parse::<Address>().is_ok()
}

/// Expands `address/prefix` into its usable host addresses.
///
/// Network and broadcast addresses are left out (except for /31 and /32,
/// which have none). Host bits set in the address are ignored. Malformed
/// or oversized ranges come back empty with a warning.
pub fn expand_range(spec: &str, max_hosts: usize) -> Vec<Address> {
    let network = match spec.trim().parse::<Ipv4Net>() {
        Ok(net) => net,
        Err(e) => {
            warn!("Invalid range {}: {}", spec, e);
            return Vec::new();
        }
    };

    let size = 1u64 << (32 - u32::from(network.prefix_len()));
    if size > max_hosts as u64 {
        warn!(
            "Range {} covers {} addresses, more than the limit of {}; skipping",
            spec, size, max_hosts
        );
        return Vec::new();
    }

    let hosts: Vec<Address> = network.hosts().collect();
    debug!("Expanded range {} to {} hosts", spec, hosts.len());
    hosts
}

/// Name resolution used for symbolic atoms.
pub trait NameResolver: Send + Sync {
    /// Returns the first IPv4 address for `name`, or `None` when the lookup
    /// fails. Failures are logged, never raised.
    fn resolve_symbolic(&self, name: &str) -> Option<Address>;
}

/// Resolves through the operating system resolver. Blocking, uncached.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl NameResolver for SystemResolver {
    fn resolve_symbolic(&self, name: &str) -> Option<Address> {
        match (name, 0u16).to_socket_addrs() {
            Ok(addrs) => {
                let found = addrs.into_iter().find_map(|sa| match sa.ip() {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                });
                if found.is_none() {
                    warn!("Failed to resolve {}: no IPv4 address", name);
                }
                found
            }
            Err(e) => {
                warn!("Failed to resolve {}: {}", name, e);
                None
            }
        }
    }
}
