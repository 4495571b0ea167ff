use super::models::Address;

/// Progress notifications sent by the orchestrator while hosts run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Started(Address),
    Finished {
        address: Address,
        failed: bool,
        services: usize,
    },
}
