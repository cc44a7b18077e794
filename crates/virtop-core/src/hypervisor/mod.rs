//! Capability interfaces to the hypervisor control plane.
//!
//! The core never talks to a concrete hypervisor. Everything it needs from a
//! connection or a domain handle goes through the [`Hypervisor`] and [`Domain`]
//! traits defined here:
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │   RefreshScheduler   │      │      Dispatcher      │
//! └──────────┬───────────┘      └───────────┬──────────┘
//!            └──────────────┬───────────────┘
//!                    ┌──────▼──────┐
//!                    │  Hypervisor │ (trait)
//!                    └──────┬──────┘
//!              ┌────────────┴─────────────┐
//!     ┌────────▼────────┐       ┌─────────▼─────────┐
//!     │ MockHypervisor  │       │ LibvirtHypervisor │
//!     │ (tests, --demo) │       │ (feature libvirt) │
//!     └─────────────────┘       └───────────────────┘
//! ```

#[cfg(feature = "libvirt")]
mod libvirt;
pub mod mock;

#[cfg(feature = "libvirt")]
pub use libvirt::LibvirtHypervisor;
pub use mock::MockHypervisor;

/// Error reported by a hypervisor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HypervisorError {
    /// Structured error from the hypervisor API, with its numeric code.
    Api { code: i32, message: String },
    /// Any other failure (transport, unexpected data).
    Other(String),
}

impl std::fmt::Display for HypervisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HypervisorError::Api { code, message } => {
                write!(f, "hypervisor error {}: {}", code, message)
            }
            HypervisorError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for HypervisorError {}

/// Power state of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainState {
    NoState,
    Running,
    Blocked,
    Paused,
    ShuttingDown,
    Shutoff,
    Crashed,
    PmSuspended,
    Unknown,
}

impl DomainState {
    /// Human-readable label shown in the State column.
    pub fn label(&self) -> &'static str {
        match self {
            DomainState::NoState => "No state",
            DomainState::Running => "Running",
            DomainState::Blocked => "Blocked",
            DomainState::Paused => "Paused",
            DomainState::ShuttingDown => "Shutting down",
            DomainState::Shutoff => "Shut off",
            DomainState::Crashed => "Crashed",
            DomainState::PmSuspended => "Suspended",
            DomainState::Unknown => "Unknown",
        }
    }

    /// Powered-off domains have no live counters to sample.
    pub fn is_powered_off(&self) -> bool {
        matches!(self, DomainState::Shutoff)
    }
}

/// Static-ish domain metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainInfo {
    pub vcpu_count: u32,
    /// Maximum memory in KiB.
    pub memory_max_kib: u64,
    /// Currently assigned memory in KiB.
    pub memory_kib: u64,
}

/// Cumulative block device counters summed over all disks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    pub read_bytes: i64,
    pub write_bytes: i64,
}

/// Cumulative counters of one network interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceStats {
    pub rx_bytes: i64,
    pub tx_bytes: i64,
}

/// Tag of a memory statistic reported by the balloon driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryStatTag {
    /// Current balloon size (memory visible to the guest).
    ActualBalloon,
    /// Memory the guest reports as completely unused.
    Unused,
    Other(u32),
}

/// One tagged memory statistic, in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStat {
    pub tag: MemoryStatTag,
    pub value_kib: u64,
}

/// Handle to a single domain.
///
/// Handles are cheap to obtain and may go stale when the domain is
/// undefined or renamed; every call can fail.
pub trait Domain: Send {
    fn name(&self) -> Result<String, HypervisorError>;
    /// Power state plus the hypervisor's reason code.
    fn state(&self) -> Result<(DomainState, i32), HypervisorError>;
    fn info(&self) -> Result<DomainInfo, HypervisorError>;

    fn start(&self) -> Result<(), HypervisorError>;
    fn shutdown(&self) -> Result<(), HypervisorError>;
    fn resume(&self) -> Result<(), HypervisorError>;
    fn suspend(&self) -> Result<(), HypervisorError>;
    fn reboot(&self, flags: u32) -> Result<(), HypervisorError>;
    fn destroy(&self) -> Result<(), HypervisorError>;

    /// Cumulative CPU time in nanoseconds across all vCPUs.
    fn cpu_time(&self) -> Result<u64, HypervisorError>;
    fn block_stats(&self) -> Result<BlockStats, HypervisorError>;
    fn interface_names(&self) -> Result<Vec<String>, HypervisorError>;
    fn interface_stats(&self, name: &str) -> Result<InterfaceStats, HypervisorError>;
    fn memory_stats(&self) -> Result<Vec<MemoryStat>, HypervisorError>;

    /// Full XML description of the domain.
    fn xml_desc(&self) -> Result<String, HypervisorError>;
    fn attach_device(&self, xml: &str, live: bool) -> Result<(), HypervisorError>;
    fn detach_device(&self, xml: &str, live: bool) -> Result<(), HypervisorError>;
}

/// An already-authenticated hypervisor connection.
pub trait Hypervisor: Send + Sync {
    /// Connection URI, for display.
    fn uri(&self) -> &str;
    /// All defined domains, in the hypervisor's order.
    fn list_all_domains(&self) -> Result<Vec<Box<dyn Domain>>, HypervisorError>;
    fn lookup_domain_by_name(&self, name: &str) -> Result<Box<dyn Domain>, HypervisorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_shutoff_counts_as_powered_off() {
        assert!(DomainState::Shutoff.is_powered_off());
        assert!(!DomainState::Paused.is_powered_off());
        assert!(!DomainState::Crashed.is_powered_off());
        assert!(!DomainState::Running.is_powered_off());
    }

    #[test]
    fn state_labels_match_table_text() {
        assert_eq!(DomainState::Shutoff.label(), "Shut off");
        assert_eq!(DomainState::PmSuspended.label(), "Suspended");
        assert_eq!(DomainState::ShuttingDown.label(), "Shutting down");
    }
}
