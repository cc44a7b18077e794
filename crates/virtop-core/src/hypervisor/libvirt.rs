//! [`Hypervisor`] over the system libvirt, via the `virt` bindings.

use tracing::info;
use virt::connect::Connect;
use virt::domain::Domain as VirtDomain;
use virt::sys;

use crate::device::interface_targets;

use super::{
    BlockStats, Domain, DomainInfo, DomainState, Hypervisor, HypervisorError, InterfaceStats,
    MemoryStat, MemoryStatTag,
};

impl From<virt::error::Error> for HypervisorError {
    fn from(e: virt::error::Error) -> Self {
        HypervisorError::Api {
            code: error_code(&e),
            message: e.message().to_string(),
        }
    }
}

/// libvirt's numeric `virErrorNumber`, as shown in the status line.
fn error_code(e: &virt::error::Error) -> i32 {
    e.code().to_raw() as i32
}

/// Statistics counters come back signed or unsigned depending on the field;
/// libvirt reports an unsupported counter as -1, which reads as zero here.
fn counter<T: TryInto<u64>>(raw: T) -> u64 {
    raw.try_into().unwrap_or(0)
}

/// An open libvirt connection.
pub struct LibvirtHypervisor {
    uri: String,
    conn: Connect,
}

impl LibvirtHypervisor {
    /// Opens `uri` (e.g. `qemu:///system`). Authentication is whatever the
    /// URI's default auth callback provides.
    pub fn connect(uri: &str) -> Result<Self, HypervisorError> {
        let conn = Connect::open(Some(uri))?;
        info!(uri, "connected to hypervisor");
        Ok(Self {
            uri: uri.to_string(),
            conn,
        })
    }
}

impl Hypervisor for LibvirtHypervisor {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn list_all_domains(&self) -> Result<Vec<Box<dyn Domain>>, HypervisorError> {
        let domains = self.conn.list_all_domains(0)?;
        Ok(domains
            .into_iter()
            .map(|d| Box::new(LibvirtDomain(d)) as Box<dyn Domain>)
            .collect())
    }

    fn lookup_domain_by_name(&self, name: &str) -> Result<Box<dyn Domain>, HypervisorError> {
        let dom = VirtDomain::lookup_by_name(&self.conn, name)?;
        Ok(Box::new(LibvirtDomain(dom)))
    }
}

struct LibvirtDomain(VirtDomain);

fn domain_state(raw: sys::virDomainState) -> DomainState {
    match raw {
        sys::VIR_DOMAIN_NOSTATE => DomainState::NoState,
        sys::VIR_DOMAIN_RUNNING => DomainState::Running,
        sys::VIR_DOMAIN_BLOCKED => DomainState::Blocked,
        sys::VIR_DOMAIN_PAUSED => DomainState::Paused,
        sys::VIR_DOMAIN_SHUTDOWN => DomainState::ShuttingDown,
        sys::VIR_DOMAIN_SHUTOFF => DomainState::Shutoff,
        sys::VIR_DOMAIN_CRASHED => DomainState::Crashed,
        sys::VIR_DOMAIN_PMSUSPENDED => DomainState::PmSuspended,
        _ => DomainState::Unknown,
    }
}

fn memory_stat_tag(raw: u32) -> MemoryStatTag {
    match raw {
        sys::VIR_DOMAIN_MEMORY_STAT_ACTUAL_BALLOON => MemoryStatTag::ActualBalloon,
        sys::VIR_DOMAIN_MEMORY_STAT_UNUSED => MemoryStatTag::Unused,
        other => MemoryStatTag::Other(other),
    }
}

impl Domain for LibvirtDomain {
    fn name(&self) -> Result<String, HypervisorError> {
        Ok(self.0.get_name()?)
    }

    fn state(&self) -> Result<(DomainState, i32), HypervisorError> {
        let (state, reason) = self.0.get_state()?;
        Ok((domain_state(state), reason))
    }

    fn info(&self) -> Result<DomainInfo, HypervisorError> {
        let info = self.0.get_info()?;
        Ok(DomainInfo {
            vcpu_count: info.nr_virt_cpu,
            memory_max_kib: info.max_mem,
            memory_kib: info.memory,
        })
    }

    fn start(&self) -> Result<(), HypervisorError> {
        self.0.create()?;
        Ok(())
    }

    fn shutdown(&self) -> Result<(), HypervisorError> {
        self.0.shutdown()?;
        Ok(())
    }

    fn resume(&self) -> Result<(), HypervisorError> {
        self.0.resume()?;
        Ok(())
    }

    fn suspend(&self) -> Result<(), HypervisorError> {
        self.0.suspend()?;
        Ok(())
    }

    fn reboot(&self, flags: u32) -> Result<(), HypervisorError> {
        self.0.reboot(flags)?;
        Ok(())
    }

    fn destroy(&self) -> Result<(), HypervisorError> {
        self.0.destroy()?;
        Ok(())
    }

    fn cpu_time(&self) -> Result<u64, HypervisorError> {
        Ok(self.0.get_info()?.cpu_time)
    }

    fn block_stats(&self) -> Result<BlockStats, HypervisorError> {
        // Empty path: totals over all block devices.
        let stats = self.0.get_block_stats("")?;
        Ok(BlockStats {
            read_bytes: counter(stats.rd_bytes),
            write_bytes: counter(stats.wr_bytes),
        })
    }

    fn interface_names(&self) -> Result<Vec<String>, HypervisorError> {
        let xml = self.0.get_xml_desc(0)?;
        interface_targets(&xml).map_err(|e| HypervisorError::Other(e.to_string()))
    }

    fn interface_stats(&self, name: &str) -> Result<InterfaceStats, HypervisorError> {
        let stats = self.0.interface_stats(name)?;
        Ok(InterfaceStats {
            rx_bytes: counter(stats.rx_bytes),
            tx_bytes: counter(stats.tx_bytes),
        })
    }

    fn memory_stats(&self) -> Result<Vec<MemoryStat>, HypervisorError> {
        let stats = self.0.memory_stats(0)?;
        Ok(stats
            .into_iter()
            .map(|s| MemoryStat {
                tag: memory_stat_tag(s.tag),
                value_kib: counter(s.val),
            })
            .collect())
    }

    fn xml_desc(&self) -> Result<String, HypervisorError> {
        Ok(self.0.get_xml_desc(0)?)
    }

    fn attach_device(&self, xml: &str, live: bool) -> Result<(), HypervisorError> {
        self.0.attach_device_flags(xml, affect_flags(live))?;
        Ok(())
    }

    fn detach_device(&self, xml: &str, live: bool) -> Result<(), HypervisorError> {
        self.0.detach_device_flags(xml, affect_flags(live))?;
        Ok(())
    }
}

fn affect_flags(live: bool) -> u32 {
    if live {
        sys::VIR_DOMAIN_AFFECT_LIVE
    } else {
        sys::VIR_DOMAIN_AFFECT_CURRENT
    }
}
