//! In-memory hypervisor for tests and `--demo` mode.
//!
//! Domains live in a shared table behind a mutex, so handles returned by
//! [`MockHypervisor::list_all_domains`] observe later changes the same way
//! real handles do. Tests drive counters explicitly; demo mode advances them
//! with wall-clock time on every listing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::debug;

use super::{
    BlockStats, Domain, DomainInfo, DomainState, Hypervisor, HypervisorError, InterfaceStats,
    MemoryStat, MemoryStatTag,
};
use crate::device::{AttachedDisk, parse_attached_disks};

// libvirt's numeric codes, so humanized errors look like the real thing.
const ERR_INTERNAL: i32 = 1;
const ERR_NO_DOMAIN: i32 = 42;
const ERR_OPERATION_INVALID: i32 = 55;
const ERR_DEVICE_MISSING: i32 = 99;

/// Operations whose failure can be injected with [`MockHypervisor::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// Host-wide; inject with [`MockHypervisor::fail_listing`].
    ListDomains,
    Start,
    Shutdown,
    Resume,
    Suspend,
    Reboot,
    Destroy,
    Info,
    CpuTime,
    BlockStats,
    InterfaceStats,
    MemoryStats,
    AttachDevice,
    DetachDevice,
}

/// State of one mock domain.
#[derive(Debug, Clone, PartialEq)]
pub struct MockDomain {
    pub name: String,
    pub state: DomainState,
    pub vcpu_count: u32,
    pub memory_kib: u64,
    pub cpu_time_nanos: u64,
    pub block: BlockStats,
    pub interfaces: Vec<(String, InterfaceStats)>,
    pub memory_stats: Vec<MemoryStat>,
    pub disks: Vec<AttachedDisk>,
    /// Fraction of its vCPUs the domain burns in demo mode.
    pub load: f64,
}

impl MockDomain {
    /// A running domain with one interface and full balloon statistics.
    pub fn running(name: &str, vcpu_count: u32, memory_kib: u64) -> Self {
        Self {
            name: name.to_string(),
            state: DomainState::Running,
            vcpu_count,
            memory_kib,
            cpu_time_nanos: 0,
            block: BlockStats::default(),
            interfaces: vec![("vnet0".to_string(), InterfaceStats::default())],
            memory_stats: balloon_stats(memory_kib, memory_kib / 2),
            disks: Vec::new(),
            load: 0.25,
        }
    }

    pub fn shut_off(mut self) -> Self {
        self.state = DomainState::Shutoff;
        self
    }

    pub fn with_disk(mut self, file: &str, device: &str) -> Self {
        self.disks.push(AttachedDisk {
            device: device.to_string(),
            file: file.to_string(),
        });
        self
    }

    pub fn with_load(mut self, load: f64) -> Self {
        self.load = load;
        self
    }

    fn xml(&self) -> String {
        let disks: String = self.disks.iter().map(|d| d.descriptor().to_xml()).collect();
        format!(
            "<domain type='kvm'><name>{}</name><vcpu>{}</vcpu><devices>{}</devices></domain>",
            self.name, self.vcpu_count, disks
        )
    }

    fn reset_counters(&mut self) {
        self.cpu_time_nanos = 0;
        self.block = BlockStats::default();
        for (_, stats) in &mut self.interfaces {
            *stats = InterfaceStats::default();
        }
    }
}

/// Actual-balloon and unused statistics for `total_kib` of memory.
pub fn balloon_stats(total_kib: u64, unused_kib: u64) -> Vec<MemoryStat> {
    vec![
        MemoryStat {
            tag: MemoryStatTag::ActualBalloon,
            value_kib: total_kib,
        },
        MemoryStat {
            tag: MemoryStatTag::Unused,
            value_kib: unused_kib,
        },
    ]
}

#[derive(Debug, Default)]
struct MockHost {
    domains: Vec<MockDomain>,
    failures: HashMap<(String, MockOp), HypervisorError>,
    /// Demo mode: wall clock of the last counter advance.
    simulated_at: Option<Instant>,
    /// Demo mode: seconds since simulation start.
    sim_clock: f64,
}

impl MockHost {
    fn domain(&self, name: &str) -> Result<&MockDomain, HypervisorError> {
        self.domains
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| no_domain(name))
    }

    fn domain_mut(&mut self, name: &str) -> Result<&mut MockDomain, HypervisorError> {
        self.domains
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| no_domain(name))
    }

    fn check(&self, name: &str, op: MockOp) -> Result<(), HypervisorError> {
        match self.failures.get(&(name.to_string(), op)) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn advance(&mut self, now: Instant) {
        let Some(last) = self.simulated_at.replace(now) else {
            return;
        };
        let dt = now.duration_since(last).as_secs_f64();
        self.sim_clock += dt;
        let t = self.sim_clock;
        for (i, dom) in self.domains.iter_mut().enumerate() {
            if dom.state != DomainState::Running {
                continue;
            }
            let wobble = 0.75 + 0.25 * (t * 0.7 + i as f64).sin();
            let load = (dom.load * wobble).clamp(0.0, 1.0);
            dom.cpu_time_nanos += (dt * load * dom.vcpu_count as f64 * 1e9) as u64;
            dom.block.read_bytes += (dt * load * 4.0 * 1024.0 * 1024.0) as i64;
            dom.block.write_bytes += (dt * load * 1.5 * 1024.0 * 1024.0) as i64;
            for (_, net) in &mut dom.interfaces {
                net.rx_bytes += (dt * load * 600.0 * 1024.0) as i64;
                net.tx_bytes += (dt * load * 150.0 * 1024.0) as i64;
            }
            let used = (dom.memory_kib as f64 * (0.3 + 0.4 * load)) as u64;
            dom.memory_stats = balloon_stats(dom.memory_kib, dom.memory_kib.saturating_sub(used));
        }
    }
}

fn no_domain(name: &str) -> HypervisorError {
    HypervisorError::Api {
        code: ERR_NO_DOMAIN,
        message: format!("Domain not found: no domain with matching name '{}'", name),
    }
}

fn invalid(message: &str) -> HypervisorError {
    HypervisorError::Api {
        code: ERR_OPERATION_INVALID,
        message: format!("Requested operation is not valid: {}", message),
    }
}

fn require_running(dom: &MockDomain) -> Result<(), HypervisorError> {
    match dom.state {
        DomainState::Shutoff | DomainState::Crashed => Err(invalid("domain is not running")),
        _ => Ok(()),
    }
}

/// In-memory [`Hypervisor`].
#[derive(Debug, Clone)]
pub struct MockHypervisor {
    uri: String,
    host: Arc<Mutex<MockHost>>,
}

impl Default for MockHypervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHypervisor {
    pub fn new() -> Self {
        Self {
            uri: "mock:///default".to_string(),
            host: Arc::new(Mutex::new(MockHost::default())),
        }
    }

    /// Advance counters with wall-clock time on every domain listing.
    pub fn simulated(self) -> Self {
        self.host().simulated_at = Some(Instant::now());
        self
    }

    fn host(&self) -> MutexGuard<'_, MockHost> {
        self.host.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_domain<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut MockDomain) -> T,
    ) -> Result<T, HypervisorError> {
        let mut host = self.host();
        host.domain_mut(name).map(f)
    }

    pub fn add_domain(&self, domain: MockDomain) {
        self.host().domains.push(domain);
    }

    pub fn remove_domain(&self, name: &str) {
        self.host().domains.retain(|d| d.name != name);
    }

    /// Snapshot of a domain's current state.
    pub fn domain(&self, name: &str) -> Option<MockDomain> {
        self.host().domain(name).ok().cloned()
    }

    pub fn set_state(&self, name: &str, state: DomainState) -> Result<(), HypervisorError> {
        self.with_domain(name, |d| d.state = state)
    }

    pub fn set_cpu_time(&self, name: &str, nanos: u64) -> Result<(), HypervisorError> {
        self.with_domain(name, |d| d.cpu_time_nanos = nanos)
    }

    pub fn set_block_stats(&self, name: &str, stats: BlockStats) -> Result<(), HypervisorError> {
        self.with_domain(name, |d| d.block = stats)
    }

    /// Sets counters of an interface, adding it if missing.
    pub fn set_interface_stats(
        &self,
        name: &str,
        iface: &str,
        stats: InterfaceStats,
    ) -> Result<(), HypervisorError> {
        self.with_domain(name, |d| {
            match d.interfaces.iter_mut().find(|(n, _)| n == iface) {
                Some((_, s)) => *s = stats,
                None => d.interfaces.push((iface.to_string(), stats)),
            }
        })
    }

    pub fn set_memory_stats(
        &self,
        name: &str,
        stats: Vec<MemoryStat>,
    ) -> Result<(), HypervisorError> {
        self.with_domain(name, |d| d.memory_stats = stats)
    }

    /// Makes `op` on domain `name` fail with `err` until [`clear_failures`](Self::clear_failures).
    pub fn fail(&self, name: &str, op: MockOp, err: HypervisorError) {
        self.host().failures.insert((name.to_string(), op), err);
    }

    /// Makes [`Hypervisor::list_all_domains`] fail with `err`.
    pub fn fail_listing(&self, err: HypervisorError) {
        self.fail("", MockOp::ListDomains, err);
    }

    pub fn clear_failures(&self) {
        self.host().failures.clear();
    }

    fn handle(&self, name: &str) -> Box<dyn Domain> {
        Box::new(MockDomainHandle {
            name: name.to_string(),
            host: Arc::clone(&self.host),
        })
    }
}

impl Hypervisor for MockHypervisor {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn list_all_domains(&self) -> Result<Vec<Box<dyn Domain>>, HypervisorError> {
        let names: Vec<String> = {
            let mut host = self.host();
            host.check("", MockOp::ListDomains)?;
            if host.simulated_at.is_some() {
                host.advance(Instant::now());
            }
            host.domains.iter().map(|d| d.name.clone()).collect()
        };
        Ok(names.iter().map(|n| self.handle(n)).collect())
    }

    fn lookup_domain_by_name(&self, name: &str) -> Result<Box<dyn Domain>, HypervisorError> {
        self.host().domain(name)?;
        Ok(self.handle(name))
    }
}

struct MockDomainHandle {
    name: String,
    host: Arc<Mutex<MockHost>>,
}

impl MockDomainHandle {
    fn read<T>(
        &self,
        op: Option<MockOp>,
        f: impl FnOnce(&MockDomain) -> Result<T, HypervisorError>,
    ) -> Result<T, HypervisorError> {
        let host = self.host.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(op) = op {
            host.check(&self.name, op)?;
        }
        f(host.domain(&self.name)?)
    }

    fn write(
        &self,
        op: MockOp,
        f: impl FnOnce(&mut MockDomain) -> Result<(), HypervisorError>,
    ) -> Result<(), HypervisorError> {
        let mut host = self.host.lock().unwrap_or_else(|e| e.into_inner());
        host.check(&self.name, op)?;
        let result = f(host.domain_mut(&self.name)?);
        debug!(domain = %self.name, ?op, ok = result.is_ok(), "mock operation");
        result
    }
}

impl Domain for MockDomainHandle {
    fn name(&self) -> Result<String, HypervisorError> {
        self.read(None, |d| Ok(d.name.clone()))
    }

    fn state(&self) -> Result<(DomainState, i32), HypervisorError> {
        self.read(None, |d| Ok((d.state, 0)))
    }

    fn info(&self) -> Result<DomainInfo, HypervisorError> {
        self.read(Some(MockOp::Info), |d| {
            Ok(DomainInfo {
                vcpu_count: d.vcpu_count,
                memory_max_kib: d.memory_kib,
                memory_kib: d.memory_kib,
            })
        })
    }

    fn start(&self) -> Result<(), HypervisorError> {
        self.write(MockOp::Start, |d| {
            if d.state != DomainState::Shutoff {
                return Err(invalid("domain is already running"));
            }
            d.reset_counters();
            d.state = DomainState::Running;
            Ok(())
        })
    }

    fn shutdown(&self) -> Result<(), HypervisorError> {
        self.write(MockOp::Shutdown, |d| {
            require_running(d)?;
            d.state = DomainState::Shutoff;
            Ok(())
        })
    }

    fn resume(&self) -> Result<(), HypervisorError> {
        self.write(MockOp::Resume, |d| {
            if d.state != DomainState::Paused {
                return Err(invalid("domain is not paused"));
            }
            d.state = DomainState::Running;
            Ok(())
        })
    }

    fn suspend(&self) -> Result<(), HypervisorError> {
        self.write(MockOp::Suspend, |d| {
            require_running(d)?;
            d.state = DomainState::Paused;
            Ok(())
        })
    }

    fn reboot(&self, _flags: u32) -> Result<(), HypervisorError> {
        self.write(MockOp::Reboot, |d| {
            require_running(d)?;
            d.state = DomainState::Running;
            Ok(())
        })
    }

    fn destroy(&self) -> Result<(), HypervisorError> {
        self.write(MockOp::Destroy, |d| {
            require_running(d)?;
            d.state = DomainState::Shutoff;
            Ok(())
        })
    }

    fn cpu_time(&self) -> Result<u64, HypervisorError> {
        self.read(Some(MockOp::CpuTime), |d| {
            require_running(d)?;
            Ok(d.cpu_time_nanos)
        })
    }

    fn block_stats(&self) -> Result<BlockStats, HypervisorError> {
        self.read(Some(MockOp::BlockStats), |d| {
            require_running(d)?;
            Ok(d.block)
        })
    }

    fn interface_names(&self) -> Result<Vec<String>, HypervisorError> {
        self.read(None, |d| {
            Ok(d.interfaces.iter().map(|(name, _)| name.clone()).collect())
        })
    }

    fn interface_stats(&self, name: &str) -> Result<InterfaceStats, HypervisorError> {
        self.read(Some(MockOp::InterfaceStats), |d| {
            require_running(d)?;
            d.interfaces
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, s)| *s)
                .ok_or_else(|| HypervisorError::Api {
                    code: ERR_INTERNAL,
                    message: format!("invalid path, '{}' is not a known interface", name),
                })
        })
    }

    fn memory_stats(&self) -> Result<Vec<MemoryStat>, HypervisorError> {
        self.read(Some(MockOp::MemoryStats), |d| {
            require_running(d)?;
            Ok(d.memory_stats.clone())
        })
    }

    fn xml_desc(&self) -> Result<String, HypervisorError> {
        self.read(None, |d| Ok(d.xml()))
    }

    fn attach_device(&self, xml: &str, live: bool) -> Result<(), HypervisorError> {
        let disks = parse_attached_disks(xml).map_err(|e| HypervisorError::Other(e.to_string()))?;
        self.write(MockOp::AttachDevice, |d| {
            if live {
                require_running(d)?;
            }
            for disk in disks {
                if d.disks.iter().any(|existing| existing.device == disk.device) {
                    return Err(HypervisorError::Api {
                        code: ERR_INTERNAL,
                        message: format!("target {} already exists", disk.device),
                    });
                }
                d.disks.push(disk);
            }
            Ok(())
        })
    }

    fn detach_device(&self, xml: &str, live: bool) -> Result<(), HypervisorError> {
        let disks = parse_attached_disks(xml).map_err(|e| HypervisorError::Other(e.to_string()))?;
        self.write(MockOp::DetachDevice, |d| {
            if live {
                require_running(d)?;
            }
            for disk in disks {
                let before = d.disks.len();
                d.disks.retain(|existing| existing.device != disk.device);
                if d.disks.len() == before {
                    return Err(HypervisorError::Api {
                        code: ERR_DEVICE_MISSING,
                        message: format!("device not found: no target device {}", disk.device),
                    });
                }
            }
            Ok(())
        })
    }
}

impl MockHypervisor {
    /// A small host: two running domains and one that is shut off.
    pub fn typical_host() -> Self {
        let hv = Self::new();
        hv.add_domain(
            MockDomain::running("web-01", 2, 2 * 1024 * 1024)
                .with_disk("/var/lib/libvirt/images/web-01.qcow2", "vda")
                .with_load(0.35),
        );
        hv.add_domain(
            MockDomain::running("db-01", 4, 8 * 1024 * 1024)
                .with_disk("/var/lib/libvirt/images/db-01.qcow2", "vda")
                .with_disk("/srv/pgdata.qcow2", "vdb")
                .with_load(0.6),
        );
        hv.add_domain(
            MockDomain::running("build-runner", 8, 16 * 1024 * 1024)
                .with_disk("/var/lib/libvirt/images/build-runner.qcow2", "vda")
                .shut_off(),
        );
        hv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typical_host_lists_domains_in_order() {
        let hv = MockHypervisor::typical_host();
        let names: Vec<String> = hv
            .list_all_domains()
            .unwrap()
            .iter()
            .map(|d| d.name().unwrap())
            .collect();
        assert_eq!(names, ["web-01", "db-01", "build-runner"]);
    }

    #[test]
    fn lookup_of_unknown_domain_fails_with_no_domain_code() {
        let hv = MockHypervisor::typical_host();
        let err = hv.lookup_domain_by_name("ghost").err().unwrap();
        assert!(matches!(err, HypervisorError::Api { code: ERR_NO_DOMAIN, .. }));
    }

    #[test]
    fn lifecycle_transitions() {
        let hv = MockHypervisor::typical_host();
        let dom = hv.lookup_domain_by_name("web-01").unwrap();

        dom.suspend().unwrap();
        assert_eq!(dom.state().unwrap().0, DomainState::Paused);
        dom.resume().unwrap();
        assert_eq!(dom.state().unwrap().0, DomainState::Running);
        assert!(dom.start().is_err());
        dom.destroy().unwrap();
        assert_eq!(dom.state().unwrap().0, DomainState::Shutoff);
        assert!(dom.shutdown().is_err());
    }

    #[test]
    fn start_resets_counters() {
        let hv = MockHypervisor::typical_host();
        hv.set_cpu_time("build-runner", 99).unwrap();
        let dom = hv.lookup_domain_by_name("build-runner").unwrap();
        dom.start().unwrap();
        assert_eq!(dom.cpu_time().unwrap(), 0);
    }

    #[test]
    fn stale_handle_errors_after_removal() {
        let hv = MockHypervisor::typical_host();
        let dom = hv.lookup_domain_by_name("db-01").unwrap();
        hv.remove_domain("db-01");
        assert!(dom.name().is_err());
    }

    #[test]
    fn injected_failures_are_returned() {
        let hv = MockHypervisor::typical_host();
        let err = HypervisorError::Other("boom".into());
        hv.fail("web-01", MockOp::BlockStats, err.clone());
        let dom = hv.lookup_domain_by_name("web-01").unwrap();
        assert_eq!(dom.block_stats().unwrap_err(), err);
        hv.clear_failures();
        assert!(dom.block_stats().is_ok());
    }

    #[test]
    fn attach_and_detach_update_domain_xml() {
        let hv = MockHypervisor::typical_host();
        let dom = hv.lookup_domain_by_name("web-01").unwrap();
        let xml = crate::device::DiskDescriptor::new("/srv/extra.qcow2", "vdc").to_xml();

        dom.attach_device(&xml, true).unwrap();
        assert!(dom.attach_device(&xml, true).is_err(), "duplicate target");
        let disks = parse_attached_disks(&dom.xml_desc().unwrap()).unwrap();
        assert_eq!(disks.len(), 2);

        dom.detach_device(&xml, true).unwrap();
        let err = dom.detach_device(&xml, true).unwrap_err();
        assert!(matches!(err, HypervisorError::Api { code: ERR_DEVICE_MISSING, .. }));
    }

    #[test]
    fn stats_of_shut_off_domain_fail() {
        let hv = MockHypervisor::typical_host();
        let dom = hv.lookup_domain_by_name("build-runner").unwrap();
        assert!(dom.cpu_time().is_err());
        assert!(dom.memory_stats().is_err());
    }

    #[test]
    fn simulation_advances_running_domains_only() {
        let hv = MockHypervisor::typical_host();
        {
            let mut host = hv.host();
            let start = Instant::now();
            host.simulated_at = Some(start);
            host.advance(start + std::time::Duration::from_secs(2));
        }
        assert!(hv.domain("web-01").unwrap().cpu_time_nanos > 0);
        assert!(hv.domain("db-01").unwrap().block.read_bytes > 0);
        assert_eq!(hv.domain("build-runner").unwrap().cpu_time_nanos, 0);
    }
}
