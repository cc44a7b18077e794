//! Periodic domain polling.
//!
//! [`RefreshScheduler`] runs on its own thread. Each tick it lists the
//! domains, feeds their counters through a per-domain [`RateEngine`] and writes
//! one row per domain into a [`TableSink`], then asks for exactly one redraw.
//! The engines are owned by the scheduler alone; nothing else touches them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::hypervisor::{Domain, DomainState, Hypervisor};
use crate::rates::{DiskCounters, MetricSample, NetCounters, RateEngine, memory_usage};

/// Columns of the domain table, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Name,
    State,
    Cpu,
    Memory,
    Io,
    Network,
}

impl Column {
    pub const COUNT: usize = 6;

    pub fn all() -> &'static [Column; Column::COUNT] {
        &[
            Column::Name,
            Column::State,
            Column::Cpu,
            Column::Memory,
            Column::Io,
            Column::Network,
        ]
    }

    pub fn header(&self) -> &'static str {
        match self {
            Column::Name => "Name",
            Column::State => "State",
            Column::Cpu => "CPU Usage",
            Column::Memory => "Memory",
            Column::Io => "I/O",
            Column::Network => "Network Usage",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Columns that carry a metric (blanked for powered-off domains).
    pub fn metrics() -> [Column; 4] {
        [Column::Cpu, Column::Memory, Column::Io, Column::Network]
    }
}

/// One rendered row of the domain table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainRow {
    pub cells: [String; Column::COUNT],
}

impl DomainRow {
    pub fn cell(&self, col: Column) -> &str {
        &self.cells[col.index()]
    }

    pub fn set(&mut self, col: Column, text: String) {
        self.cells[col.index()] = text;
    }

    pub fn name(&self) -> &str {
        self.cell(Column::Name)
    }
}

/// The presentation side of the table has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

/// Where the scheduler writes the table.
pub trait TableSink {
    fn set_cell(&mut self, row: usize, col: Column, text: String);
    /// Publishes everything written since the last call as one redraw.
    fn queue_redraw(&mut self) -> Result<(), Disconnected>;
    /// The tick produced no table; the last published one stays up.
    fn keep_previous(&mut self) -> Result<(), Disconnected>;
}

/// Owns the per-domain rate engines and produces the table, tick by tick.
#[derive(Debug)]
pub struct RefreshScheduler {
    engines: HashMap<String, RateEngine>,
    interval: Duration,
}

impl RefreshScheduler {
    /// `interval` must be non-zero; it is also the elapsed time assumed for
    /// the first tick.
    pub fn new(interval: Duration) -> Self {
        Self {
            engines: HashMap::new(),
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Names of domains with a live engine.
    pub fn tracked(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }

    pub fn engine(&self, name: &str) -> Option<&RateEngine> {
        self.engines.get(name)
    }

    /// One refresh pass. Per-domain failures never abort the pass.
    pub fn tick(
        &mut self,
        hypervisor: &dyn Hypervisor,
        sink: &mut dyn TableSink,
        elapsed_secs: f64,
    ) -> Result<(), Disconnected> {
        let domains = match hypervisor.list_all_domains() {
            Ok(domains) => domains,
            Err(e) => {
                warn!(uri = hypervisor.uri(), error = %e, "failed to list domains");
                return sink.keep_previous();
            }
        };

        let mut seen = HashSet::with_capacity(domains.len());
        let mut row = 0;
        for dom in &domains {
            let name = match dom.name() {
                Ok(name) => name,
                Err(e) => {
                    warn!(error = %e, "failed to read domain name");
                    continue;
                }
            };
            self.refresh_row(&**dom, &name, row, sink, elapsed_secs);
            seen.insert(name);
            row += 1;
        }

        let before = self.engines.len();
        self.engines.retain(|name, _| seen.contains(name));
        if self.engines.len() != before {
            debug!(pruned = before - self.engines.len(), "dropped engines of vanished domains");
        }

        trace!(rows = row, "tick complete");
        sink.queue_redraw()
    }

    fn refresh_row(
        &mut self,
        dom: &dyn Domain,
        name: &str,
        row: usize,
        sink: &mut dyn TableSink,
        elapsed_secs: f64,
    ) {
        sink.set_cell(row, Column::Name, name.to_string());

        let state = match dom.state() {
            Ok((state, _reason)) => state,
            Err(e) => {
                warn!(domain = name, error = %e, "failed to read domain state");
                DomainState::Unknown
            }
        };
        sink.set_cell(row, Column::State, state.label().to_string());

        // Powered-off domains keep their engine untouched.
        if state.is_powered_off() || state == DomainState::Unknown {
            for col in Column::metrics() {
                sink.set_cell(row, col, String::new());
            }
            return;
        }

        let engine = self.engines.entry(name.to_string()).or_default();
        let vcpus = match dom.info() {
            Ok(info) => info.vcpu_count,
            Err(e) => {
                debug!(domain = name, error = %e, "failed to read domain info");
                engine.vcpu_count()
            }
        };
        let sample = collect_sample(dom, name);
        let rates = engine.observe(&sample, elapsed_secs, vcpus);

        let memory = dom
            .memory_stats()
            .map_err(crate::Error::from)
            .and_then(|stats| memory_usage(&stats));
        let memory_cell = match memory {
            Ok(usage) => usage.cell(),
            Err(e) => {
                debug!(domain = name, error = %e, "memory unavailable");
                String::new()
            }
        };

        sink.set_cell(row, Column::Cpu, rates.cpu_cell());
        sink.set_cell(row, Column::Memory, memory_cell);
        sink.set_cell(row, Column::Io, rates.disk_cell());
        sink.set_cell(row, Column::Network, rates.net_cell());
    }

    /// Runs the scheduler on its own thread until the sink disconnects.
    pub fn spawn<S>(mut self, hypervisor: Arc<dyn Hypervisor>, mut sink: S) -> JoinHandle<()>
    where
        S: TableSink + Send + 'static,
    {
        thread::spawn(move || {
            info!(uri = hypervisor.uri(), interval = ?self.interval, "refresh loop started");
            let mut last: Option<Instant> = None;
            loop {
                let started = Instant::now();
                let elapsed = last
                    .map(|t| started.duration_since(t))
                    .filter(|d| !d.is_zero())
                    .unwrap_or(self.interval)
                    .as_secs_f64();
                last = Some(started);

                if self.tick(hypervisor.as_ref(), &mut sink, elapsed).is_err() {
                    break;
                }
                thread::sleep(self.interval.saturating_sub(started.elapsed()));
            }
            info!("refresh loop stopped");
        })
    }
}

/// Reads the cumulative counters of a running domain. Counters that cannot
/// be read are left empty.
fn collect_sample(dom: &dyn Domain, name: &str) -> MetricSample {
    let cpu_time_nanos = dom
        .cpu_time()
        .inspect_err(|e| debug!(domain = name, error = %e, "cpu stats unavailable"))
        .ok();

    let disk = dom
        .block_stats()
        .inspect_err(|e| debug!(domain = name, error = %e, "block stats unavailable"))
        .ok()
        .map(|b| DiskCounters {
            read_bytes: b.read_bytes,
            write_bytes: b.write_bytes,
        });

    let net = dom
        .interface_names()
        .and_then(|names| {
            names.iter().try_fold(NetCounters::default(), |acc, iface| {
                let stats = dom.interface_stats(iface)?;
                Ok(NetCounters {
                    rx_bytes: acc.rx_bytes.saturating_add(stats.rx_bytes),
                    tx_bytes: acc.tx_bytes.saturating_add(stats.tx_bytes),
                })
            })
        })
        .inspect_err(|e| debug!(domain = name, error = %e, "interface stats unavailable"))
        .ok();

    MetricSample {
        cpu_time_nanos,
        disk,
        net,
    }
}
