//! Per-domain rate computation.
//!
//! The hypervisor only exposes cumulative counters (CPU nanoseconds, bytes
//! read/written, bytes received/sent). [`RateEngine`] keeps the previous
//! sample of one domain and turns two successive samples into rates.
//!
//! Each metric follows the same discipline:
//! - no stored sample: store the current one and report [`Reading::Pending`];
//! - counter regression (domain restarted, counters reset): same as above;
//! - otherwise: `delta / elapsed`, then store the current sample.
//!
//! A metric that could not be fetched this tick reports
//! [`Reading::Unavailable`] and forgets its stored sample, so the next delta is
//! never computed across a gap the elapsed time does not cover.

use crate::error::Error;
use crate::fmt::{format_bytes, format_bytes_rate, format_pair, format_percent};
use crate::hypervisor::{MemoryStat, MemoryStatTag};

/// Cell text for a metric that has only been sampled once.
pub const PENDING_CELL: &str = "-";

/// Cumulative disk counters of one domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCounters {
    pub read_bytes: i64,
    pub write_bytes: i64,
}

/// Cumulative network counters of one domain, summed over its interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub rx_bytes: i64,
    pub tx_bytes: i64,
}

/// Raw cumulative counters of one domain at one poll instant.
///
/// A `None` field means the counter could not be read this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricSample {
    pub cpu_time_nanos: Option<u64>,
    pub disk: Option<DiskCounters>,
    pub net: Option<NetCounters>,
}

/// Outcome of one metric for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<T> {
    /// First sample (or first after a reset): nothing to diff against yet.
    Pending,
    /// Counter could not be read this tick.
    Unavailable,
    Value(T),
}

impl<T> Reading<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Reading::Value(v) => Some(v),
            _ => None,
        }
    }

    fn render(&self, f: impl FnOnce(&T) -> String) -> String {
        match self {
            Reading::Pending => PENDING_CELL.to_string(),
            Reading::Unavailable => String::new(),
            Reading::Value(v) => f(v),
        }
    }
}

/// Bytes-per-second pair (read/write for disks, rx/tx for network).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ByteRates {
    pub inbound: f64,
    pub outbound: f64,
}

/// Rates produced by one [`RateEngine::observe`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedRates {
    /// CPU usage in percent of the domain's vCPUs, clamped to `0..=100`.
    pub cpu: Reading<f64>,
    pub disk: Reading<ByteRates>,
    pub net: Reading<ByteRates>,
}

impl RenderedRates {
    pub fn cpu_cell(&self) -> String {
        self.cpu.render(|pct| format_percent(*pct))
    }

    pub fn disk_cell(&self) -> String {
        self.disk.render(render_byte_rates)
    }

    pub fn net_cell(&self) -> String {
        self.net.render(render_byte_rates)
    }
}

fn render_byte_rates(r: &ByteRates) -> String {
    format_pair(&format_bytes_rate(r.inbound), &format_bytes_rate(r.outbound))
}

/// Stateful converter from cumulative counters to rates for one domain.
#[derive(Debug, Clone, Default)]
pub struct RateEngine {
    prev_cpu: Option<u64>,
    prev_disk: Option<DiskCounters>,
    prev_net: Option<NetCounters>,
    vcpu_count: u32,
}

impl RateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// vCPU count seen on the last observation.
    pub fn vcpu_count(&self) -> u32 {
        self.vcpu_count
    }

    /// Whether any previous sample is stored.
    pub fn has_history(&self) -> bool {
        self.prev_cpu.is_some() || self.prev_disk.is_some() || self.prev_net.is_some()
    }

    /// Converts `current` into rates against the stored sample, then stores it.
    ///
    /// `elapsed_secs` is the time since the previous observation and must be
    /// positive; a non-positive value yields `Pending` for every rate while
    /// still storing the sample.
    pub fn observe(
        &mut self,
        current: &MetricSample,
        elapsed_secs: f64,
        vcpu_count: u32,
    ) -> RenderedRates {
        self.vcpu_count = vcpu_count;
        let elapsed = (elapsed_secs > 0.0).then_some(elapsed_secs);

        RenderedRates {
            cpu: self.observe_cpu(current.cpu_time_nanos, elapsed, vcpu_count),
            disk: observe_pair(
                &mut self.prev_disk,
                current.disk,
                elapsed,
                |d| (d.read_bytes, d.write_bytes),
            ),
            net: observe_pair(
                &mut self.prev_net,
                current.net,
                elapsed,
                |n| (n.rx_bytes, n.tx_bytes),
            ),
        }
    }

    fn observe_cpu(
        &mut self,
        current: Option<u64>,
        elapsed: Option<f64>,
        vcpu_count: u32,
    ) -> Reading<f64> {
        let Some(current) = current else {
            self.prev_cpu = None;
            return Reading::Unavailable;
        };
        let prev = self.prev_cpu.replace(current);

        let (Some(prev), Some(elapsed)) = (prev, elapsed) else {
            return Reading::Pending;
        };
        let Some(delta) = current.checked_sub(prev) else {
            return Reading::Pending;
        };
        Reading::Value(cpu_percent(delta, elapsed, vcpu_count))
    }
}

/// CPU usage in percent for `delta_nanos` of CPU time over `elapsed_secs`,
/// normalised by the vCPU count and clamped to `0..=100`.
pub fn cpu_percent(delta_nanos: u64, elapsed_secs: f64, vcpu_count: u32) -> f64 {
    let vcpus = vcpu_count.max(1) as f64;
    let pct = delta_nanos as f64 / (elapsed_secs * 1e9) * 100.0 / vcpus;
    if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) }
}

fn observe_pair<C: Copy>(
    prev_slot: &mut Option<C>,
    current: Option<C>,
    elapsed: Option<f64>,
    fields: impl Fn(&C) -> (i64, i64),
) -> Reading<ByteRates> {
    let Some(current) = current else {
        *prev_slot = None;
        return Reading::Unavailable;
    };
    let prev = prev_slot.replace(current);

    let (Some(prev), Some(elapsed)) = (prev, elapsed) else {
        return Reading::Pending;
    };
    let (cur_in, cur_out) = fields(&current);
    let (prev_in, prev_out) = fields(&prev);
    match (delta(cur_in, prev_in), delta(cur_out, prev_out)) {
        (Some(d_in), Some(d_out)) => Reading::Value(ByteRates {
            inbound: d_in as f64 / elapsed,
            outbound: d_out as f64 / elapsed,
        }),
        _ => Reading::Pending,
    }
}

/// Delta of a cumulative counter, `None` on regression (counter reset).
fn delta(curr: i64, prev: i64) -> Option<i64> {
    (curr >= prev).then_some(curr - prev)
}

/// Memory in use as reported by the balloon driver, in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used_kib: u64,
    pub total_kib: u64,
}

impl MemoryUsage {
    /// `"used / total"` with binary units.
    pub fn cell(&self) -> String {
        format_pair(
            &format_bytes(self.used_kib.saturating_mul(1024)),
            &format_bytes(self.total_kib.saturating_mul(1024)),
        )
    }
}

/// Derives used/total memory from tagged balloon statistics.
///
/// Both the actual-balloon and the unused tag must be present; a partial
/// result is never returned.
pub fn memory_usage(stats: &[MemoryStat]) -> Result<MemoryUsage, Error> {
    let mut total = None;
    let mut unused = None;
    for stat in stats {
        match stat.tag {
            MemoryStatTag::ActualBalloon => total = Some(stat.value_kib),
            MemoryStatTag::Unused => unused = Some(stat.value_kib),
            MemoryStatTag::Other(_) => {}
        }
    }

    match (total, unused) {
        (Some(total_kib), Some(unused_kib)) => Ok(MemoryUsage {
            used_kib: total_kib.saturating_sub(unused_kib),
            total_kib,
        }),
        (None, _) => Err(Error::MetricUnavailable(
            "memory stat 'actual-balloon' not reported".to_string(),
        )),
        (_, None) => Err(Error::MetricUnavailable(
            "memory stat 'unused' not reported".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = 1_000_000_000;

    fn cpu_only(nanos: u64) -> MetricSample {
        MetricSample {
            cpu_time_nanos: Some(nanos),
            ..MetricSample::default()
        }
    }

    fn full(cpu: u64, disk: (i64, i64), net: (i64, i64)) -> MetricSample {
        MetricSample {
            cpu_time_nanos: Some(cpu),
            disk: Some(DiskCounters {
                read_bytes: disk.0,
                write_bytes: disk.1,
            }),
            net: Some(NetCounters {
                rx_bytes: net.0,
                tx_bytes: net.1,
            }),
        }
    }

    #[test]
    fn first_observation_reports_pending_and_stores_sample() {
        let mut engine = RateEngine::new();
        assert!(!engine.has_history());

        let rates = engine.observe(&full(5 * SEC, (100, 200), (300, 400)), 1.0, 2);
        assert_eq!(rates.cpu, Reading::Pending);
        assert_eq!(rates.disk, Reading::Pending);
        assert_eq!(rates.net, Reading::Pending);
        assert_eq!(rates.cpu_cell(), PENDING_CELL);
        assert!(engine.has_history());

        let rates = engine.observe(&full(6 * SEC, (1124, 200), (300, 2448)), 1.0, 2);
        assert_eq!(rates.cpu, Reading::Value(50.0));
        assert_eq!(
            rates.disk,
            Reading::Value(ByteRates {
                inbound: 1024.0,
                outbound: 0.0
            })
        );
        assert_eq!(rates.disk_cell(), "1.0 KiB/s / 0 B/s");
        assert_eq!(rates.net_cell(), "0 B/s / 2.0 KiB/s");
    }

    #[test]
    fn one_second_of_cpu_per_second_is_full_usage_of_one_vcpu() {
        let mut engine = RateEngine::new();
        engine.observe(&cpu_only(SEC), 1.0, 1);
        let rates = engine.observe(&cpu_only(2 * SEC), 1.0, 1);
        assert_eq!(rates.cpu, Reading::Value(100.0));
        assert_eq!(rates.cpu_cell(), "100.00%");

        let mut engine = RateEngine::new();
        engine.observe(&cpu_only(SEC), 1.0, 2);
        let rates = engine.observe(&cpu_only(2 * SEC), 1.0, 2);
        assert_eq!(rates.cpu, Reading::Value(50.0));
    }

    #[test]
    fn cpu_usage_is_clamped_to_100() {
        // 3s of CPU time in 1s on a single vCPU: jitter or clock skew.
        assert_eq!(cpu_percent(3 * SEC, 1.0, 1), 100.0);

        let mut engine = RateEngine::new();
        engine.observe(&cpu_only(0), 1.0, 1);
        let rates = engine.observe(&cpu_only(3 * SEC), 1.0, 1);
        assert_eq!(rates.cpu, Reading::Value(100.0));
    }

    #[test]
    fn cpu_usage_stays_in_range_for_increasing_counters() {
        let mut engine = RateEngine::new();
        let mut cpu = 0u64;
        engine.observe(&cpu_only(cpu), 1.0, 4);
        for step in [1u64, 10, 1_000, SEC / 3, SEC, 4 * SEC, 17 * SEC] {
            cpu += step;
            for elapsed in [0.5, 1.0, 2.0] {
                let rates = engine.observe(&cpu_only(cpu), elapsed, 4);
                let pct = *rates.cpu.value().unwrap_or(&-1.0);
                assert!((0.0..=100.0).contains(&pct), "pct {pct} out of range");
            }
        }
    }

    #[test]
    fn zero_is_a_legitimate_first_counter_value() {
        let mut engine = RateEngine::new();
        let rates = engine.observe(&full(0, (0, 0), (0, 0)), 1.0, 1);
        assert_eq!(rates.disk, Reading::Pending);

        // A stored zero is a real previous sample, not "no sample".
        let rates = engine.observe(&full(SEC / 2, (2048, 0), (0, 0)), 1.0, 1);
        assert_eq!(rates.cpu, Reading::Value(50.0));
        assert_eq!(
            rates.disk.value().map(|r| r.inbound),
            Some(2048.0),
            "delta from a zero baseline"
        );
    }

    #[test]
    fn counter_reset_is_treated_as_first_sample() {
        let mut engine = RateEngine::new();
        engine.observe(&full(10 * SEC, (5000, 5000), (5000, 5000)), 1.0, 1);

        // Domain restarted: counters went back down.
        let rates = engine.observe(&full(SEC, (10, 10), (10, 10)), 1.0, 1);
        assert_eq!(rates.cpu, Reading::Pending);
        assert_eq!(rates.disk, Reading::Pending);
        assert_eq!(rates.net, Reading::Pending);

        let rates = engine.observe(&full(2 * SEC, (20, 10), (10, 10)), 1.0, 1);
        assert_eq!(rates.cpu, Reading::Value(100.0));
        assert_eq!(rates.disk.value().map(|r| r.inbound), Some(10.0));
    }

    #[test]
    fn missing_metric_is_unavailable_and_resets_its_history() {
        let mut engine = RateEngine::new();
        engine.observe(&full(SEC, (0, 0), (0, 0)), 1.0, 1);

        let mut sample = full(2 * SEC, (100, 100), (100, 100));
        sample.disk = None;
        let rates = engine.observe(&sample, 1.0, 1);
        assert_eq!(rates.disk, Reading::Unavailable);
        assert_eq!(rates.disk_cell(), "");
        assert!(rates.cpu.value().is_some());

        // Disk comes back: first sample again.
        let rates = engine.observe(&full(3 * SEC, (200, 200), (200, 200)), 1.0, 1);
        assert_eq!(rates.disk, Reading::Pending);
        assert!(rates.net.value().is_some());
    }

    #[test]
    fn non_positive_elapsed_never_divides() {
        let mut engine = RateEngine::new();
        engine.observe(&cpu_only(SEC), 1.0, 1);
        let rates = engine.observe(&cpu_only(2 * SEC), 0.0, 1);
        assert_eq!(rates.cpu, Reading::Pending);

        // The sample was still stored.
        let rates = engine.observe(&cpu_only(3 * SEC), 1.0, 1);
        assert_eq!(rates.cpu, Reading::Value(100.0));
    }

    #[test]
    fn zero_vcpus_is_treated_as_one() {
        assert_eq!(cpu_percent(SEC / 4, 1.0, 0), 25.0);
    }

    #[test]
    fn memory_usage_subtracts_unused_from_balloon() {
        let stats = [
            MemoryStat {
                tag: MemoryStatTag::Other(7),
                value_kib: 1,
            },
            MemoryStat {
                tag: MemoryStatTag::ActualBalloon,
                value_kib: 4 * 1024 * 1024,
            },
            MemoryStat {
                tag: MemoryStatTag::Unused,
                value_kib: 3 * 1024 * 1024,
            },
        ];
        let usage = memory_usage(&stats).unwrap();
        assert_eq!(usage.used_kib, 1024 * 1024);
        assert_eq!(usage.cell(), "1.0 GiB / 4.0 GiB");
    }

    #[test]
    fn memory_usage_requires_both_tags() {
        let only_balloon = [MemoryStat {
            tag: MemoryStatTag::ActualBalloon,
            value_kib: 1024,
        }];
        assert!(matches!(
            memory_usage(&only_balloon),
            Err(Error::MetricUnavailable(_))
        ));

        let only_unused = [MemoryStat {
            tag: MemoryStatTag::Unused,
            value_kib: 1024,
        }];
        assert!(matches!(
            memory_usage(&only_unused),
            Err(Error::MetricUnavailable(_))
        ));
        assert!(memory_usage(&[]).is_err());
    }
}
