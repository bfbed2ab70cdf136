//! OS probes: CPU and memory samplers.
//!
//! Both samplers read procfs text on each tick and publish gauges into
//! the registry. Parsing is split from I/O so the arithmetic can be
//! tested on captured file contents.

use crate::error::CollectorError;
use crate::metrics::collector::Sampler;
use crate::metrics::metric::{Metric, MetricKind};
use crate::metrics::registry::MetricRegistry;
use std::fs;

// ── CPU ──────────────────────────────────────────────────────────────────────

/// Jiffy counters for one `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user:       u64,
    pub nice:       u64,
    pub system:     u64,
    pub idle:       u64,
    pub iowait:     u64,
    pub irq:        u64,
    pub softirq:    u64,
    pub steal:      u64,
    pub guest:      u64,
    pub guest_nice: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
            + self.guest
            + self.guest_nice
    }

    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// Busy percentage between two snapshots of the same CPU.
///
/// A zero total delta (e.g. two reads inside one jiffy) yields 0.0.
pub fn cpu_usage_percent(prev: &CpuTimes, curr: &CpuTimes) -> f64 {
    let total_delta = curr.total().saturating_sub(prev.total());
    if total_delta == 0 {
        return 0.0;
    }

    let idle_delta = curr.idle_total().saturating_sub(prev.idle_total());
    100.0 * (1.0 - idle_delta as f64 / total_delta as f64)
}

/// Parses the leading `cpu`/`cpuN` lines of `/proc/stat`.
///
/// Index 0 is the aggregate line, the rest are per-core in file order.
/// Stops at the first line that is not a CPU line.
pub fn parse_proc_stat(content: &str) -> Vec<CpuTimes> {
    let mut stats = Vec::new();

    for line in content.lines() {
        if !line.starts_with("cpu") {
            break;
        }

        let mut fields = line.split_whitespace();
        let _label = fields.next();
        let mut next = || fields.next().and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);

        stats.push(CpuTimes {
            user:       next(),
            nice:       next(),
            system:     next(),
            idle:       next(),
            iowait:     next(),
            irq:        next(),
            softirq:    next(),
            steal:      next(),
            guest:      next(),
            guest_nice: next(),
        });
    }

    stats
}

/// Publishes `cpu.usage` and `cpu.core.<i>.usage` gauges.
///
/// Holds the previous snapshot across ticks; the first tick only seeds
/// it and emits nothing. If the number of visible CPUs changes between
/// ticks (hotplug), the snapshot is reseeded and the tick is skipped.
pub struct CpuSampler {
    prev: Option<Vec<CpuTimes>>,
}

impl CpuSampler {
    pub fn new() -> CpuSampler {
        CpuSampler { prev: None }
    }

    fn read_stats() -> Vec<CpuTimes> {
        match fs::read_to_string("/proc/stat") {
            Ok(content) => parse_proc_stat(&content),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        CpuSampler::new()
    }
}

impl Sampler for CpuSampler {
    fn name(&self) -> &str {
        "cpu"
    }

    fn register_metrics(&mut self, registry: &MetricRegistry) -> Result<(), CollectorError> {
        // Per-core gauges are registered lazily on the first tick, once
        // the core count is known.
        registry.register(Metric::gauge("cpu.usage"))?;
        Ok(())
    }

    fn sample(&mut self, registry: &MetricRegistry) {
        let curr = CpuSampler::read_stats();
        if curr.is_empty() {
            return;
        }

        let prev = match self.prev.take() {
            Some(prev) if prev.len() == curr.len() => prev,
            _ => {
                // First tick, or the core count changed; seed and wait
                // for the next tick.
                self.prev = Some(curr);
                return;
            }
        };

        if let Some(metric) = registry.get("cpu.usage") {
            metric.update(cpu_usage_percent(&prev[0], &curr[0]));
        }

        for (i, (p, c)) in prev[1..].iter().zip(curr[1..].iter()).enumerate() {
            let name = format!("cpu.core.{}.usage", i);
            registry
                .ensure(&name, MetricKind::Gauge)
                .update(cpu_usage_percent(p, c));
        }

        self.prev = Some(curr);
    }
}

// ── Memory ───────────────────────────────────────────────────────────────────

/// Fields of interest from `/proc/meminfo`, all in KiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub total:      u64,
    pub free:       u64,
    pub available:  u64,
    pub buffers:    u64,
    pub cached:     u64,
    pub swap_total: u64,
    pub swap_free:  u64,
}

impl MemoryStats {
    /// `total - free - buffers - cached`
    pub fn used(&self) -> u64 {
        self.total
            .saturating_sub(self.free)
            .saturating_sub(self.buffers)
            .saturating_sub(self.cached)
    }

    pub fn swap_used(&self) -> u64 {
        self.swap_total.saturating_sub(self.swap_free)
    }
}

/// Parses `/proc/meminfo` key/value lines.
pub fn parse_meminfo(content: &str) -> MemoryStats {
    let mut stats = MemoryStats::default();

    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let key = match fields.next() {
            Some(k) => k,
            None => continue,
        };
        let value = fields.next().and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);

        match key {
            "MemTotal:" => stats.total = value,
            "MemFree:" => stats.free = value,
            "MemAvailable:" => stats.available = value,
            "Buffers:" => stats.buffers = value,
            "Cached:" => stats.cached = value,
            "SwapTotal:" => stats.swap_total = value,
            "SwapFree:" => stats.swap_free = value,
            _ => {}
        }
    }

    stats
}

/// Publishes the `memory.*` gauge family, KiB except the percentages.
pub struct MemorySampler;

impl MemorySampler {
    pub fn new() -> MemorySampler {
        MemorySampler
    }

    fn read_stats() -> MemoryStats {
        match fs::read_to_string("/proc/meminfo") {
            Ok(content) => parse_meminfo(&content),
            Err(_) => MemoryStats::default(),
        }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        MemorySampler::new()
    }
}

impl Sampler for MemorySampler {
    fn name(&self) -> &str {
        "memory"
    }

    fn register_metrics(&mut self, registry: &MetricRegistry) -> Result<(), CollectorError> {
        registry.register(Metric::gauge("memory.total"))?;
        registry.register(Metric::gauge("memory.used"))?;
        registry.register(Metric::gauge("memory.free"))?;
        registry.register(Metric::gauge("memory.usage_percent"))?;
        registry.register(Metric::gauge("memory.swap_total"))?;
        registry.register(Metric::gauge("memory.swap_used"))?;
        registry.register(Metric::gauge("memory.swap_usage_percent"))?;
        Ok(())
    }

    fn sample(&mut self, registry: &MetricRegistry) {
        let stats = MemorySampler::read_stats();

        let update = |name: &str, value: f64| {
            if let Some(metric) = registry.get(name) {
                metric.update(value);
            }
        };

        update("memory.total", stats.total as f64);
        update("memory.used", stats.used() as f64);
        update("memory.free", stats.free as f64);
        if stats.total > 0 {
            update(
                "memory.usage_percent",
                100.0 * stats.used() as f64 / stats.total as f64,
            );
        }

        update("memory.swap_total", stats.swap_total as f64);
        update("memory.swap_used", stats.swap_used() as f64);
        if stats.swap_total > 0 {
            update(
                "memory.swap_usage_percent",
                100.0 * stats.swap_used() as f64 / stats.swap_total as f64,
            );
        }
    }
}
