//! System source: CPU load, memory pressure and swap, either whole-system
//! or scoped to one package's process.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::warn;

use crate::procfs::{
    cpu_count, read_cpu_times, read_mem_info, read_process_cpu_secs, read_process_mem,
    CpuTimes, PidCache,
};
use crate::shell::package_pid;
use crate::source::{MetricDesc, MetricSource};

pub const SYSTEM_INTERVAL: Duration = Duration::from_millis(500);

pub static SYSTEM_METRICS: &[MetricDesc] = &[
    MetricDesc { key: "cpu_usg", label: "cpu usage (%)", console: true },
    MetricDesc { key: "mem_usg", label: "memory usage (%)", console: true },
    MetricDesc { key: "mem_swap", label: "swap cached (MB)", console: false },
];

pub struct SystemSource {
    /// Package to scope CPU and RSS to; empty means whole system.
    package: String,
    cpus: usize,
    prev_cpu: Option<CpuTimes>,
    prev_proc: Option<(f64, Instant)>,
    pids: PidCache,
    latest: HashMap<String, String>,
}

impl SystemSource {
    pub fn new(package: String) -> Self {
        Self {
            package,
            cpus: 1,
            prev_cpu: None,
            prev_proc: None,
            pids: PidCache::new(),
            latest: HashMap::new(),
        }
    }

    /// Whole-system busy share since the previous tick.
    fn system_cpu(&mut self) -> Option<f64> {
        let now = read_cpu_times()?;
        let usage = self.prev_cpu.map(|prev| now.usage_since(&prev));
        self.prev_cpu = Some(now);
        usage
    }

    /// The package's CPU share since the previous tick, normalized across
    /// all cores so it is comparable to the system number.
    fn process_cpu(&mut self) -> Option<f64> {
        let pid = self.pids.get(&self.package, package_pid)?;
        let Some(secs) = read_process_cpu_secs(pid) else {
            // Process likely died; re-resolve on the next tick.
            self.pids.invalidate(&self.package);
            self.prev_proc = None;
            return None;
        };
        let now = Instant::now();
        let usage = self.prev_proc.map(|(prev_secs, prev_at)| {
            let wall = now.duration_since(prev_at).as_secs_f64();
            if wall <= 0.0 {
                return 0.0;
            }
            (secs - prev_secs).max(0.0) * 100.0 / wall / self.cpus as f64
        });
        self.prev_proc = Some((secs, now));
        usage
    }
}

impl MetricSource for SystemSource {
    fn name(&self) -> &'static str {
        "system"
    }

    fn open(&mut self) -> bool {
        self.cpus = cpu_count();
        if read_cpu_times().is_none() {
            warn!("cpu accounting unavailable");
            return false;
        }
        true
    }

    fn tick(&mut self) {
        let cpu = if self.package.is_empty() {
            self.system_cpu()
        } else {
            self.process_cpu()
        };
        if let Some(cpu) = cpu {
            self.latest
                .insert("cpu_usg".to_string(), format!("{cpu:.1}"));
        }
        let Some(mem) = read_mem_info() else {
            return;
        };
        let (used, swap_mb) = if self.package.is_empty() {
            (mem.used_percent(), mem.swap_cached_mb())
        } else {
            let proc_mem = self
                .pids
                .get(&self.package, package_pid)
                .and_then(read_process_mem);
            match proc_mem {
                Some(m) if mem.total_kb > 0 => (
                    m.rss_kb as f64 * 100.0 / mem.total_kb as f64,
                    m.swap_kb as f64 / 1024.0,
                ),
                _ => return,
            }
        };
        self.latest
            .insert("mem_usg".to_string(), format!("{used:.1}"));
        self.latest
            .insert("mem_swap".to_string(), format!("{swap_mb:.2}"));
    }

    fn tick_interval(&self) -> Duration {
        SYSTEM_INTERVAL
    }

    fn describe(&self) -> &'static [MetricDesc] {
        SYSTEM_METRICS
    }

    fn sample(&mut self) -> HashMap<String, String> {
        self.latest.clone()
    }
}
