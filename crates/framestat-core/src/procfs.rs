//! Procfs readers for the system and network sources.
//!
//! Counter types carry raw cumulative values; usage percentages come from
//! deltas between two snapshots taken by the source tick. Parsers are pure
//! functions over file text so the canned-transcript tests never touch the
//! live /proc.

use std::collections::HashMap;
use std::fs;
use std::time::{Duration, Instant};

use log::debug;

/// How long a resolved package pid stays trusted before re-resolving.
pub const PID_CACHE_TTL: Duration = Duration::from_secs(10);

/// Cumulative CPU jiffies from the aggregate `cpu` line of /proc/stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

impl CpuTimes {
    /// Busy share between two snapshots, in percent.
    pub fn usage_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        let idle = self.idle.saturating_sub(earlier.idle);
        (total - idle.min(total)) as f64 * 100.0 / total as f64
    }
}

pub fn read_cpu_times() -> Option<CpuTimes> {
    parse_cpu_times(&fs::read_to_string("/proc/stat").ok()?)
}

/// Parse the aggregate `cpu` line: user nice system idle iowait irq softirq
/// steal. Idle counts idle plus iowait.
pub fn parse_cpu_times(raw: &str) -> Option<CpuTimes> {
    let line = raw.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 5 {
        return None;
    }
    Some(CpuTimes {
        total: fields.iter().sum(),
        idle: fields[3] + fields[4],
    })
}

/// Number of online CPUs, per the `cpuN` lines of /proc/stat.
pub fn cpu_count() -> usize {
    fs::read_to_string("/proc/stat")
        .map(|raw| count_cpus(&raw))
        .unwrap_or(1)
}

pub fn count_cpus(raw: &str) -> usize {
    let n = raw
        .lines()
        .filter(|l| l.starts_with("cpu") && l.as_bytes().get(3).is_some_and(u8::is_ascii_digit))
        .count();
    n.max(1)
}

/// Jiffies-per-second tick rate of this kernel.
pub fn clock_ticks_per_sec() -> i64 {
    // sysconf never fails for _SC_CLK_TCK on Linux; guard anyway.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks } else { 100 }
}

/// Cumulative CPU seconds one process has consumed (utime + stime).
pub fn read_process_cpu_secs(pid: i32) -> Option<f64> {
    let raw = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let jiffies = parse_process_jiffies(&raw)?;
    Some(jiffies as f64 / clock_ticks_per_sec() as f64)
}

/// Parse utime + stime from a /proc/pid/stat line. The comm field can
/// contain spaces and parentheses, so fields are counted after the last
/// closing parenthesis: utime and stime are the 12th and 13th beyond it.
pub fn parse_process_jiffies(raw: &str) -> Option<u64> {
    let after = &raw[raw.rfind(')')? + 1..];
    let fields: Vec<&str> = after.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

/// Memory snapshot from /proc/meminfo, in kilobytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kb: u64,
    pub available_kb: u64,
    pub swap_cached_kb: u64,
}

impl MemInfo {
    /// Used share of physical memory, in percent.
    pub fn used_percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        self.total_kb.saturating_sub(self.available_kb) as f64 * 100.0 / self.total_kb as f64
    }

    pub fn swap_cached_mb(&self) -> f64 {
        self.swap_cached_kb as f64 / 1024.0
    }
}

pub fn read_mem_info() -> Option<MemInfo> {
    Some(parse_mem_info(&fs::read_to_string("/proc/meminfo").ok()?))
}

pub fn parse_mem_info(raw: &str) -> MemInfo {
    let mut info = MemInfo::default();
    for line in raw.lines() {
        let mut fields = line.split_whitespace();
        let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(value) = value.parse::<u64>() else {
            continue;
        };
        match key {
            "MemTotal:" => info.total_kb = value,
            "MemAvailable:" => info.available_kb = value,
            "SwapCached:" => info.swap_cached_kb = value,
            _ => {}
        }
    }
    info
}

/// Resident set size and swapped-out size of one process, in kilobytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessMem {
    pub rss_kb: u64,
    pub swap_kb: u64,
}

pub fn read_process_mem(pid: i32) -> Option<ProcessMem> {
    let raw = fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    parse_process_mem(&raw)
}

/// Parse VmRSS and VmSwap out of /proc/pid/status. VmSwap is absent on
/// swapless kernels and reads as zero.
pub fn parse_process_mem(raw: &str) -> Option<ProcessMem> {
    let field = |key: &str| -> Option<u64> {
        let line = raw.lines().find(|l| l.starts_with(key))?;
        line.split_whitespace().nth(1)?.parse().ok()
    };
    Some(ProcessMem {
        rss_kb: field("VmRSS:")?,
        swap_kb: field("VmSwap:").unwrap_or(0),
    })
}

/// Cumulative per-interface byte counters from /proc/net/dev.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetDevCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Whole-system counters; `pid` scopes the read to one process's network
/// namespace view.
pub fn read_net_dev(pid: Option<i32>) -> Option<HashMap<String, NetDevCounters>> {
    let path = match pid {
        Some(pid) => format!("/proc/{pid}/net/dev"),
        None => "/proc/net/dev".to_string(),
    };
    Some(parse_net_dev(&fs::read_to_string(path).ok()?))
}

/// Parse /proc/net/dev: interface name, then rx bytes first and tx bytes
/// ninth among the counters.
pub fn parse_net_dev(raw: &str) -> HashMap<String, NetDevCounters> {
    let mut counters = HashMap::new();
    for line in raw.lines().skip(2) {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let fields: Vec<u64> = rest
            .split_whitespace()
            .filter_map(|f| f.parse().ok())
            .collect();
        if fields.len() < 9 {
            continue;
        }
        counters.insert(
            name.trim().to_string(),
            NetDevCounters {
                rx_bytes: fields[0],
                tx_bytes: fields[8],
            },
        );
    }
    counters
}

/// Package-name-to-pid cache with a short TTL, so per-process sources do
/// not shell out on every tick.
#[derive(Debug, Default)]
pub struct PidCache {
    entries: HashMap<String, (i32, Instant)>,
}

impl PidCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached pid for `name`, re-resolving through `lookup` once the entry
    /// is older than [`PID_CACHE_TTL`].
    pub fn get(&mut self, name: &str, lookup: impl FnOnce(&str) -> Option<i32>) -> Option<i32> {
        if let Some((pid, at)) = self.entries.get(name) {
            if at.elapsed() < PID_CACHE_TTL {
                return Some(*pid);
            }
        }
        let pid = lookup(name)?;
        debug!("pid cache: {name} -> {pid}");
        self.entries.insert(name.to_string(), (pid, Instant::now()));
        Some(pid)
    }

    pub fn invalidate(&mut self, name: &str) {
        self.entries.remove(name);
    }
}
