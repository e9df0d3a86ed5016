//! Network source: per-tick traffic deltas over the radio and wifi
//! interfaces, in kilobytes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::procfs::{read_net_dev, NetDevCounters, PidCache};
use crate::shell::package_pid;
use crate::source::{MetricDesc, MetricSource};

pub const NETWORK_INTERVAL: Duration = Duration::from_millis(500);

/// Interfaces that carry user traffic: cellular data (qualcomm and mediatek
/// naming) and wifi. Everything else is loopback or tethering noise.
pub const TRAFFIC_INTERFACES: &[&str] = &["rmnet_data", "ccmni", "wlan"];

pub static NETWORK_METRICS: &[MetricDesc] = &[
    MetricDesc { key: "net_in", label: "received (KB)", console: true },
    MetricDesc { key: "net_out", label: "sent (KB)", console: true },
];

pub struct NetworkSource {
    /// Package whose namespace view to read; empty means the root one.
    package: String,
    pids: PidCache,
    prev: Option<(NetDevCounters, Instant)>,
    latest: HashMap<String, String>,
}

impl NetworkSource {
    pub fn new(package: String) -> Self {
        Self {
            package,
            pids: PidCache::new(),
            prev: None,
            latest: HashMap::new(),
        }
    }
}

/// Sum the counters of the traffic-carrying interfaces.
pub fn total_traffic(counters: &HashMap<String, NetDevCounters>) -> NetDevCounters {
    let mut total = NetDevCounters::default();
    for (name, c) in counters {
        if TRAFFIC_INTERFACES.iter().any(|p| name.starts_with(p)) {
            total.rx_bytes += c.rx_bytes;
            total.tx_bytes += c.tx_bytes;
        }
    }
    total
}

/// Render a bytes-per-second rate as KB/s, at most 6 characters wide so
/// the console column stays aligned.
pub fn format_kb(bytes_per_sec: f64) -> String {
    let mut s = format!("{:.6}", bytes_per_sec / 1024.0);
    s.truncate(6);
    s
}

impl MetricSource for NetworkSource {
    fn name(&self) -> &'static str {
        "network"
    }

    fn open(&mut self) -> bool {
        read_net_dev(None).is_some()
    }

    fn tick(&mut self) {
        let pid = if self.package.is_empty() {
            None
        } else {
            match self.pids.get(&self.package, package_pid) {
                Some(pid) => Some(pid),
                None => return,
            }
        };
        let Some(counters) = read_net_dev(pid) else {
            return;
        };
        let now = total_traffic(&counters);
        let at = Instant::now();
        if let Some((prev, prev_at)) = self.prev {
            // Rate over actual elapsed time, not the nominal tick interval;
            // collector threads drift under load.
            let elapsed = at.duration_since(prev_at).as_secs_f64();
            if elapsed > 0.0 {
                let rx = now.rx_bytes.saturating_sub(prev.rx_bytes) as f64 / elapsed;
                let tx = now.tx_bytes.saturating_sub(prev.tx_bytes) as f64 / elapsed;
                self.latest.insert("net_in".to_string(), format_kb(rx));
                self.latest.insert("net_out".to_string(), format_kb(tx));
            }
        }
        self.prev = Some((now, at));
    }

    fn tick_interval(&self) -> Duration {
        NETWORK_INTERVAL
    }

    fn describe(&self) -> &'static [MetricDesc] {
        NETWORK_METRICS
    }

    fn sample(&mut self) -> HashMap<String, String> {
        self.latest.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procfs::parse_net_dev;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 9999999    500    0    0    0     0          0         0  9999999     500    0    0    0     0       0          0
 wlan0: 5000000   4000    0    0    0     0          0         0  1200000    2500    0    0    0     0       0          0
rmnet_data0: 300000 200   0    0    0     0          0         0   100000     120    0    0    0     0       0          0
  eth0: 7777777   1000    0    0    0     0          0         0  7777777    1000    0    0    0     0       0          0
";

    #[test]
    fn traffic_total_respects_allowlist() {
        let counters = parse_net_dev(NET_DEV);
        let total = total_traffic(&counters);
        // lo and eth0 excluded.
        assert_eq!(total.rx_bytes, 5_000_000 + 300_000);
        assert_eq!(total.tx_bytes, 1_200_000 + 100_000);
    }

    #[test]
    fn traffic_total_empty_without_known_interfaces() {
        let counters = parse_net_dev("h\nh\n  eth0: 1 0 0 0 0 0 0 0 2 0 0 0 0 0 0 0\n");
        assert_eq!(total_traffic(&counters), NetDevCounters::default());
    }

    #[test]
    fn kb_formatting_is_six_chars_max() {
        assert_eq!(format_kb(512.0), "0.5000");
        assert_eq!(format_kb(0.0), "0.0000");
        assert_eq!(format_kb(1024.0 * 1234.0), "1234.0");
        assert_eq!(format_kb(1024.0 * 1234.0 + 700.0), "1234.6");
    }

    #[test]
    fn first_tick_reports_nothing() {
        let mut source = NetworkSource::new(String::new());
        if !source.open() {
            return; // no procfs here
        }
        source.tick();
        assert!(source.sample().is_empty());
        source.tick();
        let fields = source.sample();
        assert!(fields.contains_key("net_in"));
        assert!(fields.contains_key("net_out"));
    }
}
