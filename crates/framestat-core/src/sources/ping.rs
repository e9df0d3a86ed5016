//! Ping source: round-trip time and loss against a fixed host.

use std::collections::HashMap;
use std::time::Duration;

use log::warn;

use crate::shell::{ping, PingStat};
use crate::source::{MetricDesc, MetricSource};

/// Probes per tick; at the 200ms send interval a burst takes under a
/// second, which keeps one tick within the interval.
pub const PING_COUNT: u32 = 4;

pub const PING_INTERVAL: Duration = Duration::from_secs(1);

pub static PING_METRICS: &[MetricDesc] = &[
    MetricDesc { key: "rtt", label: "round trip (ms)", console: true },
    MetricDesc { key: "loss", label: "lost probes", console: true },
];

pub struct PingSource {
    host: String,
    latest: HashMap<String, String>,
}

impl PingSource {
    pub fn new(host: String) -> Self {
        Self {
            host,
            latest: HashMap::new(),
        }
    }

    fn record(&mut self, stat: &PingStat) {
        self.latest
            .insert("rtt".to_string(), format!("{:.1}", stat.avg_rtt_ms()));
        self.latest
            .insert("loss".to_string(), stat.lost().to_string());
    }
}

impl MetricSource for PingSource {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn open(&mut self) -> bool {
        if self.host.is_empty() {
            return false;
        }
        // An unreachable host still opens; loss is the signal then.
        true
    }

    fn tick(&mut self) {
        match ping(&self.host, PING_COUNT) {
            Some(stat) => self.record(&stat),
            None => warn!("ping {} failed to run", self.host),
        }
    }

    fn tick_interval(&self) -> Duration {
        PING_INTERVAL
    }

    fn describe(&self) -> &'static [MetricDesc] {
        PING_METRICS
    }

    fn sample(&mut self) -> HashMap<String, String> {
        self.latest.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_host_refuses_to_open() {
        assert!(!PingSource::new(String::new()).open());
    }

    #[test]
    fn record_renders_rtt_and_loss() {
        let mut source = PingSource::new("example.com".to_string());
        source.record(&PingStat {
            sent: 4,
            received: 3,
            rtts_ms: vec![10.0, 12.0, 14.0],
        });
        let fields = source.sample();
        assert_eq!(fields["rtt"], "12.0");
        assert_eq!(fields["loss"], "1");
    }

    #[test]
    fn record_all_lost() {
        let mut source = PingSource::new("example.com".to_string());
        source.record(&PingStat {
            sent: 4,
            received: 0,
            rtts_ms: Vec::new(),
        });
        let fields = source.sample();
        assert_eq!(fields["rtt"], "0.0");
        assert_eq!(fields["loss"], "4");
    }
}
