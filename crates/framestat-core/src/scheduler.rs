//! Source scheduling and the reporting loop.
//!
//! Each source ticks on its own thread at its own cadence; the reporting
//! loop runs on the caller's thread, samples every source once per
//! interval, prints the console table and appends the sample log row.
//! Stopping is cooperative through a shared flag so a signal handler can
//! end the session from outside.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{info, warn};

use crate::recorder::SampleLog;
use crate::source::{MetricDesc, MetricSource};

/// Console rows between repeated header lines.
pub const HEADER_EVERY: usize = 30;

/// Console column width.
const COLUMN_WIDTH: usize = 11;

struct SourceEntry {
    name: &'static str,
    descs: &'static [MetricDesc],
    source: Arc<Mutex<Box<dyn MetricSource>>>,
    interval: Duration,
}

pub struct Scheduler {
    entries: Vec<SourceEntry>,
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    report_interval: Duration,
    log: Option<SampleLog>,
    rows: usize,
}

impl Scheduler {
    /// Open every source, dropping the ones that refuse. Sources that fail
    /// to open degrade the session, they never abort it.
    pub fn new(sources: Vec<Box<dyn MetricSource>>, report_interval: Duration) -> Self {
        let mut entries = Vec::new();
        for mut source in sources {
            if !source.open() {
                warn!("source {} failed to open, skipping", source.name());
                continue;
            }
            info!("source {} open", source.name());
            entries.push(SourceEntry {
                name: source.name(),
                descs: source.describe(),
                interval: source.tick_interval(),
                source: Arc::new(Mutex::new(source)),
            });
        }
        Self {
            entries,
            stop: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
            report_interval,
            log: None,
            rows: 0,
        }
    }

    /// Flag a signal handler can set to end [`run`](Self::run).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Names of the open sources, in report order.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.name).collect()
    }

    /// All log columns: the timestamp, then every source's keys in order.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["time"];
        for entry in &self.entries {
            columns.extend(entry.descs.iter().map(|d| d.key));
        }
        columns
    }

    pub fn attach_log(&mut self, log: SampleLog) {
        self.log = Some(log);
    }

    /// Spawn one collector thread per source.
    pub fn start_ticking(&mut self) {
        for entry in &self.entries {
            let source = entry.source.clone();
            let stop = self.stop.clone();
            let interval = entry.interval;
            let name = entry.name;
            self.handles.push(thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if let Ok(mut source) = source.lock() {
                        source.tick();
                    }
                    thread::sleep(interval);
                }
                info!("source {name} collector done");
            }));
        }
    }

    /// Reporting loop; returns once the stop flag is set.
    pub fn run(&mut self) -> io::Result<()> {
        while !self.stop.load(Ordering::Relaxed) {
            thread::sleep(self.report_interval);
            self.report_once()?;
        }
        Ok(())
    }

    /// Sample every source once, print the console row, append the log row.
    pub fn report_once(&mut self) -> io::Result<()> {
        let mut fields = HashMap::new();
        for entry in &self.entries {
            if let Ok(mut source) = entry.source.lock() {
                fields.extend(source.sample());
            }
        }
        let time = clock_time(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        );

        if self.rows % HEADER_EVERY == 0 {
            println!("{}", console_header(&self.entries_descs()));
        }
        println!("{}", console_row(&time, &self.entries_descs(), &fields));
        self.rows += 1;

        if let Some(log) = &mut self.log {
            let mut row = vec![time];
            for entry in &self.entries {
                for desc in entry.descs {
                    row.push(fields.get(desc.key).cloned().unwrap_or_default());
                }
            }
            log.append_row(&row)?;
        }
        Ok(())
    }

    fn entries_descs(&self) -> Vec<&'static MetricDesc> {
        self.entries.iter().flat_map(|e| e.descs.iter()).collect()
    }

    /// Set the stop flag, join the collector threads and close the sources.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("collector thread panicked");
            }
        }
        for entry in &self.entries {
            if let Ok(mut source) = entry.source.lock() {
                source.close();
            }
        }
        info!("scheduler stopped");
    }
}

/// HH:MM:SS of a UTC epoch-second timestamp.
pub fn clock_time(epoch_secs: u64) -> String {
    let day = epoch_secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, day % 3600 / 60, day % 60)
}

/// The console header line over the console-visible columns.
pub fn console_header(descs: &[&MetricDesc]) -> String {
    let mut line = format!("{:>width$}", "time", width = COLUMN_WIDTH);
    for desc in descs.iter().filter(|d| d.console) {
        line.push_str(&format!("{:>width$}", desc.key, width = COLUMN_WIDTH));
    }
    line
}

/// One console row; missing values print blank.
pub fn console_row(time: &str, descs: &[&MetricDesc], fields: &HashMap<String, String>) -> String {
    let mut line = format!("{time:>width$}", width = COLUMN_WIDTH);
    for desc in descs.iter().filter(|d| d.console) {
        let value = fields.get(desc.key).map(String::as_str).unwrap_or("");
        line.push_str(&format!("{value:>width$}", width = COLUMN_WIDTH));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    static COUNTING_METRICS: &[MetricDesc] = &[
        MetricDesc { key: "ticks", label: "tick count", console: true },
        MetricDesc { key: "hidden", label: "not on console", console: false },
    ];

    struct CountingSource {
        ticks: Arc<AtomicUsize>,
        openable: bool,
        closed: Arc<AtomicBool>,
    }

    impl MetricSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn open(&mut self) -> bool {
            self.openable
        }

        fn tick(&mut self) {
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }

        fn tick_interval(&self) -> Duration {
            Duration::from_millis(5)
        }

        fn describe(&self) -> &'static [MetricDesc] {
            COUNTING_METRICS
        }

        fn sample(&mut self) -> HashMap<String, String> {
            HashMap::from([(
                "ticks".to_string(),
                self.ticks.load(Ordering::Relaxed).to_string(),
            )])
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    fn counting_source(openable: bool) -> (Box<dyn MetricSource>, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let source = Box::new(CountingSource {
            ticks: ticks.clone(),
            openable,
            closed: closed.clone(),
        });
        (source, ticks, closed)
    }

    #[test]
    fn failed_open_drops_the_source() {
        let (bad, _, _) = counting_source(false);
        let (good, _, _) = counting_source(true);
        let scheduler = Scheduler::new(vec![bad, good], Duration::from_secs(1));
        assert_eq!(scheduler.source_names(), vec!["counting"]);
    }

    #[test]
    fn columns_start_with_time() {
        let (source, _, _) = counting_source(true);
        let scheduler = Scheduler::new(vec![source], Duration::from_secs(1));
        assert_eq!(scheduler.columns(), vec!["time", "ticks", "hidden"]);
    }

    #[test]
    fn collector_thread_ticks_until_stopped() {
        let (source, ticks, closed) = counting_source(true);
        let mut scheduler = Scheduler::new(vec![source], Duration::from_secs(1));
        scheduler.start_ticking();
        thread::sleep(Duration::from_millis(60));
        scheduler.stop();
        let seen = ticks.load(Ordering::Relaxed);
        assert!(seen >= 2, "only {seen} ticks");
        assert!(closed.load(Ordering::Relaxed));
        // No further ticking after stop.
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::Relaxed), seen);
    }

    #[test]
    fn report_writes_padded_log_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let (source, _, _) = counting_source(true);
        let mut scheduler = Scheduler::new(vec![source], Duration::from_secs(1));
        let log = SampleLog::create(&path, &scheduler.columns()).unwrap();
        scheduler.attach_log(log);
        scheduler.report_once().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let row = text.lines().last().unwrap();
        let cells: Vec<&str> = row.split(',').collect();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[1], "0"); // ticks sampled, no collector running
        assert_eq!(cells[2], ""); // hidden column never sampled
    }

    #[test]
    fn clock_time_wraps_at_midnight() {
        assert_eq!(clock_time(0), "00:00:00");
        assert_eq!(clock_time(86_399), "23:59:59");
        assert_eq!(clock_time(86_400 + 3_723), "01:02:03");
    }

    #[test]
    fn console_hides_non_console_columns() {
        let descs: Vec<&MetricDesc> = COUNTING_METRICS.iter().collect();
        let header = console_header(&descs);
        assert!(header.contains("ticks"));
        assert!(!header.contains("hidden"));
        let fields = HashMap::from([("ticks".to_string(), "7".to_string())]);
        let row = console_row("10:00:00", &descs, &fields);
        assert!(row.contains("10:00:00"));
        assert!(row.ends_with("          7"));
    }
}
