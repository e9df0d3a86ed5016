//! The monitoring session: sources, scheduler, sample log, query listener.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::warn;

use framestat_core::config::AgentConfig;
use framestat_core::recorder::SampleLog;
use framestat_core::scheduler::Scheduler;
use framestat_core::shell::AndroidShell;
use framestat_core::sources::all_sources;
use framestat_core::surface::shared_surface;
use framestat_server::QueryState;

pub struct RunCommandConfig {
    pub package: Option<String>,
    pub surface: Option<String>,
    pub lock_surface: bool,
    pub ping_host: String,
    pub interval_secs: u64,
    pub output: Option<String>,
    pub listen: bool,
}

pub fn run(cmd: RunCommandConfig) {
    let config = AgentConfig {
        package: cmd.package.unwrap_or_default(),
        target_surface: cmd.surface.unwrap_or_default(),
        lock_surface: cmd.lock_surface,
        ping_host: cmd.ping_host,
        report_interval: Duration::from_secs(cmd.interval_secs.max(1)),
        output: cmd.output,
    };

    let shared = shared_surface();
    let query = Arc::new(AndroidShell::new());
    let sources = all_sources(query, &config, shared.clone());
    let mut scheduler = Scheduler::new(sources, config.report_interval);
    if scheduler.source_names().is_empty() {
        eprintln!("Error: no metric source could open on this device");
        std::process::exit(1);
    }

    if let Some(path) = &config.output {
        match SampleLog::create(Path::new(path), &scheduler.columns()) {
            Ok(log) => {
                println!("Sample log {} -> {path}", log.id());
                scheduler.attach_log(log);
            }
            Err(e) => {
                eprintln!("Error creating sample log {path}: {e}");
                std::process::exit(1);
            }
        }
    }

    if cmd.listen {
        let state = QueryState {
            surface: shared.clone(),
        };
        thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("query listener runtime: {e}");
                    return;
                }
            };
            if let Err(e) = rt.block_on(framestat_server::run(state)) {
                warn!("query listener: {e}");
            }
        });
    }

    let stop = scheduler.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        stop.store(true, Ordering::Relaxed);
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    println!(
        "Monitoring {}",
        if config.package.is_empty() {
            "the foreground package"
        } else {
            &config.package
        }
    );
    println!("  Sources:  {}", scheduler.source_names().join(", "));
    println!("  Interval: {}s, until Ctrl+C", config.report_interval.as_secs());
    println!();

    scheduler.start_ticking();
    let result = scheduler.run();
    scheduler.stop();
    if let Err(e) = result {
        eprintln!("Error writing sample log: {e}");
        std::process::exit(1);
    }
}
