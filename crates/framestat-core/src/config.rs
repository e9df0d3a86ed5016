//! Session configuration shared by the scheduler and the sources.

use std::time::Duration;

/// Default host for the ping source.
pub const DEFAULT_PING_HOST: &str = "www.baidu.com";

/// Cadence of the console/log reporting loop.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// One monitoring session's settings. Built by the CLI, read-only afterwards.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Package to monitor; empty means follow the foreground activity.
    pub package: String,
    /// Explicit surface substring to track instead of resolving one.
    pub target_surface: String,
    /// Keep the first resolved surface for the whole session instead of
    /// re-resolving when the foreground changes.
    pub lock_surface: bool,
    /// Host the ping source probes.
    pub ping_host: String,
    /// Cadence of the reporting loop.
    pub report_interval: Duration,
    /// Sample log path; `None` disables the log.
    pub output: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            package: String::new(),
            target_surface: String::new(),
            lock_surface: false,
            ping_host: DEFAULT_PING_HOST.to_string(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            output: None,
        }
    }
}
