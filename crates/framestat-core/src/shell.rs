//! On-device shell plumbing.
//!
//! Everything here shells out through `sh -c` and parses text, because that
//! is the only stable contract the platform offers for compositor and
//! activity-manager state. All commands are best-effort: a failed or
//! garbled command yields `None` and the caller degrades.

use std::path::Path;
use std::process::Command;

use log::debug;
use serde::Serialize;

use crate::device::{parse_foreground_package, SurfaceQuery};

/// SDK level where the resumed-activity dump key changed.
const TOP_RESUMED_MIN_SDK: i64 = 33;

/// Run `command` through the system shell and return its combined output.
pub fn run(command: &str) -> Option<String> {
    let shell = if Path::new("/bin/sh").exists() {
        "/bin/sh"
    } else {
        "sh"
    };
    let output = Command::new(shell).arg("-c").arg(command).output().ok()?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    debug!("$ {command} -> {} bytes", text.len());
    Some(text)
}

/// Shell-backed device queries. SDK version is probed once at construction;
/// everything else is a live command per call.
pub struct AndroidShell {
    sdk: i64,
}

impl AndroidShell {
    pub fn new() -> Self {
        let sdk = run("getprop ro.build.version.sdk")
            .and_then(|out| out.trim().parse::<i64>().ok())
            .unwrap_or(0);
        debug!("device sdk {sdk}");
        Self { sdk }
    }
}

impl Default for AndroidShell {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceQuery for AndroidShell {
    fn list_surfaces(&self) -> Option<String> {
        run("dumpsys SurfaceFlinger --list")
    }

    fn latency_raw(&self, surface: &str) -> Option<String> {
        run(&format!("dumpsys SurfaceFlinger --latency \"{surface}\""))
    }

    fn framestats_raw(&self, package: &str) -> Option<String> {
        run(&format!("dumpsys gfxinfo {package} framestats"))
    }

    fn foreground_package(&self) -> Option<String> {
        let key = if self.sdk >= TOP_RESUMED_MIN_SDK {
            "topResumedActivity"
        } else {
            "mResumedActivity"
        };
        let out = run(&format!("dumpsys activity activities |grep {key}"))?;
        parse_foreground_package(&out)
    }

    fn sdk_version(&self) -> i64 {
        self.sdk
    }
}

/// A package visible in the process list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunningPackage {
    pub name: String,
    pub pid: i32,
    pub topmost: bool,
}

/// Packages currently running, with the foreground one flagged.
pub fn running_packages(query: &dyn SurfaceQuery) -> Vec<RunningPackage> {
    let foreground = query.foreground_package().unwrap_or_default();
    match run("ps -A -o PID,NAME") {
        Some(out) => parse_process_list(&out, &foreground),
        None => Vec::new(),
    }
}

/// Parse a `ps -A -o PID,NAME` listing, keeping package-shaped names.
pub fn parse_process_list(raw: &str, foreground: &str) -> Vec<RunningPackage> {
    let mut packages = Vec::new();
    for line in raw.lines().skip(1) {
        let mut fields = line.split_whitespace();
        let (Some(pid), Some(name)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(pid) = pid.parse::<i32>() else {
            continue;
        };
        // Package processes are reverse-domain names; kernel threads and
        // daemons are not.
        if !name.contains('.') || name.starts_with('[') {
            continue;
        }
        // Subprocesses show as pkg:service; key by the package part.
        let name = name.split(':').next().unwrap_or(name);
        packages.push(RunningPackage {
            name: name.to_string(),
            pid,
            topmost: !foreground.is_empty() && name == foreground,
        });
    }
    packages
}

/// Process id of a running package, smallest pid winning when the package
/// has service subprocesses.
pub fn package_pid(name: &str) -> Option<i32> {
    let out = run(&format!("pidof {name}"))?;
    out.split_whitespace()
        .filter_map(|p| p.parse::<i32>().ok())
        .min()
}

/// Outcome of one ping run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingStat {
    pub sent: u64,
    pub received: u64,
    pub rtts_ms: Vec<f64>,
}

impl PingStat {
    /// Mean round-trip time over the received replies, zero when none came
    /// back.
    pub fn avg_rtt_ms(&self) -> f64 {
        if self.rtts_ms.is_empty() {
            return 0.0;
        }
        self.rtts_ms.iter().sum::<f64>() / self.rtts_ms.len() as f64
    }

    pub fn lost(&self) -> u64 {
        self.sent.saturating_sub(self.received)
    }
}

/// Ping `host` `count` times at a 200ms interval with a 1s reply timeout.
pub fn ping(host: &str, count: u32) -> Option<PingStat> {
    let out = run(&format!("ping -c {count} -i 0.2 -W 1000 {host}"))?;
    Some(parse_ping(&out))
}

/// Parse standard ping output: per-reply `time=` values and the
/// transmitted/received summary line.
pub fn parse_ping(raw: &str) -> PingStat {
    let mut stat = PingStat::default();
    for line in raw.lines() {
        if let Some(pos) = line.find("time=") {
            let rest = &line[pos + "time=".len()..];
            let value = rest.split_whitespace().next().unwrap_or("");
            if let Ok(rtt) = value.parse::<f64>() {
                stat.rtts_ms.push(rtt);
            }
        } else if line.contains("packets transmitted") {
            for part in line.split(',') {
                let part = part.trim();
                let mut fields = part.split_whitespace();
                let number = fields.next().and_then(|n| n.parse::<u64>().ok());
                match (number, fields.next()) {
                    (Some(n), Some("packets")) => stat.sent = n,
                    (Some(n), Some("received")) => stat.received = n,
                    _ => {}
                }
            }
        }
    }
    stat
}
