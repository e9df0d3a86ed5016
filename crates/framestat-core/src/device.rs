//! Device query contract and dump parsers.
//!
//! [`SurfaceQuery`] abstracts the handful of compositor and activity-manager
//! questions the pipeline asks; the shell-backed implementation lives in
//! [`crate::shell`], and tests substitute canned transcripts. The parsers
//! here are pure functions over raw dump text.

use log::{debug, warn};

use crate::pacing::PresentSample;

/// Marker line preceding the frame table in a graphics-info dump.
pub const PROFILE_DATA_MARKER: &str = "---PROFILEDATA---";

/// Compositor and activity-manager queries the pipeline depends on.
///
/// Every method is best-effort: `None` means the underlying command failed
/// or produced nothing, and callers degrade rather than abort.
pub trait SurfaceQuery: Send + Sync {
    /// Raw layer listing, one layer name per line.
    fn list_surfaces(&self) -> Option<String>;

    /// Raw latency dump for one layer.
    fn latency_raw(&self, surface: &str) -> Option<String>;

    /// Raw graphics-info frame stats for one package.
    fn framestats_raw(&self, package: &str) -> Option<String>;

    /// Package name of the foreground activity.
    fn foreground_package(&self) -> Option<String>;

    /// Device SDK level; zero when unknown.
    fn sdk_version(&self) -> i64;
}

/// Parsed latency dump: the display's vsync period plus the buffered
/// timestamp triples, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyDump {
    pub vsync_period: i64,
    pub samples: Vec<PresentSample>,
}

/// Parse a raw latency dump. The first line is the vsync period in
/// nanoseconds; each remaining line is a tab-separated triple of
/// desired-present, actual-present and refresh-start timestamps. Lines that
/// are not exactly three parseable fields are dropped.
pub fn parse_latency_dump(raw: &str) -> Option<LatencyDump> {
    let mut lines = raw.lines();
    let vsync_period = lines.next()?.trim().parse::<i64>().ok()?;
    let mut samples = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 {
            continue;
        }
        let parsed: Option<Vec<i64>> =
            fields.iter().map(|f| f.trim().parse::<i64>().ok()).collect();
        if let Some(v) = parsed {
            samples.push(PresentSample::new(v[0], v[1], v[2]));
        }
    }
    Some(LatencyDump {
        vsync_period,
        samples,
    })
}

/// Parse the frame table of a graphics-info dump: space-separated numeric
/// triples after the profile-data marker. Used as a fallback when the
/// compositor refuses the latency dump for a layer.
pub fn parse_framestats(raw: &str) -> Vec<PresentSample> {
    let mut samples = Vec::new();
    let mut in_table = false;
    for line in raw.lines() {
        if line.contains(PROFILE_DATA_MARKER) {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            continue;
        }
        let parsed: Option<Vec<i64>> =
            fields.iter().map(|f| f.trim().parse::<i64>().ok()).collect();
        if let Some(v) = parsed {
            samples.push(PresentSample::new(v[0], v[1], v[2]));
        }
    }
    samples
}

/// Extract the package name from an activity-manager resumed-activity line,
/// e.g. `... ActivityRecord{af32d1 u0 com.example.game/.MainActivity t123}`.
pub fn parse_foreground_package(raw: &str) -> Option<String> {
    let start = raw.find("ActivityRecord{")?;
    let inner = &raw[start + "ActivityRecord{".len()..];
    let inner = inner.split('}').next()?;
    let component = inner.split_whitespace().nth(2)?;
    let package = component.split('/').next()?;
    if package.is_empty() {
        return None;
    }
    Some(package.to_string())
}

/// Fetch the current sample batch for `surface`, preferring the latency dump
/// and falling back to the package's frame stats when the dump is missing or
/// empty.
pub fn fetch_samples(query: &dyn SurfaceQuery, surface: &str, package: &str) -> Vec<PresentSample> {
    if let Some(raw) = query.latency_raw(surface) {
        if let Some(dump) = parse_latency_dump(&raw) {
            if !dump.samples.is_empty() {
                debug!(
                    "latency dump: {} samples, vsync period {}ns",
                    dump.samples.len(),
                    dump.vsync_period,
                );
                return dump.samples;
            }
        }
    }
    if package.is_empty() {
        return Vec::new();
    }
    warn!("latency dump empty for {surface}, falling back to frame stats");
    match query.framestats_raw(package) {
        Some(raw) => parse_framestats(&raw),
        None => Vec::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::ILLEGAL_PRESENT;

    #[test]
    fn latency_dump_parses_period_and_triples() {
        let raw = "16666666\n100\t200\t300\n400\t500\t600\n";
        let dump = parse_latency_dump(raw).unwrap();
        assert_eq!(dump.vsync_period, 16666666);
        assert_eq!(dump.samples.len(), 2);
        assert_eq!(dump.samples[0], PresentSample::new(100, 200, 300));
        assert_eq!(dump.samples[1], PresentSample::new(400, 500, 600));
    }

    #[test]
    fn latency_dump_keeps_sentinel_samples() {
        let raw = format!("16666666\n100\t{ILLEGAL_PRESENT}\t300\n");
        let dump = parse_latency_dump(&raw).unwrap();
        assert!(dump.samples[0].is_illegal());
    }

    #[test]
    fn latency_dump_drops_malformed_lines() {
        let raw = "16666666\n100\t200\n100\t200\t300\t400\nx\ty\tz\n1\t2\t3\n";
        let dump = parse_latency_dump(raw).unwrap();
        assert_eq!(dump.samples, vec![PresentSample::new(1, 2, 3)]);
    }

    #[test]
    fn latency_dump_without_period_is_none() {
        assert_eq!(parse_latency_dump(""), None);
        assert_eq!(parse_latency_dump("not a number\n1\t2\t3\n"), None);
    }

    #[test]
    fn framestats_table_starts_at_marker() {
        let raw = "\
Stats since: 12345ns
Total frames rendered: 200
---PROFILEDATA---
Flags,IntendedVsync,Vsync
1 2 3
4 5 6
not a row
";
        let samples = parse_framestats(raw);
        assert_eq!(
            samples,
            vec![PresentSample::new(1, 2, 3), PresentSample::new(4, 5, 6)]
        );
    }

    #[test]
    fn framestats_without_marker_is_empty() {
        assert!(parse_framestats("1 2 3\n4 5 6\n").is_empty());
    }

    #[test]
    fn foreground_package_from_activity_record() {
        let raw = "    topResumedActivity=ActivityRecord{af32d1 u0 com.example.game/.MainActivity t123}";
        assert_eq!(
            parse_foreground_package(raw).as_deref(),
            Some("com.example.game")
        );
    }

    #[test]
    fn foreground_package_rejects_garbage() {
        assert_eq!(parse_foreground_package(""), None);
        assert_eq!(parse_foreground_package("mResumedActivity=null"), None);
        assert_eq!(parse_foreground_package("ActivityRecord{a u0}"), None);
    }

    #[test]
    fn fetch_prefers_latency_dump() {
        let mut device = mock::MockDevice::new();
        device.latency.insert(
            "layer#0".to_string(),
            vec!["16666666\n1\t2\t3".to_string()],
        );
        device
            .framestats
            .insert("com.example.game".to_string(), "---PROFILEDATA---\n7 8 9\n".to_string());
        let samples = fetch_samples(&device, "layer#0", "com.example.game");
        assert_eq!(samples, vec![PresentSample::new(1, 2, 3)]);
    }

    #[test]
    fn fetch_falls_back_to_framestats() {
        let mut device = mock::MockDevice::new();
        device
            .framestats
            .insert("com.example.game".to_string(), "---PROFILEDATA---\n7 8 9\n".to_string());
        let samples = fetch_samples(&device, "layer#0", "com.example.game");
        assert_eq!(samples, vec![PresentSample::new(7, 8, 9)]);
    }

    #[test]
    fn fetch_empty_dump_falls_back() {
        let mut device = mock::MockDevice::new();
        device
            .latency
            .insert("layer#0".to_string(), vec!["16666666\n".to_string()]);
        device
            .framestats
            .insert("com.example.game".to_string(), "---PROFILEDATA---\n7 8 9\n".to_string());
        let samples = fetch_samples(&device, "layer#0", "com.example.game");
        assert_eq!(samples, vec![PresentSample::new(7, 8, 9)]);
    }

    #[test]
    fn fetch_without_any_source_is_empty() {
        let device = mock::MockDevice::new();
        assert!(fetch_samples(&device, "layer#0", "").is_empty());
        assert!(fetch_samples(&device, "layer#0", "com.example.game").is_empty());
    }
}
