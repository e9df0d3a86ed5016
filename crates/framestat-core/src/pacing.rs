//! Frame pacing engine — jank classification over present-timestamp streams.
//!
//! The engine ingests batches of raw present-timestamp triples for one
//! rendering surface and turns them into classified frames and a per-interval
//! aggregate. The classification is a sliding-window scheme: a frame is jank
//! when it takes more than twice the moving average of the last 3 frames
//! *and* crosses an absolute floor. Two independent 3-frame windows exist —
//! a full jank clears both, a small jank clears only its own — so small
//! pacing irregularities are never double-counted against full janks.
//!
//! The stream is irregular real-world data: presents can repeat, arrive out
//! of order, or carry the illegal-frame sentinel, and the signal drops out
//! entirely across app switches and screen locks. Resynchronization (a full
//! state reset) handles the dropouts; the millisecond-truncation test plus
//! the seen-before filter handle the rest.

use std::collections::HashMap;

use log::debug;

/// Sentinel present value the device reports for a frame that never finished
/// rendering. Such samples are discarded, never classified.
pub const ILLEGAL_PRESENT: i64 = i64::MAX;

/// Number of frames in each moving-average window.
pub const WINDOW_LEN: usize = 3;

/// Gap between the newest present and the previously recorded maximum above
/// which a surface change is treated as a signal loss (screen lock, app
/// switch) and pacing state is resynchronized.
pub const RESYNC_GAP_NS: i64 = NANOS_PER_SEC;

/// Absolute floor for a jank frame.
pub const JANK_FLOOR_NS: i64 = 84 * NANOS_PER_MS;
/// Absolute floor for a big jank frame.
pub const BIG_JANK_FLOOR_NS: i64 = 125 * NANOS_PER_MS;
/// Absolute floor for a small jank frame.
pub const SMALL_JANK_FLOOR_NS: i64 = 41 * NANOS_PER_MS;

pub const NANOS_PER_MS: i64 = 1_000_000;
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// One buffered frame as reported by the device: desired-present, actual
/// present and refresh-start timestamps, all in nanoseconds. Ordering is
/// arrival order from the device dump, not guaranteed monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentSample {
    pub requested: i64,
    pub present: i64,
    pub refresh: i64,
}

impl PresentSample {
    pub fn new(requested: i64, present: i64, refresh: i64) -> Self {
        Self {
            requested,
            present,
            refresh,
        }
    }

    /// Whether this sample carries the illegal-frame sentinel.
    pub fn is_illegal(&self) -> bool {
        self.present == ILLEGAL_PRESENT
    }
}

/// One accepted on-screen frame with its classification flags.
/// Immutable once classified; the windows hold copies for the average.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    /// The accepted present timestamp.
    pub display_ts: i64,
    /// Duration since the previously accepted present.
    pub frame_time: i64,
    pub jank: bool,
    pub big_jank: bool,
    pub small_jank: bool,
}

/// Ordered window of at most [`WINDOW_LEN`] most-recent frames; insertion
/// evicts the oldest.
#[derive(Debug, Default)]
struct JankWindow {
    frames: Vec<FrameRecord>,
}

impl JankWindow {
    fn push(&mut self, rec: FrameRecord) {
        self.frames.push(rec);
        if self.frames.len() > WINDOW_LEN {
            self.frames.remove(0);
        }
    }

    fn clear(&mut self) {
        self.frames.clear();
    }

    fn is_full(&self) -> bool {
        self.frames.len() >= WINDOW_LEN
    }

    fn len(&self) -> usize {
        self.frames.len()
    }

    /// Integer average of the window's frame times.
    fn average_frame_time(&self) -> i64 {
        if self.frames.is_empty() {
            return 0;
        }
        let total: i64 = self.frames.iter().map(|f| f.frame_time).sum();
        total / self.frames.len() as i64
    }
}

/// Counters accumulated over one reporting interval; reset on every report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntervalAggregate {
    pub frames: u64,
    pub jank: u64,
    pub big_jank: u64,
    pub small_jank: u64,
    pub jank_duration_ns: i64,
}

/// Rendered metric values for one reporting interval.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub fps: i64,
    pub jank: u64,
    pub big_jank: u64,
    pub small_jank: u64,
    pub jank_time_ms: i64,
    pub jank_percent: f64,
}

impl FrameReport {
    /// Render the report as the metric key/value mapping the scheduler
    /// consumes.
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("fps".to_string(), self.fps.to_string()),
            ("jank".to_string(), self.jank.to_string()),
            ("bigJank".to_string(), self.big_jank.to_string()),
            ("jankTime".to_string(), self.jank_time_ms.to_string()),
            ("smallJank".to_string(), self.small_jank.to_string()),
            ("jankPercent".to_string(), format!("{:.1}", self.jank_percent)),
        ])
    }
}

/// Stateful frame pacing engine for one surface.
///
/// Single-threaded by contract: all state is touched only by the periodic
/// tick that feeds [`ingest`](Self::ingest) and the report call, which the
/// scheduler never runs concurrently for the same source.
#[derive(Debug, Default)]
pub struct PacingEngine {
    jank_window: JankWindow,
    small_window: JankWindow,
    aggregate: IntervalAggregate,
    /// Present timestamp of the last sample walked, zero after a resync.
    prev_present_ts: i64,
    /// Highest present timestamp ever accepted, zero on cold start.
    prev_max_vsync_ts: i64,
    /// Present timestamp at the previous report boundary.
    last_fps_ts: i64,
}

impl PacingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one tick's worth of raw samples for the current surface.
    ///
    /// `surface_changed` is whether the resolved surface differs from the
    /// previous tick's; combined with a >1s timestamp jump it triggers a
    /// resynchronization. A surface change with continuous timestamps does
    /// not reset anything.
    pub fn ingest(&mut self, samples: &[PresentSample], surface_changed: bool) {
        let fresh = self.refresh(samples, surface_changed);
        for sample in fresh {
            let present = sample.present;
            debug!(
                "frame +{}ms {} {} {}",
                (present - self.prev_present_ts) / NANOS_PER_MS,
                sample.requested,
                sample.present,
                sample.refresh,
            );
            if self.prev_present_ts == 0 {
                self.prev_present_ts = present;
                continue;
            }
            // New swap-buffer frame test at millisecond resolution. Samples
            // that fall behind the previous present are re-reports of an
            // already-displayed frame and emit nothing.
            if present / NANOS_PER_MS >= self.prev_present_ts / NANOS_PER_MS {
                let frame_time = present - self.prev_present_ts;
                self.process_frame(present, frame_time);
            }
            self.prev_present_ts = present;
        }
    }

    /// Desktop variant: raw present timestamps from a frame counter, strict
    /// ordering, no millisecond truncation.
    pub fn ingest_presents(&mut self, presents: &[i64]) {
        for &present in presents {
            if self.prev_present_ts == 0 {
                self.prev_present_ts = present;
                continue;
            }
            if present > self.prev_present_ts {
                let frame_time = present - self.prev_present_ts;
                self.process_frame(present, frame_time);
            }
            self.prev_present_ts = present;
        }
    }

    /// Resynchronization check plus seen-before/sentinel filtering.
    /// Returns the samples that represent genuinely new presents.
    fn refresh(&mut self, samples: &[PresentSample], surface_changed: bool) -> Vec<PresentSample> {
        let gap_detected = surface_changed
            && samples
                .last()
                .is_some_and(|s| s.present - self.prev_max_vsync_ts > RESYNC_GAP_NS);
        if self.prev_max_vsync_ts == 0 || gap_detected {
            debug!(
                "resync: prev_max={} surface_changed={} samples={}",
                self.prev_max_vsync_ts,
                surface_changed,
                samples.len(),
            );
            // Seed the new maximum from the newest legal sample so the next
            // tick only sees presents from here on.
            for sample in samples.iter().rev() {
                if !sample.is_illegal() {
                    self.prev_max_vsync_ts = sample.present;
                    break;
                }
            }
            self.jank_window.clear();
            self.small_window.clear();
            self.prev_present_ts = 0;
            return Vec::new();
        }

        let mut fresh = Vec::new();
        for sample in samples {
            if self.prev_max_vsync_ts >= sample.present {
                // Already seen on an earlier tick; still the last valid
                // present for frame-time continuity.
                self.prev_present_ts = sample.present;
                continue;
            }
            if sample.is_illegal() {
                continue;
            }
            fresh.push(*sample);
        }
        if let Some(last) = fresh.last() {
            self.prev_max_vsync_ts = last.present;
        }
        fresh
    }

    /// Classify a single frame time and fold it into the aggregate.
    ///
    /// Public entry for the desktop feed and for classifier calibration
    /// against recorded frame-time traces.
    pub fn process_frame_time(&mut self, frame_time: i64) {
        self.process_frame(0, frame_time);
    }

    fn process_frame(&mut self, display_ts: i64, frame_time: i64) {
        let mut rec = FrameRecord {
            display_ts,
            frame_time,
            jank: false,
            big_jank: false,
            small_jank: false,
        };
        // No classification until the window holds a full baseline: the
        // first frames after a cold start or resync are never jank.
        if self.jank_window.is_full() {
            let baseline = self.jank_window.average_frame_time();
            rec.jank = frame_time > baseline * 2 && frame_time > JANK_FLOOR_NS;
            rec.big_jank = frame_time > baseline * 2 && frame_time > BIG_JANK_FLOOR_NS;
        }

        self.aggregate.frames += 1;
        if rec.jank {
            self.aggregate.jank += 1;
        }
        if rec.big_jank {
            self.aggregate.big_jank += 1;
        }

        if rec.jank || rec.big_jank {
            self.aggregate.jank_duration_ns += frame_time;
            // A jank landing on a full small-jank window also ended a
            // would-have-been-smooth streak; count it once there too.
            if self.small_window.is_full() {
                rec.small_jank = true;
                self.aggregate.small_jank += 1;
            }
            debug!("jank frame_time={}ms rec={:?}", frame_time / NANOS_PER_MS, rec);
            self.jank_window.clear();
            self.small_window.clear();
        } else {
            self.jank_window.push(rec.clone());
            if self.small_window.is_full() {
                let baseline = self.small_window.average_frame_time();
                if frame_time > baseline * 2 && frame_time > SMALL_JANK_FLOOR_NS {
                    rec.small_jank = true;
                    self.aggregate.small_jank += 1;
                    self.small_window.clear();
                } else {
                    self.small_window.push(rec);
                }
            } else {
                self.small_window.push(rec);
            }
        }
    }

    /// Current interval counters (not yet reported).
    pub fn aggregate(&self) -> &IntervalAggregate {
        &self.aggregate
    }

    /// Present timestamp of the last sample walked; zero after a resync.
    pub fn prev_present_ts(&self) -> i64 {
        self.prev_present_ts
    }

    /// Highest accepted present timestamp; zero on cold start.
    pub fn prev_max_vsync_ts(&self) -> i64 {
        self.prev_max_vsync_ts
    }

    /// Whether both jank windows are empty.
    pub fn windows_empty(&self) -> bool {
        self.jank_window.len() == 0 && self.small_window.len() == 0
    }

    /// Render the interval metrics, then reset the aggregate and record the
    /// report boundary.
    ///
    /// The fps denominator is measured between the last two report
    /// boundaries using actual present timestamps, not wall clock; 0.1 is
    /// added before flooring to absorb timer drift. The very first report
    /// has no previous boundary and reports fps 0.
    pub fn report(&mut self) -> FrameReport {
        let agg = self.aggregate;
        let mut fps = 0i64;
        let mut jank_percent = 0.0f64;
        if self.last_fps_ts != 0 {
            // dt can go negative when a resync lands on an earlier timeline;
            // that interval has no measurable duration either.
            let dt = (self.prev_present_ts - self.last_fps_ts) as f64 / NANOS_PER_SEC as f64;
            if dt > 0.0 {
                fps = (agg.frames as f64 / dt + 0.1).floor() as i64;
                jank_percent = agg.jank_duration_ns as f64 * 100.0 / NANOS_PER_SEC as f64 / dt;
                if jank_percent > 100.0 {
                    jank_percent = 100.0;
                } else if jank_percent.is_nan() {
                    jank_percent = 0.0;
                }
            }
        }
        self.aggregate = IntervalAggregate::default();
        self.last_fps_ts = self.prev_present_ts;
        FrameReport {
            fps,
            jank: agg.jank,
            big_jank: agg.big_jank,
            small_jank: agg.small_jank,
            jank_time_ms: agg.jank_duration_ns / NANOS_PER_MS,
            jank_percent,
        }
    }
}
