//! Desktop variant of the frame pacing pipeline.
//!
//! There is no compositor to dump here; the rendering process pushes its
//! own present timestamps into a shared [`DesktopFrameCounter`] and the
//! source drains whatever is new on each tick. Timestamps are trusted to
//! be raw and monotonic, so the engine's strict desktop path applies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::pacing::PacingEngine;
use crate::source::{MetricDesc, MetricSource};
use crate::sources::display::{COLLECT_INTERVAL, FRAME_METRICS};

/// Frames kept while nothing drains; the oldest fall off first.
pub const COUNTER_CAPACITY: usize = 500;

/// Shared buffer of present timestamps, pushed by the renderer and drained
/// by the source.
#[derive(Debug, Default)]
pub struct DesktopFrameCounter {
    inner: Mutex<CounterState>,
}

#[derive(Debug, Default)]
struct CounterState {
    presents: Vec<i64>,
    /// Newest timestamp handed out by the last drain.
    latest: i64,
}

impl DesktopFrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, present: i64) {
        if let Ok(mut state) = self.inner.lock() {
            state.presents.push(present);
            if state.presents.len() > COUNTER_CAPACITY {
                state.presents.remove(0);
            }
        }
    }

    /// Timestamps newer than the previous drain, oldest first.
    pub fn drain_new(&self) -> Vec<i64> {
        let Ok(mut state) = self.inner.lock() else {
            return Vec::new();
        };
        let latest = state.latest;
        let start = state
            .presents
            .iter()
            .position(|&p| p > latest)
            .unwrap_or(state.presents.len());
        let fresh: Vec<i64> = state.presents.split_off(start);
        state.presents.clear();
        if let Some(&newest) = fresh.last() {
            state.latest = newest;
        }
        fresh
    }
}

/// Frame pacing source fed by a [`DesktopFrameCounter`].
pub struct DesktopDisplaySource {
    counter: Arc<DesktopFrameCounter>,
    engine: PacingEngine,
}

impl DesktopDisplaySource {
    pub fn new(counter: Arc<DesktopFrameCounter>) -> Self {
        Self {
            counter,
            engine: PacingEngine::new(),
        }
    }
}

impl MetricSource for DesktopDisplaySource {
    fn name(&self) -> &'static str {
        "display"
    }

    fn open(&mut self) -> bool {
        true
    }

    fn tick(&mut self) {
        let presents = self.counter.drain_new();
        self.engine.ingest_presents(&presents);
    }

    fn tick_interval(&self) -> Duration {
        COLLECT_INTERVAL
    }

    fn describe(&self) -> &'static [MetricDesc] {
        FRAME_METRICS
    }

    fn sample(&mut self) -> HashMap<String, String> {
        self.engine.report().to_fields()
    }
}
