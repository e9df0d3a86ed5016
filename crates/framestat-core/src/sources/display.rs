//! Frame pacing source: resolves the visible surface, drains its latency
//! buffer on a fast cadence and reports classified jank metrics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::config::AgentConfig;
use crate::device::{fetch_samples, SurfaceQuery};
use crate::pacing::PacingEngine;
use crate::source::{MetricDesc, MetricSource};
use crate::surface::{resolve_probed, resolve_static, ResolveContext, SharedSurface};

/// The latency buffer holds 127 frames; at 240Hz that is just over half a
/// second, so the drain cadence must stay well under it.
pub const COLLECT_INTERVAL: Duration = Duration::from_millis(200);

/// Columns of the frame pacing source, shared with the desktop variant.
pub static FRAME_METRICS: &[MetricDesc] = &[
    MetricDesc { key: "fps", label: "frames per second", console: true },
    MetricDesc { key: "jank", label: "jank frames", console: true },
    MetricDesc { key: "bigJank", label: "big jank frames", console: true },
    MetricDesc { key: "jankTime", label: "jank time (ms)", console: true },
    MetricDesc { key: "smallJank", label: "small jank frames", console: true },
    MetricDesc { key: "jankPercent", label: "jank time share (%)", console: false },
];

pub struct DisplaySource {
    query: Arc<dyn SurfaceQuery>,
    config: AgentConfig,
    shared: SharedSurface,
    engine: PacingEngine,
    package: String,
    surface: String,
}

impl DisplaySource {
    pub fn new(query: Arc<dyn SurfaceQuery>, config: AgentConfig, shared: SharedSurface) -> Self {
        Self {
            query,
            config,
            shared,
            engine: PacingEngine::new(),
            package: String::new(),
            surface: String::new(),
        }
    }

    /// Package to monitor this tick: the configured one, or whatever is in
    /// the foreground.
    fn current_package(&self) -> String {
        if !self.config.package.is_empty() {
            return self.config.package.clone();
        }
        self.query.foreground_package().unwrap_or_default()
    }

    /// Re-resolve the tracked surface unless it is locked to an earlier
    /// resolution. Returns whether the surface changed.
    ///
    /// The probed path sleeps and doubles the dump traffic, so it runs only
    /// when `probe` is set (package change, session start); ordinary ticks
    /// re-rank a fresh listing with the static chain.
    fn refresh_surface(&mut self, package: &str, probe: bool) -> bool {
        if self.config.lock_surface && !self.surface.is_empty() {
            return false;
        }
        let ctx = ResolveContext {
            package: package.to_string(),
            target_surface: self.config.target_surface.clone(),
            sdk_version: self.query.sdk_version(),
        };
        let resolved = if probe {
            resolve_probed(self.query.as_ref(), &ctx)
        } else {
            self.query
                .list_surfaces()
                .and_then(|listing| resolve_static(&listing, &ctx))
        }
        .unwrap_or_default();
        let changed = resolved != self.surface;
        if changed {
            info!("surface: {:?} -> {:?}", self.surface, resolved);
            self.surface = resolved;
            if let Ok(mut shared) = self.shared.lock() {
                shared.pkg_name = package.to_string();
                shared.surface = self.surface.clone();
            }
        }
        changed
    }
}

impl MetricSource for DisplaySource {
    fn name(&self) -> &'static str {
        "display"
    }

    fn open(&mut self) -> bool {
        let package = self.current_package();
        self.refresh_surface(&package, true);
        self.package = package;
        true
    }

    fn tick(&mut self) {
        let package = self.current_package();
        let mut changed = package != self.package;
        if changed {
            debug!("package: {:?} -> {:?}", self.package, package);
            self.package = package.clone();
        }
        changed |= self.refresh_surface(&package, changed);
        if self.surface.is_empty() {
            return;
        }
        let samples = fetch_samples(self.query.as_ref(), &self.surface, &package);
        self.engine.ingest(&samples, changed);
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
