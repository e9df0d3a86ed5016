//! The metric-source contract every collector plugin implements.

use std::collections::HashMap;
use std::time::Duration;

/// Static description of one metric column a source produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDesc {
    /// Stable key used in sample maps and log columns.
    pub key: &'static str,
    /// Human-readable label for help output.
    pub label: &'static str,
    /// Whether the live console table shows this column.
    pub console: bool,
}

/// A collector plugin. The scheduler drives each source on its own thread:
/// [`tick`](MetricSource::tick) runs at the source's own cadence to gather
/// raw data, and [`sample`](MetricSource::sample) is read on the shared
/// reporting cadence.
///
/// `sample` returns the latest complete values; keys match
/// [`describe`](MetricSource::describe). A source with nothing valid yet
/// returns an empty map and the reporter prints blanks.
pub trait MetricSource: Send {
    /// Stable source name, used for registry lookup and logging.
    fn name(&self) -> &'static str;

    /// One-time setup. Returning false drops the source for this session
    /// rather than aborting the run.
    fn open(&mut self) -> bool;

    /// Gather one batch of raw data.
    fn tick(&mut self);

    /// Cadence at which [`tick`](MetricSource::tick) should run.
    fn tick_interval(&self) -> Duration;

    /// The metric columns this source produces.
    fn describe(&self) -> &'static [MetricDesc];

    /// Latest complete values, keyed per [`describe`](MetricSource::describe).
    fn sample(&mut self) -> HashMap<String, String>;

    /// Final teardown; default is nothing to release.
    fn close(&mut self) {}
}
