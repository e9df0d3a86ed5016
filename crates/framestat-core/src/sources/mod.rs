//! Collector plugins and their registry.

pub mod display;
pub mod network;
pub mod ping;
pub mod system;

use std::sync::Arc;

use crate::config::AgentConfig;
use crate::device::SurfaceQuery;
use crate::source::MetricSource;
use crate::surface::SharedSurface;

pub use display::DisplaySource;
pub use network::NetworkSource;
pub use ping::PingSource;
pub use system::SystemSource;

/// Every source of the device pipeline, in the column order reports use.
pub fn all_sources(
    query: Arc<dyn SurfaceQuery>,
    config: &AgentConfig,
    shared: SharedSurface,
) -> Vec<Box<dyn MetricSource>> {
    vec![
        Box::new(DisplaySource::new(query, config.clone(), shared)),
        Box::new(SystemSource::new(config.package.clone())),
        Box::new(NetworkSource::new(config.package.clone())),
        Box::new(PingSource::new(config.ping_host.clone())),
    ]
}
