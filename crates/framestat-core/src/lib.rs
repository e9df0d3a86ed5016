//! # framestat-core
//!
//! **Frame pacing telemetry for devices you can only shell into.**
//!
//! `framestat-core` measures how smoothly an app actually renders by reading
//! the compositor's per-layer latency buffer and classifying every frame
//! against a moving baseline — jank, big jank and small jank, the way a
//! player perceives them rather than raw fps alone. Around the pacing
//! engine it carries the rest of a monitoring session: CPU, memory, network
//! and ping sources, a scheduling loop, and a CSV sample log.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use framestat_core::config::AgentConfig;
//! use framestat_core::scheduler::Scheduler;
//! use framestat_core::shell::AndroidShell;
//! use framestat_core::sources::all_sources;
//! use framestat_core::surface::shared_surface;
//!
//! let config = AgentConfig {
//!     package: "com.example.game".to_string(),
//!     ..AgentConfig::default()
//! };
//! let sources = all_sources(Arc::new(AndroidShell::new()), &config, shared_surface());
//! let mut scheduler = Scheduler::new(sources, config.report_interval);
//! scheduler.start_ticking();
//! scheduler.run().unwrap();
//! ```
//!
//! ## Architecture
//!
//! Sources → Scheduler (tick threads + report loop) → Console / SampleLog
//!
//! The pacing path underneath the display source:
//!
//! Surface resolver → latency dump parser → [`pacing::PacingEngine`]
//!
//! Every device query goes through the [`device::SurfaceQuery`] trait, so
//! the whole pipeline runs against canned transcripts in tests and against
//! `sh -c dumpsys` in production. A desktop variant feeds the same engine
//! from an in-process frame counter instead of a compositor dump.

pub mod config;
pub mod desktop;
pub mod device;
pub mod pacing;
pub mod procfs;
pub mod recorder;
pub mod scheduler;
pub mod shell;
pub mod source;
pub mod sources;
pub mod surface;

/// Crate version, stamped into sample log headers.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
