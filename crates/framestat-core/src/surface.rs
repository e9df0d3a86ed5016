//! Surface resolution: picking the layer whose latency data represents the
//! frames the user actually sees.
//!
//! A package can own dozens of layers; only one of them carries the real
//! frame timeline. Two strategies exist. The static chain ranks candidates
//! by naming heuristics alone and is always available. The probed strategy
//! reads each candidate's vsync counter twice, 50ms apart, and picks the
//! first one that advanced, falling back to the static chain when nothing
//! moves (static scene, paused game).

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::debug;
use serde::Serialize;

use crate::device::SurfaceQuery;

/// Layer-name prefix of dedicated video/game surfaces.
pub const SURFACE_VIEW_PREFIX: &str = "SurfaceView";

/// Marker distinguishing BLAST buffer queue layers from legacy ones.
pub const BLAST_MARKER: &str = "BLAST";

/// Below this SDK the compositor lists bare `SurfaceView` layers with no
/// owning package in the name.
pub const BARE_SURFACE_VIEW_MIN_SDK: i64 = 24;

/// Delay between the two vsync-counter reads of the probed strategy.
pub const PROBE_DELAY: Duration = Duration::from_millis(50);

/// Apps whose visible layer is a known in-process surface rather than
/// anything the generic heuristics would find. The package must match
/// exactly; the surface matches by line prefix.
const HYBRID_SURFACE_RULES: &[(&str, &str)] = &[
    (
        "com.tencent.mm",
        "com.tencent.mm/com.tencent.mm.plugin.webview.ui.tools.MMWebViewUI#",
    ),
    ("com.android.chrome", "com.android.chrome/ChromeChildSurface#"),
    (
        "com.ss.android.ugc.aweme",
        "com.ss.android.ugc.aweme/com.ss.android.ugc.aweme.splash.SplashActivity",
    ),
];

/// Inputs the resolver ranks candidates against.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// Package owning the surface; empty disables package-scoped steps.
    pub package: String,
    /// Explicit substring the user asked for; highest priority when set.
    pub target_surface: String,
    /// Device SDK level, for the bare-SurfaceView quirk.
    pub sdk_version: i64,
}

/// The currently tracked package/surface pair, shared between the display
/// source and the query listener.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SurfaceIdentity {
    pub pkg_name: String,
    pub surface: String,
}

pub type SharedSurface = Arc<Mutex<SurfaceIdentity>>;

pub fn shared_surface() -> SharedSurface {
    Arc::new(Mutex::new(SurfaceIdentity::default()))
}

/// Rank `listing` (one layer name per line) with the static heuristics.
///
/// Priority order: explicit target substring, hybrid-app table, package
/// SurfaceView layers (BLAST preferred, last match wins), then any layer
/// starting with the package name (last match wins).
pub fn resolve_static(listing: &str, ctx: &ResolveContext) -> Option<String> {
    let lines: Vec<&str> = listing.lines().map(str::trim_end).collect();

    if !ctx.target_surface.is_empty() && !ctx.package.is_empty() {
        for line in &lines {
            if line.contains(&ctx.package) && line.contains(&ctx.target_surface) {
                debug!("surface by target substring: {line}");
                return Some((*line).to_string());
            }
        }
    }

    for (pkg, surface) in HYBRID_SURFACE_RULES {
        if ctx.package == *pkg {
            for line in &lines {
                if line.starts_with(surface) {
                    debug!("surface by hybrid rule: {line}");
                    return Some((*line).to_string());
                }
            }
        }
    }

    let mut blast: Option<&str> = None;
    let mut plain: Option<&str> = None;
    for line in lines.iter().copied() {
        if line.starts_with(SURFACE_VIEW_PREFIX)
            && !ctx.package.is_empty()
            && line.contains(&ctx.package)
        {
            if line.contains(BLAST_MARKER) {
                blast = Some(line);
            } else {
                plain = Some(line);
            }
        } else if ctx.sdk_version < BARE_SURFACE_VIEW_MIN_SDK && line == SURFACE_VIEW_PREFIX {
            plain = Some(line);
        }
    }
    if let Some(line) = blast.or(plain) {
        debug!("surface by SurfaceView scan: {line}");
        return Some(line.to_string());
    }

    if !ctx.package.is_empty() {
        let mut owned: Option<&str> = None;
        for line in lines.iter().copied() {
            if line.starts_with(&ctx.package) {
                owned = Some(line);
            }
        }
        if let Some(line) = owned {
            debug!("surface by package prefix: {line}");
            return Some(line.to_string());
        }
    }

    None
}

/// Rank candidates by whether their vsync counter advances across a short
/// pause; fall back to [`resolve_static`] on the same listing when none do.
pub fn resolve_probed(query: &dyn SurfaceQuery, ctx: &ResolveContext) -> Option<String> {
    let listing = query.list_surfaces()?;

    // Newest layers first: the compositor appends, and a freshly created
    // layer is the most likely to be the visible one.
    let mut candidates: Vec<String> = Vec::new();
    if !ctx.package.is_empty() {
        for line in listing.lines() {
            let line = line.trim_end();
            if line.contains(&ctx.package) {
                candidates.insert(0, line.to_string());
            }
        }
    }

    let mut first_reads: Vec<(usize, i64)> = Vec::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        if let Some(raw) = query.latency_raw(candidate) {
            if let Some(counter) = last_vsync_counter(&raw) {
                first_reads.push((idx, counter));
            }
        }
    }
    if !first_reads.is_empty() {
        thread::sleep(PROBE_DELAY);
        for (idx, first) in first_reads {
            let candidate = &candidates[idx];
            if let Some(raw) = query.latency_raw(candidate) {
                if let Some(now) = last_vsync_counter(&raw) {
                    if now > first {
                        debug!("surface by vsync probe: {candidate}");
                        return Some(candidate.clone());
                    }
                }
            }
        }
    }

    resolve_static(&listing, ctx)
}

/// Extract the vsync counter (first field of the last non-empty data line)
/// from a raw latency dump. Zero and unparseable counters resolve to None;
/// a zero counter means the layer never presented.
pub fn last_vsync_counter(raw: &str) -> Option<i64> {
    let line = raw.lines().rev().find(|l| !l.trim().is_empty())?;
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 3 {
        return None;
    }
    match fields[0].trim().parse::<i64>() {
        Ok(0) | Err(_) => None,
        Ok(counter) => Some(counter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockDevice;

    fn ctx(package: &str) -> ResolveContext {
        ResolveContext {
            package: package.to_string(),
            target_surface: String::new(),
            sdk_version: 30,
        }
    }

    const GAME_LISTING: &str = "\
com.example.game/com.example.game.MainActivity#0
SurfaceView[com.example.game/com.example.game.MainActivity]#0
SurfaceView[com.example.game/com.example.game.MainActivity](BLAST)#0
StatusBar#0
NavigationBar0#0";

    // -----------------------------------------------------------------------
    // Static chain
    // -----------------------------------------------------------------------

    #[test]
    fn target_substring_wins_over_everything() {
        let mut c = ctx("com.example.game");
        c.target_surface = "MainActivity#0".to_string();
        let got = resolve_static(GAME_LISTING, &c);
        assert_eq!(
            got.as_deref(),
            Some("com.example.game/com.example.game.MainActivity#0")
        );
    }

    #[test]
    fn target_requires_package_match_on_same_line() {
        let mut c = ctx("com.example.game");
        c.target_surface = "StatusBar".to_string();
        // No line contains both the package and the target; the chain falls
        // through to the SurfaceView scan.
        let got = resolve_static(GAME_LISTING, &c);
        assert!(got.as_deref().is_some_and(|s| s.contains("BLAST")));
    }

    #[test]
    fn hybrid_rule_matches_surface_by_line_prefix() {
        let listing = "\
com.android.chrome/org.chromium.chrome.browser.ChromeTabbedActivity#0
com.android.chrome/ChromeChildSurface#7";
        let got = resolve_static(listing, &ctx("com.android.chrome"));
        assert_eq!(got.as_deref(), Some("com.android.chrome/ChromeChildSurface#7"));
    }

    #[test]
    fn hybrid_rule_requires_exact_package() {
        let listing = "com.tencent.mm/com.tencent.mm.plugin.webview.ui.tools.MMWebViewUI#0";
        // A package that merely extends a hybrid package name gets the
        // generic chain, which finds nothing here.
        assert_eq!(resolve_static(listing, &ctx("com.tencent.mm.kids")), None);
        assert_eq!(
            resolve_static(listing, &ctx("com.tencent.mm")).as_deref(),
            Some("com.tencent.mm/com.tencent.mm.plugin.webview.ui.tools.MMWebViewUI#0")
        );
    }

    #[test]
    fn blast_surface_view_preferred() {
        let got = resolve_static(GAME_LISTING, &ctx("com.example.game"));
        assert_eq!(
            got.as_deref(),
            Some("SurfaceView[com.example.game/com.example.game.MainActivity](BLAST)#0")
        );
    }

    #[test]
    fn plain_surface_view_when_no_blast() {
        let listing = "\
com.example.game/com.example.game.MainActivity#0
SurfaceView[com.example.game/com.example.game.MainActivity]#0";
        let got = resolve_static(listing, &ctx("com.example.game"));
        assert_eq!(
            got.as_deref(),
            Some("SurfaceView[com.example.game/com.example.game.MainActivity]#0")
        );
    }

    #[test]
    fn last_surface_view_wins() {
        let listing = "\
SurfaceView[com.example.game/A]#0
SurfaceView[com.example.game/B]#0";
        let got = resolve_static(listing, &ctx("com.example.game"));
        assert_eq!(got.as_deref(), Some("SurfaceView[com.example.game/B]#0"));
    }

    #[test]
    fn bare_surface_view_only_below_sdk_24() {
        let listing = "\
com.example.game/com.example.game.MainActivity#0
SurfaceView";
        let mut c = ctx("com.example.game");
        c.sdk_version = 23;
        assert_eq!(resolve_static(listing, &c).as_deref(), Some("SurfaceView"));
        c.sdk_version = 24;
        // Bare layer ignored; package-prefix step takes over.
        assert_eq!(
            resolve_static(listing, &c).as_deref(),
            Some("com.example.game/com.example.game.MainActivity#0")
        );
    }

    #[test]
    fn package_prefix_fallback_takes_last() {
        let listing = "\
com.example.app/SplashActivity#0
StatusBar#0
com.example.app/MainActivity#0";
        let got = resolve_static(listing, &ctx("com.example.app"));
        assert_eq!(got.as_deref(), Some("com.example.app/MainActivity#0"));
    }

    #[test]
    fn empty_package_resolves_nothing() {
        assert_eq!(resolve_static(GAME_LISTING, &ctx("")), None);
    }

    #[test]
    fn unrelated_listing_resolves_nothing() {
        assert_eq!(resolve_static("StatusBar#0\nNavigationBar0#0", &ctx("com.example.game")), None);
    }

    // -----------------------------------------------------------------------
    // Vsync counter extraction
    // -----------------------------------------------------------------------

    #[test]
    fn vsync_counter_from_last_data_line() {
        let raw = "16666666\n1\t100\t200\n2\t300\t400\n\n";
        assert_eq!(last_vsync_counter(raw), Some(2));
    }

    #[test]
    fn vsync_counter_zero_is_none() {
        assert_eq!(last_vsync_counter("16666666\n0\t0\t0\n"), None);
    }

    #[test]
    fn vsync_counter_malformed_is_none() {
        assert_eq!(last_vsync_counter(""), None);
        assert_eq!(last_vsync_counter("16666666"), None);
        assert_eq!(last_vsync_counter("16666666\n1\t2\n"), None);
        assert_eq!(last_vsync_counter("16666666\nx\t2\t3\n"), None);
    }

    // -----------------------------------------------------------------------
    // Probed chain
    // -----------------------------------------------------------------------

    #[test]
    fn probe_picks_advancing_candidate() {
        let mut device = MockDevice::new();
        device.listing = "com.example.game/Still#0\ncom.example.game/Moving#0".to_string();
        device.latency.insert(
            "com.example.game/Still#0".to_string(),
            vec!["16666666\n5\t1\t2".to_string()],
        );
        device.latency.insert(
            "com.example.game/Moving#0".to_string(),
            vec!["16666666\n5\t1\t2".to_string(), "16666666\n8\t1\t2".to_string()],
        );
        let got = resolve_probed(&device, &ctx("com.example.game"));
        assert_eq!(got.as_deref(), Some("com.example.game/Moving#0"));
    }

    #[test]
    fn probe_prefers_newest_listed_candidate() {
        let mut device = MockDevice::new();
        device.listing = "com.example.game/Old#0\ncom.example.game/New#0".to_string();
        for name in ["com.example.game/Old#0", "com.example.game/New#0"] {
            device.latency.insert(
                name.to_string(),
                vec!["16666666\n5\t1\t2".to_string(), "16666666\n8\t1\t2".to_string()],
            );
        }
        // Both advance; the later-listed layer is probed first.
        let got = resolve_probed(&device, &ctx("com.example.game"));
        assert_eq!(got.as_deref(), Some("com.example.game/New#0"));
    }

    #[test]
    fn probe_falls_back_to_static_when_nothing_moves() {
        let mut device = MockDevice::new();
        device.listing = GAME_LISTING.to_string();
        for line in GAME_LISTING.lines() {
            device
                .latency
                .insert(line.to_string(), vec!["16666666\n5\t1\t2".to_string()]);
        }
        let got = resolve_probed(&device, &ctx("com.example.game"));
        assert_eq!(
            got.as_deref(),
            Some("SurfaceView[com.example.game/com.example.game.MainActivity](BLAST)#0")
        );
    }

    #[test]
    fn probe_skips_never_presented_layers() {
        let mut device = MockDevice::new();
        device.listing = "com.example.game/Dead#0\ncom.example.game/Live#0".to_string();
        device.latency.insert(
            "com.example.game/Dead#0".to_string(),
            vec!["16666666\n0\t0\t0".to_string()],
        );
        device.latency.insert(
            "com.example.game/Live#0".to_string(),
            vec!["16666666\n5\t1\t2".to_string(), "16666666\n6\t1\t2".to_string()],
        );
        let got = resolve_probed(&device, &ctx("com.example.game"));
        assert_eq!(got.as_deref(), Some("com.example.game/Live#0"));
    }

    #[test]
    fn probe_without_listing_resolves_nothing() {
        let device = MockDevice::new();
        assert_eq!(resolve_probed(&device, &ctx("com.example.game")), None);
    }
}
