//! List the compositor's layers and show which one would be tracked.

use framestat_core::device::SurfaceQuery;
use framestat_core::shell::AndroidShell;
use framestat_core::surface::{resolve_probed, ResolveContext};

pub fn run(package: Option<&str>) {
    let shell = AndroidShell::new();
    let Some(listing) = shell.list_surfaces() else {
        eprintln!("Error: cannot list surfaces (is this an Android shell?)");
        std::process::exit(1);
    };

    let package = match package {
        Some(p) => p.to_string(),
        None => shell.foreground_package().unwrap_or_default(),
    };

    for line in listing.lines().filter(|l| !l.trim().is_empty()) {
        println!("{line}");
    }
    println!();

    if package.is_empty() {
        println!("No package to resolve for (none in foreground, none given)");
        return;
    }
    let ctx = ResolveContext {
        package: package.clone(),
        target_surface: String::new(),
        sdk_version: shell.sdk_version(),
    };
    match resolve_probed(&shell, &ctx) {
        Some(surface) => println!("Tracking for {package}: {surface}"),
        None => println!("No trackable surface for {package}"),
    }
}
