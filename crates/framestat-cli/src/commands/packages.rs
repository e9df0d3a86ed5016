//! List running packages as JSON.

use framestat_core::shell::{running_packages, AndroidShell};

pub fn run() {
    let shell = AndroidShell::new();
    let packages = running_packages(&shell);
    match serde_json::to_string_pretty(&packages) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
