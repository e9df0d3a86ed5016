//! CLI for framestat — on-device frame pacing and jank telemetry.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "framestat")]
#[command(about = "framestat — on-device frame pacing and jank telemetry")]
#[command(version = framestat_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a monitoring session: fps/jank, CPU, memory, network, ping
    Run {
        /// Package to monitor; omit to follow the foreground activity
        #[arg(long)]
        package: Option<String>,

        /// Surface name substring to track instead of auto-resolving one
        #[arg(long)]
        surface: Option<String>,

        /// Keep the first resolved surface for the whole session
        #[arg(long)]
        lock_surface: bool,

        /// Host the ping probe targets
        #[arg(long, default_value = framestat_core::config::DEFAULT_PING_HOST)]
        ping_host: String,

        /// Seconds between report rows
        #[arg(long, default_value = "1")]
        interval: u64,

        /// Write a sample log to this path
        #[arg(long)]
        output: Option<String>,

        /// Do not start the loopback query listener
        #[arg(long)]
        no_listen: bool,
    },

    /// List the compositor's layers, with the one that would be tracked
    Surfaces {
        /// Package to resolve for; omit to use the foreground activity
        #[arg(long)]
        package: Option<String>,
    },

    /// List running packages as JSON, foreground one flagged
    Packages,

    /// Query a running session's listener and print the reply
    Ask {
        /// Command to send
        #[arg(default_value = framestat_server::CMD_CURRENT_SURFACE)]
        command: String,

        /// Listener address
        #[arg(long, default_value = framestat_server::LISTEN_ADDR)]
        addr: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            package,
            surface,
            lock_surface,
            ping_host,
            interval,
            output,
            no_listen,
        } => commands::run::run(commands::run::RunCommandConfig {
            package,
            surface,
            lock_surface,
            ping_host,
            interval_secs: interval,
            output,
            listen: !no_listen,
        }),
        Commands::Surfaces { package } => commands::surfaces::run(package.as_deref()),
        Commands::Packages => commands::packages::run(),
        Commands::Ask { command, addr } => commands::ask::run(&addr, &command),
    }
}
