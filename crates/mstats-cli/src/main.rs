mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, delivery::DeliverySubcommand, run::RunSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mstats",
    about = "Maintenance statistics scheduler: decide when intermediate and final statistics need updating",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .mstats/)
    #[arg(long, global = true, env = "MSTATS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .mstats/config.yaml and the statistics database
    Init {
        /// Operation interval in minutes (must divide 60)
        #[arg(long)]
        interval: Option<u32>,
    },

    /// Decide which statistics updates are due
    Evaluate {
        /// Evaluate as of this RFC 3339 timestamp (default: current time)
        #[arg(long)]
        now: Option<String>,

        /// Record the boundaries reached for every update that is due
        #[arg(long)]
        commit: bool,
    },

    /// Manage raw delivery-log entries
    Delivery {
        #[command(subcommand)]
        subcommand: DeliverySubcommand,
    },

    /// Inspect and record statistics runs
    Run {
        #[command(subcommand)]
        subcommand: RunSubcommand,
    },

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { interval } => cmd::init::run(&root, interval, cli.json),
        Commands::Evaluate { now, commit } => {
            cmd::evaluate::run(&root, now.as_deref(), commit, cli.json)
        }
        Commands::Delivery { subcommand } => cmd::delivery::run(&root, subcommand, cli.json),
        Commands::Run { subcommand } => cmd::run::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
