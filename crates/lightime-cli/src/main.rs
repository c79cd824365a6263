use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "lightime", version, about = "Lightime focus timer")]
struct Cli {
    /// Config file (default: ~/.config/lightime/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Checkpoint database (default: ~/.config/lightime/lightime.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a focus session in the foreground
    Run(commands::run::RunArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Crash-recovery checkpoint inspection
    Checkpoint {
        #[command(subcommand)]
        action: commands::checkpoint::CheckpointAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let paths = commands::Paths {
        config: cli.config,
        db: cli.db,
    };

    // Logs go to stderr; stdout carries the command's output.
    let level = if matches!(cli.command, Commands::Run(_)) {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("lightime={level},lightime_core={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args, &paths),
        Commands::Config { action } => commands::config::run(action, &paths),
        Commands::Checkpoint { action } => commands::checkpoint::run(action, &paths),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
