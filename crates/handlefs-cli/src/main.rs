mod cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use handlefs_core::config::IgnoreMode;

#[derive(Parser)]
#[command(name = "handlefs", about = "Browse and edit a directory through a granted root handle")]
struct Cli {
    /// Output as JSON instead of human-readable tables
    #[arg(long, global = true)]
    json: bool,

    /// SQLite file that remembers granted roots and in-flight moves
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Project id under which the root grant is saved
    #[arg(long, global = true)]
    project: Option<String>,

    /// How the root's .gitignore is applied (gitignore, parse-only, off)
    #[arg(long, global = true, default_value_t = IgnoreMode::Gitignore)]
    ignore_mode: IgnoreMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Fs(cmd::fs::FsCommands),
    /// Stat table for every file, with optional filters and rankings
    Stats(cmd::stats::StatsArgs),
    /// Print a line whenever the tree changes, until Ctrl-C
    Watch(cmd::watch::WatchArgs),
    /// Finish or roll back moves interrupted by a crash
    Recover(cmd::recover::RecoverArgs),
    /// Saved root grants
    #[command(subcommand)]
    Roots(cmd::roots::RootsCommands),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let ctx = cmd::Context {
        json: cli.json,
        state: cli.state,
        project: cli.project,
        ignore_mode: cli.ignore_mode,
    };

    match cli.command {
        Commands::Fs(sub) => cmd::fs::run(sub, &ctx).await,
        Commands::Stats(args) => cmd::stats::run(args, &ctx).await,
        Commands::Watch(args) => cmd::watch::run(args, &ctx).await,
        Commands::Recover(args) => cmd::recover::run(args, &ctx).await,
        Commands::Roots(sub) => cmd::roots::run(sub, &ctx).await,
    }
}
