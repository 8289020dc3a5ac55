//! `bookleak`: find the opening mistakes a player keeps repeating.

mod analyze;
mod display;
mod report;

use std::path::PathBuf;

use bookleak_core::TimeClass;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Rank the recurring out-of-book mistakes in a Chess.com player's games.
#[derive(Debug, Parser)]
#[command(name = "bookleak", version, about)]
pub struct Cli {
    /// Chess.com username.
    pub username: String,

    /// Only analyse games from the last N days (0 = all).
    #[arg(default_value_t = 0)]
    pub days: u32,

    /// UCI engine executable.
    #[arg(long, env = "BOOKLEAK_ENGINE", default_value = "stockfish")]
    pub engine: PathBuf,

    /// Polyglot opening book (.bin).
    #[arg(long, env = "BOOKLEAK_BOOK")]
    pub book: PathBuf,

    /// Engine search depth.
    #[arg(long, env = "BOOKLEAK_DEPTH", default_value_t = 18)]
    pub depth: u32,

    /// Parallel engine processes.
    #[arg(long, env = "BOOKLEAK_WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Engine threads per process.
    #[arg(long, env = "BOOKLEAK_THREADS", default_value_t = 1)]
    pub threads: u32,

    /// Only report mistakes made at least N times.
    #[arg(long, env = "BOOKLEAK_MIN_TIMES", default_value_t = 1)]
    pub min_times: usize,

    /// Ignore cached archives and evaluations (results are still written back).
    #[arg(long, env = "BOOKLEAK_NO_CACHE")]
    pub no_cache: bool,

    /// DuckDB cache file.
    #[arg(long, env = "BOOKLEAK_CACHE", default_value = "bookleak.duckdb")]
    pub cache: PathBuf,

    /// Only include these time classes.
    #[arg(long, num_args = 1.., value_name = "CLASS", conflicts_with = "exclude")]
    pub include: Vec<TimeClass>,

    /// Exclude these time classes.
    #[arg(long, num_args = 1.., value_name = "CLASS")]
    pub exclude: Vec<TimeClass>,

    /// Also rank deviations made by the opponent.
    #[arg(long)]
    pub include_opponent: bool,

    /// Write the full report as JSON.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Write the ranked mistakes as Parquet.
    #[arg(long, value_name = "PATH")]
    pub parquet: Option<PathBuf>,

    /// Mistakes shown on the console.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Chess.com API root.
    #[arg(long, env = "BOOKLEAK_API_URL", default_value = bookleak_sync::http::DEFAULT_BASE_URL)]
    pub api_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("bookleak v{}", env!("CARGO_PKG_VERSION"));
    analyze::execute(cli).await
}
