//! Wiring for one analysis run: fetch, filter, evaluate, report.

use std::sync::Arc;

use anyhow::{Context, bail};
use bookleak_analysis::AnalysisConfig;
use bookleak_core::{Month, PolyglotBook, ResultSummary};
use bookleak_engine::{EngineOptions, EnginePool, PoolConfig, UciEngineFactory};
use bookleak_store::DuckCache;
use bookleak_sync::{ChessComClient, CollectOptions, TimeClassFilter, collect_games, within_days};
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::Cli;
use crate::{display, report};

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let filter = TimeClassFilter::new(cli.include.clone(), cli.exclude.clone())?;

    let book = PolyglotBook::open(&cli.book)
        .with_context(|| format!("opening book {}", cli.book.display()))?;
    info!(entries = book.len(), path = %cli.book.display(), "loaded opening book");

    let cache = DuckCache::open(&cli.cache)
        .with_context(|| format!("opening cache {}", cli.cache.display()))?;
    if cli.no_cache {
        info!("cache reads disabled; results are still written back");
    }

    // ── Games ──

    let now = Utc::now();
    let client = ChessComClient::new(cli.api_url.clone())?;
    let since = (cli.days > 0).then(|| Month::of(now - Duration::days(i64::from(cli.days))));
    let options = CollectOptions {
        no_cache: cli.no_cache,
        since,
        ..CollectOptions::new(now.date_naive())
    };
    let collected = collect_games(&client, &cache, &cli.username, &options)
        .await
        .with_context(|| format!("listing archives of {}", cli.username))?;
    for (month, reason) in &collected.failed {
        warn!(%month, %reason, "month missing from this run");
    }

    let games = filter.apply(within_days(collected.games, cli.days, now));
    info!(games = games.len(), "games selected");
    if games.is_empty() {
        println!("No games found.");
        return Ok(());
    }
    print!("{}", display::results(&ResultSummary::from_games(&games)));

    // ── Engines ──

    let factory = Arc::new(UciEngineFactory::new(EngineOptions {
        path: cli.engine.clone(),
        threads: cli.threads,
        ..EngineOptions::default()
    }));
    let pool = EnginePool::start(
        factory,
        PoolConfig {
            workers: cli.workers,
            ..PoolConfig::default()
        },
    )
    .await
    .with_context(|| format!("starting engine {}", cli.engine.display()))?;

    let config = AnalysisConfig {
        depth: cli.depth,
        min_occurrences: cli.min_times,
        no_cache: cli.no_cache,
        player_moves_only: !cli.include_opponent,
        ..AnalysisConfig::default()
    };

    let outcome = tokio::select! {
        result = bookleak_analysis::run(&games, &book, &pool, &cache, &config) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    pool.shutdown().await;

    let run_report = match outcome {
        Some(result) => result?,
        None => bail!("interrupted"),
    };

    print!("{}", display::openings(&run_report.opening_stats));
    print!("{}", display::mistakes(&run_report.groups, cli.top));
    print!("{}", display::run_summary(&run_report.summary));

    if let Some(path) = &cli.json {
        report::write_json(path, &cli.username, cli.depth, &run_report)?;
        info!(path = %path.display(), "wrote JSON report");
    }
    if let Some(path) = &cli.parquet {
        report::write_parquet(path, &run_report)?;
        info!(path = %path.display(), "wrote Parquet report");
    }
    Ok(())
}
