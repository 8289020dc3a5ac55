//! The analysis pipeline.
//!
//! Detection, cache lookups and grouping run sequentially. Only engine work
//! is concurrent, and it is issued as one batch for the whole game set so the
//! pool can keep every worker busy.

use std::collections::{HashMap, HashSet};

use bookleak_core::{
    BookOracle, DeviationGroup, DeviationPoint, DeviationRecord, EvalCache, EvalRequest,
    EvalResult, Game, OpeningStats, ResultSummary, Score, detect, group, opening_stats,
};
use bookleak_engine::{EnginePool, EvalFailure, PoolClosed};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::summary::{FailureKind, GameFailure, RunSummary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    PoolClosed(#[from] PoolClosed),
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Ranked recurring mistakes.
    pub groups: Vec<DeviationGroup>,
    /// Every evaluated deviation, in game order.
    pub records: Vec<DeviationRecord>,
    pub opening_stats: Vec<OpeningStats>,
    pub results: ResultSummary,
    pub summary: RunSummary,
}

struct Pending<'g> {
    game: &'g Game,
    point: DeviationPoint,
    best: EvalRequest,
    played: EvalRequest,
}

/// Analyse `games` and rank their recurring opening mistakes.
///
/// Only a closed pool is fatal. Malformed games, failed evaluations and cache
/// errors are counted in the summary and the run carries on.
pub async fn run(
    games: &[Game],
    book: &dyn BookOracle,
    pool: &EnginePool,
    cache: &dyn EvalCache,
    config: &AnalysisConfig,
) -> Result<RunReport, PipelineError> {
    let mut summary = RunSummary {
        games_total: games.len(),
        ..RunSummary::default()
    };

    // ── Detection ──

    let mut pending = Vec::new();
    let mut booked: Vec<&Game> = Vec::new();
    for game in games {
        if game.plies() < config.min_game_plies {
            summary.too_short += 1;
            continue;
        }
        match detect(game, book) {
            Ok(None) => {
                summary.in_book += 1;
                booked.push(game);
            }
            Ok(Some(point)) => {
                let best = EvalRequest::best(point.position.clone(), config.depth);
                let played = EvalRequest::after(
                    point.position.clone(),
                    point.played_move.clone(),
                    config.depth,
                );
                pending.push(Pending {
                    game,
                    point,
                    best,
                    played,
                });
            }
            Err(e) => {
                warn!(game = %game.id, ply = e.ply, error = %e.source, "skipping malformed game");
                summary.malformed += 1;
                summary.failures.push(GameFailure {
                    game_id: game.id.clone(),
                    kind: FailureKind::Malformed,
                    reason: e.to_string(),
                });
            }
        }
    }
    summary.deviations = pending.len();
    info!(
        games = games.len(),
        deviations = pending.len(),
        in_book = summary.in_book,
        "detection done"
    );

    // ── Cache lookups ──

    let mut scores: HashMap<EvalRequest, Score> = HashMap::new();
    let mut queued: HashSet<&EvalRequest> = HashSet::new();
    let mut misses: Vec<EvalRequest> = Vec::new();
    for p in &pending {
        for request in [&p.best, &p.played] {
            if scores.contains_key(request) || queued.contains(request) {
                continue;
            }
            let cached = if config.no_cache {
                None
            } else {
                match cache.lookup(request) {
                    Ok(hit) => hit,
                    Err(e) => {
                        summary.cache_errors += 1;
                        warn!(position = %request.position, error = %e, "cache read failed, recomputing");
                        None
                    }
                }
            };
            match cached {
                Some(score) => {
                    summary.cache_hits += 1;
                    scores.insert(request.clone(), score);
                }
                None => {
                    summary.cache_misses += 1;
                    queued.insert(request);
                    misses.push(request.clone());
                }
            }
        }
    }
    info!(
        hits = summary.cache_hits,
        misses = summary.cache_misses,
        no_cache = config.no_cache,
        "cache lookups done"
    );

    // ── Evaluation ──

    let mut failed: HashMap<EvalRequest, EvalFailure> = HashMap::new();
    if !misses.is_empty() {
        summary.engine_requests = misses.len();
        info!(requests = misses.len(), workers = pool.size(), "evaluating");
        let results = pool.evaluate_many(&misses).await?;

        for (request, result) in misses.into_iter().zip(results) {
            match result {
                Ok(score) => {
                    if !summary.cache_writes_disabled {
                        if let Err(e) = cache.store(&request, &score) {
                            summary.cache_errors += 1;
                            summary.cache_writes_disabled = true;
                            warn!(error = %e, "cache write failed, keeping results in memory only");
                        }
                    }
                    scores.insert(request, score);
                }
                Err(failure) => {
                    failed.insert(request, failure);
                }
            }
        }
    }

    // ── Records ──

    let mut records = Vec::with_capacity(pending.len());
    for p in pending {
        match (scores.get(&p.best), scores.get(&p.played)) {
            (Some(before), Some(after)) => {
                records.push(DeviationRecord {
                    game_id: p.game.id.clone(),
                    played_at: p.game.played_at,
                    player_color: p.game.color,
                    eco: p.game.eco.clone(),
                    opening: p.game.opening.clone(),
                    point: p.point,
                    eval: EvalResult::new(before.clone(), after.clone()),
                });
            }
            _ => {
                let reason = failed
                    .get(&p.best)
                    .or_else(|| failed.get(&p.played))
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "evaluation missing".to_string());
                warn!(game = %p.game.id, reason = %reason, "deviation not evaluated");
                summary.eval_failed += 1;
                summary.failures.push(GameFailure {
                    game_id: p.game.id.clone(),
                    kind: FailureKind::Evaluation,
                    reason,
                });
            }
        }
    }
    summary.evaluated = records.len();

    // ── Grouping ──

    let ranked: Vec<DeviationRecord> = if config.player_moves_only {
        records.iter().filter(|r| r.by_player()).cloned().collect()
    } else {
        records.clone()
    };
    let groups = group(&ranked, config.min_occurrences);
    debug!(eligible = ranked.len(), groups = groups.len(), "grouped deviations");
    info!(
        evaluated = summary.evaluated,
        failed = summary.eval_failed,
        malformed = summary.malformed,
        groups = groups.len(),
        "analysis complete"
    );

    Ok(RunReport {
        groups,
        opening_stats: opening_stats(&records, &booked),
        records,
        results: ResultSummary::from_games(games),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bookleak_core::{ArchiveId, CacheError, Color, LineBook, Outcome, TimeClass};
    use bookleak_engine::{EngineError, EngineFactory, EngineSession, PoolConfig};
    use bookleak_store::{DuckCache, MemoryCache};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic engine: the best line is worth +50 for the mover; played
    /// moves cost whatever the table says. `h2h4` always crashes the engine.
    struct TableEngine {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EngineSession for TableEngine {
        async fn evaluate(&mut self, request: &EvalRequest) -> Result<Score, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match request.played.as_deref() {
                None => Ok(Score::centipawns(50, request.depth).with_best_move("g1f3")),
                Some("h2h4") => Err(EngineError::Exited),
                Some("d1h5") => Ok(Score::centipawns(-100, request.depth)),
                Some("g2g4") => Ok(Score::centipawns(-250, request.depth)),
                Some(_) => Ok(Score::centipawns(0, request.depth)),
            }
        }

        async fn shutdown(&mut self) {}
    }

    struct TableFactory {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EngineFactory for TableFactory {
        async fn spawn(&self, _worker: usize) -> Result<Box<dyn EngineSession>, EngineError> {
            Ok(Box::new(TableEngine {
                calls: self.calls.clone(),
            }))
        }
    }

    async fn pool(workers: usize) -> (EnginePool, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = Arc::new(TableFactory {
            calls: calls.clone(),
        });
        let pool = EnginePool::start(factory, PoolConfig { workers, max_attempts: 2 })
            .await
            .unwrap();
        (pool, calls)
    }

    fn book() -> LineBook {
        LineBook::from_lines([
            vec!["e2e4", "e7e5", "g1f3", "b8c6"],
            vec!["d2d4", "d7d5", "c2c4"],
        ])
        .unwrap()
    }

    fn game(id: &str, day: u32, color: Color, moves: &[&str]) -> Game {
        Game {
            id: id.into(),
            moves: moves.iter().map(|m| m.to_string()).collect(),
            color,
            time_class: Some(TimeClass::Blitz),
            time_control: "180+2".into(),
            outcome: Outcome::Loss,
            played_at: Utc.with_ymd_and_hms(2025, 4, day, 18, 0, 0).unwrap(),
            source: "test".into(),
            eco: Some("C20".into()),
            opening: Some("King's Pawn Game".into()),
        }
    }

    fn scenario() -> Vec<Game> {
        let queen_out = ["e2e4", "e7e5", "d1h5", "b8c6", "f1c4"];
        vec![
            game("g1", 1, Color::White, &queen_out),
            game("g2", 2, Color::White, &queen_out),
            game("g3", 3, Color::White, &queen_out),
            game("g4", 4, Color::White, &["d2d4", "d7d5", "g2g4", "c8g4"]),
        ]
    }

    fn config(min_occurrences: usize) -> AnalysisConfig {
        AnalysisConfig {
            min_occurrences,
            ..AnalysisConfig::default()
        }
    }

    #[tokio::test]
    async fn repeated_mistake_outranks_filtered_single() {
        let (pool, calls) = pool(2).await;
        let cache = MemoryCache::new();
        let report = run(&scenario(), &book(), &pool, &cache, &config(2)).await.unwrap();

        assert_eq!(report.groups.len(), 1);
        let g = &report.groups[0];
        assert_eq!(g.occurrences, 3);
        assert_eq!(g.eval_loss(), 150);
        assert_eq!(g.played_move, "d1h5");
        assert_eq!(g.best_move.as_deref(), Some("g1f3"));
        assert_eq!(g.game_ids, vec!["g1", "g2", "g3"]);

        // Identical deviations share one engine request pair.
        assert_eq!(report.summary.engine_requests, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.summary.evaluated, 4);
        assert_eq!(cache.len(), 4);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn second_run_is_cached_and_identical() {
        let (pool, calls) = pool(1).await;
        let cache = MemoryCache::new();
        let games = scenario();

        let first = run(&games, &book(), &pool, &cache, &config(1)).await.unwrap();
        let engine_calls = calls.load(Ordering::SeqCst);
        let second = run(&games, &book(), &pool, &cache, &config(1)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), engine_calls);
        assert_eq!(second.summary.engine_requests, 0);
        assert_eq!(second.summary.cache_hits, 4);
        assert_eq!(
            serde_json::to_string(&first.groups).unwrap(),
            serde_json::to_string(&second.groups).unwrap()
        );
        assert_eq!(first.groups[0].played_move, "g2g4");
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn no_cache_still_writes() {
        let (pool, calls) = pool(1).await;
        let cache = MemoryCache::new();
        let games = scenario();
        run(&games, &book(), &pool, &cache, &config(1)).await.unwrap();

        let cfg = AnalysisConfig {
            no_cache: true,
            ..config(1)
        };
        let report = run(&games, &book(), &pool, &cache, &cfg).await.unwrap();
        assert_eq!(report.summary.cache_hits, 0);
        assert_eq!(report.summary.engine_requests, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(cache.len(), 4);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn bad_games_are_reported_not_fatal() {
        let (pool, _) = pool(2).await;
        let cache = MemoryCache::new();
        let mut games = scenario();
        games.push(game("short", 5, Color::White, &["e2e4"]));
        games.push(game("broken", 6, Color::White, &["e2e4", "e7e4", "g1f3", "b8c6"]));
        games.push(game("crash", 7, Color::White, &["e2e4", "e7e5", "h2h4", "b8c6"]));
        games.push(game("booked", 8, Color::White, &["e2e4", "e7e5", "g1f3", "b8c6", "f1b5"]));

        let report = run(&games, &book(), &pool, &cache, &config(1)).await.unwrap();
        let s = &report.summary;
        assert_eq!(s.games_total, 8);
        assert_eq!(s.too_short, 1);
        assert_eq!(s.malformed, 1);
        assert_eq!(s.in_book, 1);
        assert_eq!(s.deviations, 5);
        assert_eq!(s.evaluated, 4);
        assert_eq!(s.eval_failed, 1);
        assert_eq!(s.skipped(), 3);

        let kinds: Vec<(&str, FailureKind)> =
            s.failures.iter().map(|f| (f.game_id.as_str(), f.kind)).collect();
        assert_eq!(
            kinds,
            vec![("broken", FailureKind::Malformed), ("crash", FailureKind::Evaluation)]
        );
        assert_eq!(report.groups.len(), 2);
        // The in-book game still counts as a game of its opening.
        let c20 = &report.opening_stats[0];
        assert_eq!((c20.times_played, c20.in_book), (5, 1));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn opponent_deviations_only_feed_stats() {
        let (pool, _) = pool(1).await;
        let cache = MemoryCache::new();
        // Black is the player; White leaves the book with d1h5.
        let games = vec![game("b1", 1, Color::Black, &["e2e4", "e7e5", "d1h5", "b8c6"])];

        let report = run(&games, &book(), &pool, &cache, &config(1)).await.unwrap();
        assert!(report.groups.is_empty());
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.opening_stats[0].player_deviated, 0);
        // +50 for White at the deviation is -50 for the Black player.
        assert_eq!(report.opening_stats[0].max_eval, Some(-50));

        let all = AnalysisConfig {
            player_moves_only: false,
            ..config(1)
        };
        let report = run(&games, &book(), &pool, &cache, &all).await.unwrap();
        assert_eq!(report.groups.len(), 1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn duckdb_cache_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.duckdb");
        let (pool, calls) = pool(2).await;
        let games = scenario();

        let first = {
            let cache = DuckCache::open(&path).unwrap();
            let report = run(&games, &book(), &pool, &cache, &config(1)).await.unwrap();
            assert!(!report.summary.cache_writes_disabled);
            assert_eq!(report.summary.cache_errors, 0);
            assert_eq!(cache.evaluation_count(), 4);
            report
        };
        let engine_calls = calls.load(Ordering::SeqCst);

        let cache = DuckCache::open(&path).unwrap();
        let second = run(&games, &book(), &pool, &cache, &config(1)).await.unwrap();
        assert_eq!(second.summary.engine_requests, 0);
        assert_eq!(second.summary.cache_hits, 4);
        assert_eq!(calls.load(Ordering::SeqCst), engine_calls);
        assert_eq!(first.groups, second.groups);
        pool.shutdown().await;
    }

    struct BrokenCache;

    impl EvalCache for BrokenCache {
        fn lookup(&self, _: &EvalRequest) -> Result<Option<Score>, CacheError> {
            Err(CacheError::Backend("disk on fire".into()))
        }
        fn store(&self, _: &EvalRequest, _: &Score) -> Result<(), CacheError> {
            Err(CacheError::Backend("disk on fire".into()))
        }
        fn is_month_complete(&self, _: &ArchiveId) -> Result<bool, CacheError> {
            Ok(false)
        }
        fn mark_month_complete(&self, _: &ArchiveId) -> Result<(), CacheError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn cache_failure_degrades_to_recompute() {
        let (pool, _) = pool(2).await;
        let report = run(&scenario(), &book(), &pool, &BrokenCache, &config(2)).await.unwrap();
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].occurrences, 3);
        // Four failed reads, then one failed write disables the rest.
        assert_eq!(report.summary.cache_errors, 5);
        assert!(report.summary.cache_writes_disabled);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn closed_pool_is_fatal() {
        let (pool, _) = pool(1).await;
        pool.close();
        let result = run(&scenario(), &book(), &pool, &MemoryCache::new(), &config(1)).await;
        assert!(matches!(result, Err(PipelineError::PoolClosed(_))));
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn empty_game_set() {
        let (pool, calls) = pool(1).await;
        let report = run(&[], &book(), &pool, &MemoryCache::new(), &config(1)).await.unwrap();
        assert!(report.groups.is_empty());
        assert_eq!(report.summary, RunSummary::default());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        pool.shutdown().await;
    }
}
