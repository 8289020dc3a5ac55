//! DuckDB-backed cache that survives process restarts.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use bookleak_core::{
    ArchiveId, ArchiveStore, CacheError, EvalCache, EvalRequest, Game, PositionKey, Score,
};
use dashmap::DashMap;
use duckdb::{Connection, params};
use tracing::{debug, info, warn};

use crate::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS evaluations (
    position     VARCHAR NOT NULL,
    played       VARCHAR NOT NULL,
    depth        INTEGER NOT NULL,
    score_cp     INTEGER NOT NULL,
    mate         INTEGER,
    best_move    VARCHAR,
    evaluated_at TIMESTAMP NOT NULL DEFAULT current_timestamp,
    PRIMARY KEY (position, played, depth)
);
CREATE TABLE IF NOT EXISTS archive_months (
    player     VARCHAR NOT NULL,
    month      VARCHAR NOT NULL,
    games_json VARCHAR,
    complete   BOOLEAN NOT NULL DEFAULT false,
    fetched_at TIMESTAMP NOT NULL DEFAULT current_timestamp,
    PRIMARY KEY (player, month)
);
";

/// `played` is part of the primary key, so "no move" is stored as ''.
const NO_MOVE: &str = "";

/// Evaluation and archive cache stored in a DuckDB file.
///
/// Two tables:
///
/// - `evaluations`: `(position, played, depth) -> score`, depth-exact.
/// - `archive_months`: `(player, month) -> games, complete flag`.
///
/// Evaluations are preloaded into a sharded map on open so that lookups never
/// take the connection lock; writes go through DuckDB first and then update
/// the map. All writes are upserts.
pub struct DuckCache {
    conn: Mutex<Connection>,
    evals: DashMap<EvalRequest, Score>,
}

impl DuckCache {
    /// Open or create a cache file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let cache = Self::init(conn)?;
        info!(path = %path.display(), evaluations = cache.evals.len(), "opened cache");
        Ok(cache)
    }

    /// Ephemeral cache, gone when dropped.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        let evals = DashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT position, played, depth, score_cp, mate, best_move FROM evaluations",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let position: String = row.get(0)?;
                let played: String = row.get(1)?;
                let depth: i64 = row.get(2)?;
                let cp: i64 = row.get(3)?;
                let mate: Option<i64> = row.get(4)?;
                let best_move: Option<String> = row.get(5)?;

                let Ok(position) = position.parse::<PositionKey>() else {
                    warn!(position, "skipping cached evaluation with invalid position");
                    continue;
                };
                let depth = u32::try_from(depth).unwrap_or_default();
                let request = EvalRequest {
                    position,
                    played: (played != NO_MOVE).then_some(played),
                    depth,
                };
                let score = Score {
                    cp: clamp_i32(cp),
                    mate: mate.map(clamp_i32),
                    best_move,
                    depth,
                };
                evals.insert(request, score);
            }
        }
        Ok(Self {
            conn: Mutex::new(conn),
            evals,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    // ── Counts ──

    /// Number of cached evaluations.
    pub fn evaluation_count(&self) -> usize {
        self.evals.len()
    }

    /// Number of months with a stored archive row.
    pub fn archive_count(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT count(*) FROM archive_months", [], |row| {
            row.get(0)
        })?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    // ── Evaluations ──

    fn put_eval(&self, request: &EvalRequest, score: &Score) -> Result<(), StoreError> {
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO evaluations (position, played, depth, score_cp, mate, best_move)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT (position, played, depth) DO UPDATE SET
                    score_cp = excluded.score_cp,
                    mate = excluded.mate,
                    best_move = excluded.best_move,
                    evaluated_at = now()",
                params![
                    request.position.as_str(),
                    request.played.as_deref().unwrap_or(NO_MOVE),
                    i64::from(request.depth),
                    i64::from(score.cp),
                    score.mate.map(i64::from),
                    score.best_move.as_deref(),
                ],
            )?;
        }
        self.evals.insert(request.clone(), score.clone());
        debug!(position = %request.position, played = ?request.played, "cached evaluation");
        Ok(())
    }

    // ── Archive months ──

    fn month_flag(&self, archive: &ArchiveId) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT complete FROM archive_months WHERE player = ? AND month = ?")?;
        let mut rows = stmt.query(params![archive.player(), archive.month().to_string()])?;
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(false),
        }
    }

    fn set_month_complete(&self, archive: &ArchiveId) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO archive_months (player, month, complete) VALUES (?, ?, true)
             ON CONFLICT (player, month) DO UPDATE SET complete = true",
            params![archive.player(), archive.month().to_string()],
        )?;
        info!(archive = %archive, "month marked complete");
        Ok(())
    }

    fn get_archive(&self, archive: &ArchiveId) -> Result<Option<Vec<Game>>, StoreError> {
        let json: Option<String> = {
            let conn = self.conn()?;
            let mut stmt = conn
                .prepare("SELECT games_json FROM archive_months WHERE player = ? AND month = ?")?;
            let mut rows = stmt.query(params![archive.player(), archive.month().to_string()])?;
            match rows.next()? {
                Some(row) => row.get(0)?,
                None => None,
            }
        };
        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    fn put_archive(&self, archive: &ArchiveId, games: &[Game]) -> Result<(), StoreError> {
        let json = serde_json::to_string(games)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO archive_months (player, month, games_json) VALUES (?, ?, ?)
             ON CONFLICT (player, month) DO UPDATE SET
                games_json = excluded.games_json,
                fetched_at = now()",
            params![archive.player(), archive.month().to_string(), json],
        )?;
        debug!(archive = %archive, games = games.len(), "stored archive");
        Ok(())
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl EvalCache for DuckCache {
    fn lookup(&self, request: &EvalRequest) -> Result<Option<Score>, CacheError> {
        Ok(self.evals.get(request).map(|s| s.value().clone()))
    }

    fn store(&self, request: &EvalRequest, score: &Score) -> Result<(), CacheError> {
        Ok(self.put_eval(request, score)?)
    }

    fn is_month_complete(&self, archive: &ArchiveId) -> Result<bool, CacheError> {
        Ok(self.month_flag(archive)?)
    }

    fn mark_month_complete(&self, archive: &ArchiveId) -> Result<(), CacheError> {
        Ok(self.set_month_complete(archive)?)
    }
}

impl ArchiveStore for DuckCache {
    fn load_archive(&self, archive: &ArchiveId) -> Result<Option<Vec<Game>>, CacheError> {
        Ok(self.get_archive(archive)?)
    }

    fn save_archive(&self, archive: &ArchiveId, games: &[Game]) -> Result<(), CacheError> {
        Ok(self.put_archive(archive, games)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookleak_core::{Color, Month, Outcome, Position};
    use chrono::{TimeZone, Utc};

    fn sample_game(id: &str) -> Game {
        Game {
            id: id.into(),
            moves: vec!["e2e4".into(), "e7e5".into()],
            color: Color::Black,
            time_class: None,
            time_control: "600".into(),
            outcome: Outcome::Loss,
            played_at: Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap(),
            source: "chess.com".into(),
            eco: Some("C20".into()),
            opening: Some("King's Pawn Opening".into()),
        }
    }

    #[test]
    fn open_in_memory_is_empty() {
        let cache = DuckCache::open_in_memory().unwrap();
        assert_eq!(cache.evaluation_count(), 0);
        assert_eq!(cache.archive_count().unwrap(), 0);
    }

    #[test]
    fn store_and_lookup() {
        let cache = DuckCache::open_in_memory().unwrap();
        let best = EvalRequest::best(Position::start().key(), 18);
        let played = EvalRequest::after(Position::start().key(), "g2g4", 18);
        let s1 = Score::centipawns(25, 18).with_best_move("e2e4");
        let s2 = Score::mate_in(-7, 18);

        cache.store(&best, &s1).unwrap();
        cache.store(&played, &s2).unwrap();
        assert_eq!(cache.lookup(&best).unwrap(), Some(s1));
        assert_eq!(cache.lookup(&played).unwrap(), Some(s2));
        assert_eq!(cache.evaluation_count(), 2);
    }

    #[test]
    fn upsert_is_last_write_wins() {
        let cache = DuckCache::open_in_memory().unwrap();
        let req = EvalRequest::best(Position::start().key(), 10);
        cache.store(&req, &Score::centipawns(10, 10)).unwrap();
        cache.store(&req, &Score::centipawns(12, 10)).unwrap();
        assert_eq!(cache.lookup(&req).unwrap().unwrap().cp, 12);
        assert_eq!(cache.evaluation_count(), 1);
    }

    #[test]
    fn survives_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cache.duckdb");
        let req = EvalRequest::after(Position::start().key(), "b1c3", 16);
        let score = Score::centipawns(-5, 16).with_best_move("d7d5");
        let archive = ArchiveId::new("Alice", Month::new(2025, 2).unwrap());

        {
            let cache = DuckCache::open(&path).unwrap();
            cache.store(&req, &score).unwrap();
            cache.save_archive(&archive, &[sample_game("g1")]).unwrap();
            cache.mark_month_complete(&archive).unwrap();
        }

        let cache = DuckCache::open(&path).unwrap();
        assert_eq!(cache.lookup(&req).unwrap(), Some(score));
        assert!(cache.is_month_complete(&archive).unwrap());
        let games = cache.load_archive(&archive).unwrap().unwrap();
        assert_eq!(games, vec![sample_game("g1")]);
    }

    #[test]
    fn month_flag_independent_of_archive() {
        let cache = DuckCache::open_in_memory().unwrap();
        let archive = ArchiveId::new("bob", Month::new(2024, 11).unwrap());
        assert!(!cache.is_month_complete(&archive).unwrap());
        assert_eq!(cache.load_archive(&archive).unwrap(), None);

        cache.save_archive(&archive, &[]).unwrap();
        assert!(!cache.is_month_complete(&archive).unwrap());
        assert_eq!(cache.load_archive(&archive).unwrap(), Some(vec![]));

        cache.mark_month_complete(&archive).unwrap();
        assert!(cache.is_month_complete(&archive).unwrap());
        // Saving again keeps the flag.
        cache.save_archive(&archive, &[sample_game("g2")]).unwrap();
        assert!(cache.is_month_complete(&archive).unwrap());
        // Player names are matched case-insensitively.
        let upper = ArchiveId::new("BOB", archive.month());
        assert!(cache.is_month_complete(&upper).unwrap());
        assert_eq!(cache.archive_count().unwrap(), 1);
    }
}
