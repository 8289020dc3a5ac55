//! Cache contracts.
//!
//! The pipeline and the archive collector only see these traits; the
//! DuckDB-backed and in-memory implementations live in `bookleak-store`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eval::{EvalRequest, Score};
use crate::game::Game;
use crate::month::Month;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache codec error: {0}")]
    Codec(String),
}

/// One player's archive for one month.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchiveId {
    player: String,
    month: Month,
}

impl ArchiveId {
    /// Usernames are case-insensitive; the player is stored lower-cased.
    pub fn new(player: &str, month: Month) -> Self {
        Self {
            player: player.trim().to_lowercase(),
            month,
        }
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    pub fn month(&self) -> Month {
        self.month
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.player, self.month)
    }
}

/// Durable evaluation cache plus month-completion flags.
///
/// Keys are depth-exact: a score stored at depth 18 never answers a depth 20
/// request. Writes are upserts, so re-storing a key is harmless and the last
/// write wins.
pub trait EvalCache: Send + Sync {
    fn lookup(&self, request: &EvalRequest) -> Result<Option<Score>, CacheError>;

    fn store(&self, request: &EvalRequest, score: &Score) -> Result<(), CacheError>;

    /// Raw completion flag. Callers decide staleness with
    /// [`archive_reusable`](crate::month::archive_reusable).
    fn is_month_complete(&self, archive: &ArchiveId) -> Result<bool, CacheError>;

    fn mark_month_complete(&self, archive: &ArchiveId) -> Result<(), CacheError>;
}

/// An [`EvalCache`] that also keeps the fetched games of each month.
pub trait ArchiveStore: EvalCache {
    fn load_archive(&self, archive: &ArchiveId) -> Result<Option<Vec<Game>>, CacheError>;

    fn save_archive(&self, archive: &ArchiveId, games: &[Game]) -> Result<(), CacheError>;
}
