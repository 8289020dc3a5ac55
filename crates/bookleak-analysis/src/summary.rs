//! End-of-run accounting.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A move could not be replayed.
    Malformed,
    /// The engine gave up on one of the deviation's requests.
    Evaluation,
}

/// Why a game contributed nothing to the ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFailure {
    pub game_id: String,
    pub kind: FailureKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub games_total: usize,
    pub too_short: usize,
    pub in_book: usize,
    pub malformed: usize,
    pub deviations: usize,
    pub evaluated: usize,
    pub eval_failed: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub engine_requests: usize,
    pub cache_errors: usize,
    /// Set after the first failed cache write; later results stay in memory.
    pub cache_writes_disabled: bool,
    pub failures: Vec<GameFailure>,
}

impl RunSummary {
    /// Games skipped or failed, i.e. neither in book nor evaluated.
    pub fn skipped(&self) -> usize {
        self.too_short + self.malformed + self.eval_failed
    }
}
