use serde::{Deserialize, Serialize};

/// Knobs for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Engine search depth. Part of every cache key.
    pub depth: u32,
    /// Groups seen fewer times than this are dropped from the ranking.
    pub min_occurrences: usize,
    /// Skip cache reads. Fresh results are still written.
    pub no_cache: bool,
    /// Rank only deviations made by the analysed player.
    pub player_moves_only: bool,
    /// Games shorter than this many plies are skipped.
    pub min_game_plies: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            depth: 18,
            min_occurrences: 1,
            no_cache: false,
            player_moves_only: true,
            min_game_plies: 4,
        }
    }
}
