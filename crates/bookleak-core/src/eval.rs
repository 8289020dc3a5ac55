//! Evaluation requests, engine scores, and the cost of a deviation.

use serde::{Deserialize, Serialize};

use crate::position::PositionKey;

/// Centipawn value standing in for a forced mate.
pub const MATE_SCORE_CP: i32 = 10_000;

/// One engine query. Equal requests are interchangeable, so this is also the
/// cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvalRequest {
    pub position: PositionKey,
    /// Move to play before searching; `None` asks for the engine's own best line.
    pub played: Option<String>,
    pub depth: u32,
}

impl EvalRequest {
    /// Evaluate `position` with the engine's best move.
    pub fn best(position: PositionKey, depth: u32) -> Self {
        Self {
            position,
            played: None,
            depth,
        }
    }

    /// Evaluate `position` after `played`.
    pub fn after(position: PositionKey, played: impl Into<String>, depth: u32) -> Self {
        Self {
            position,
            played: Some(played.into()),
            depth,
        }
    }
}

/// An engine score from the point of view of the side to move at the
/// request's position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub cp: i32,
    /// Signed moves to mate, when the search found one.
    pub mate: Option<i32>,
    /// Engine's preferred move at the searched position, if reported.
    pub best_move: Option<String>,
    pub depth: u32,
}

impl Score {
    pub fn centipawns(cp: i32, depth: u32) -> Self {
        Self {
            cp,
            mate: None,
            best_move: None,
            depth,
        }
    }

    /// Mate in `n` moves. Negative or zero means the side to move is mated.
    pub fn mate_in(n: i32, depth: u32) -> Self {
        let cp = if n > 0 { MATE_SCORE_CP } else { -MATE_SCORE_CP };
        Self {
            cp,
            mate: Some(n),
            best_move: None,
            depth,
        }
    }

    pub fn with_best_move(mut self, mv: impl Into<String>) -> Self {
        self.best_move = Some(mv.into());
        self
    }

    /// The same score seen from the other side.
    pub fn negated(&self) -> Self {
        Self {
            cp: self.cp.saturating_neg(),
            mate: self.mate.map(i32::saturating_neg),
            best_move: self.best_move.clone(),
            depth: self.depth,
        }
    }
}

/// Score of the engine's best line against the score of the played move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalResult {
    pub before: Score,
    pub after: Score,
    /// `before.cp - after.cp`. Negative when the engine likes the played move
    /// better than its own suggestion at this depth.
    pub eval_loss: i32,
}

impl EvalResult {
    pub fn new(before: Score, after: Score) -> Self {
        let eval_loss = before.cp.saturating_sub(after.cp);
        Self {
            before,
            after,
            eval_loss,
        }
    }

    /// The engine's recommended move at the deviation position.
    pub fn best_move(&self) -> Option<&str> {
        self.before.best_move.as_deref()
    }

    pub fn is_improvement(&self) -> bool {
        self.eval_loss < 0
    }
}
