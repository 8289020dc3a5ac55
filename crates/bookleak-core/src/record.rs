//! Win/loss/draw record over a set of games.

use serde::{Deserialize, Serialize};

use crate::game::{Color, Game, Outcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub wins: usize,
    pub losses: usize,
    pub draws: usize,
}

impl Tally {
    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Draw => self.draws += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.wins + self.losses + self.draws
    }

    /// Percentage of wins, 0 when there are no games.
    pub fn win_rate(&self) -> f64 {
        percent(self.wins, self.total())
    }

    pub fn loss_rate(&self) -> f64 {
        percent(self.losses, self.total())
    }

    pub fn draw_rate(&self) -> f64 {
        percent(self.draws, self.total())
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub overall: Tally,
    pub white: Tally,
    pub black: Tally,
}

impl ResultSummary {
    pub fn from_games(games: &[Game]) -> Self {
        let mut summary = Self::default();
        for game in games {
            summary.overall.add(game.outcome);
            match game.color {
                Color::White => summary.white.add(game.outcome),
                Color::Black => summary.black.add(game.outcome),
            }
        }
        summary
    }
}
