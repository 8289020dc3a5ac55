//! Per-opening statistics over every evaluated deviation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::DeviationRecord;
use crate::game::{Color, Game};

const UNKNOWN_OPENING: &str = "Unknown Opening";

/// How one opening (by ECO code) went for the player with one colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningStats {
    pub eco: Option<String>,
    pub name: String,
    pub color: Color,
    /// Every game of this opening, in book or not.
    pub times_played: usize,
    /// Games that never left the book. They carry no evaluation.
    pub in_book: usize,
    /// Sum of evaluations at the deviation, player's point of view.
    pub total_eval: i64,
    pub min_eval: Option<i32>,
    pub max_eval: Option<i32>,
    pub total_deviation_ply: usize,
    /// Deviations made by the player rather than the opponent.
    pub player_deviated: usize,
}

impl OpeningStats {
    fn empty(eco: Option<&str>, opening: Option<&str>, color: Color) -> Self {
        Self {
            eco: eco.map(str::to_string),
            name: opening.unwrap_or(UNKNOWN_OPENING).to_string(),
            color,
            times_played: 0,
            in_book: 0,
            total_eval: 0,
            min_eval: None,
            max_eval: None,
            total_deviation_ply: 0,
            player_deviated: 0,
        }
    }

    fn add(&mut self, record: &DeviationRecord) {
        let eval = player_eval(record);
        self.times_played += 1;
        self.total_eval += i64::from(eval);
        self.min_eval = Some(self.min_eval.map_or(eval, |m| m.min(eval)));
        self.max_eval = Some(self.max_eval.map_or(eval, |m| m.max(eval)));
        self.total_deviation_ply += record.point.ply;
        if record.by_player() {
            self.player_deviated += 1;
        }
    }

    fn add_in_book(&mut self) {
        self.times_played += 1;
        self.in_book += 1;
    }

    /// Games that left the book and were scored.
    pub fn evaluated(&self) -> usize {
        self.times_played - self.in_book
    }

    /// Mean evaluation of the scored games in centipawns, rounded to one decimal.
    pub fn avg_eval(&self) -> f64 {
        round1(self.total_eval as f64, self.evaluated())
    }

    pub fn avg_deviation_ply(&self) -> f64 {
        round1(self.total_deviation_ply as f64, self.evaluated())
    }
}

fn round1(total: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (total / n as f64 * 10.0).round() / 10.0
}

/// Evaluation of the deviation position for the analysed player.
///
/// The stored score is for the side to move, which is the opponent when the
/// opponent deviated.
fn player_eval(record: &DeviationRecord) -> i32 {
    if record.by_player() {
        record.eval.before.cp
    } else {
        record.eval.before.cp.saturating_neg()
    }
}

/// Accumulate stats per (ECO code, player colour), sorted by ECO then colour.
///
/// `in_book` games count toward `times_played` only.
pub fn opening_stats(records: &[DeviationRecord], in_book: &[&Game]) -> Vec<OpeningStats> {
    let mut by_opening: BTreeMap<(Option<&str>, Color), OpeningStats> = BTreeMap::new();
    for record in records {
        by_opening
            .entry((record.eco.as_deref(), record.player_color))
            .or_insert_with(|| {
                OpeningStats::empty(
                    record.eco.as_deref(),
                    record.opening.as_deref(),
                    record.player_color,
                )
            })
            .add(record);
    }
    for game in in_book {
        by_opening
            .entry((game.eco.as_deref(), game.color))
            .or_insert_with(|| {
                OpeningStats::empty(game.eco.as_deref(), game.opening.as_deref(), game.color)
            })
            .add_in_book();
    }
    by_opening.into_values().collect()
}

/// One line per opening played at least `min_games` times, best average first.
pub fn format_summary(stats: &[OpeningStats], min_games: usize) -> Vec<String> {
    let mut kept: Vec<&OpeningStats> = stats
        .iter()
        .filter(|s| s.times_played >= min_games)
        .collect();
    kept.sort_by(|a, b| b.avg_eval().total_cmp(&a.avg_eval()));

    kept.into_iter()
        .map(|s| {
            let pawns = s.avg_eval() / 100.0;
            let sign = if pawns >= 0.0 { "+" } else { "" };
            let eco = s
                .eco
                .as_deref()
                .map(|e| format!(" ({e})"))
                .unwrap_or_default();
            let booked = if s.in_book > 0 {
                format!(", {} stayed in book", s.in_book)
            } else {
                String::new()
            };
            format!(
                "{}{eco} as {}: avg {sign}{pawns:.1} pawns, played {}x, avg book depth {} plies{booked}",
                s.name,
                s.color,
                s.times_played,
                s.avg_deviation_ply()
            )
        })
        .collect()
}
