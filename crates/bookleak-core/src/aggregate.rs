//! Grouping repeated deviations into ranked mistakes.
//!
//! Every evaluated deviation becomes a [`DeviationRecord`]. Records sharing the
//! same position and played move collapse into one [`DeviationGroup`]. Output
//! order depends only on the input multiset, never on the order in which
//! evaluations finished.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::DeviationPoint;
use crate::eval::EvalResult;
use crate::game::Color;
use crate::position::PositionKey;

/// One game's evaluated deviation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviationRecord {
    pub game_id: String,
    pub played_at: DateTime<Utc>,
    /// Colour the analysed player had in this game.
    pub player_color: Color,
    pub eco: Option<String>,
    pub opening: Option<String>,
    pub point: DeviationPoint,
    pub eval: EvalResult,
}

impl DeviationRecord {
    /// Whether the analysed player (not the opponent) left the book.
    pub fn by_player(&self) -> bool {
        self.point.color == self.player_color
    }

    fn chronological_key(&self) -> (DateTime<Utc>, &str) {
        (self.played_at, self.game_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossStats {
    pub min: i32,
    pub max: i32,
    pub mean: f64,
}

/// A recurring mistake: the same move played in the same position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationGroup {
    pub position: PositionKey,
    pub played_move: String,
    pub best_move: Option<String>,
    pub book_moves: Vec<String>,
    pub ply: usize,
    pub color: Color,
    pub eco: Option<String>,
    pub opening: Option<String>,
    /// Evaluation of the earliest occurrence.
    pub eval: EvalResult,
    pub occurrences: usize,
    /// Contributing games, oldest first.
    pub game_ids: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub loss_stats: LossStats,
}

impl DeviationGroup {
    pub fn eval_loss(&self) -> i32 {
        self.eval.eval_loss
    }

    fn from_members(mut members: Vec<&DeviationRecord>) -> Option<Self> {
        members.sort_by(|a, b| a.chronological_key().cmp(&b.chronological_key()));
        let first = *members.first()?;
        let last = *members.last()?;

        let losses: Vec<i32> = members.iter().map(|r| r.eval.eval_loss).collect();
        let sum: i64 = losses.iter().map(|&l| i64::from(l)).sum();
        let loss_stats = LossStats {
            min: losses.iter().copied().min().unwrap_or_default(),
            max: losses.iter().copied().max().unwrap_or_default(),
            mean: sum as f64 / losses.len() as f64,
        };

        Some(Self {
            position: first.point.position.clone(),
            played_move: first.point.played_move.clone(),
            best_move: first.eval.best_move().map(str::to_string),
            book_moves: first.point.book_moves.clone(),
            ply: first.point.ply,
            color: first.point.color,
            eco: members.iter().find_map(|r| r.eco.clone()),
            opening: members.iter().find_map(|r| r.opening.clone()),
            eval: first.eval.clone(),
            occurrences: members.len(),
            game_ids: members.iter().map(|r| r.game_id.clone()).collect(),
            first_seen: first.played_at,
            last_seen: last.played_at,
            loss_stats,
        })
    }
}

/// Group records by (position, played move), drop groups seen fewer than
/// `min_occurrences` times, and rank the rest.
///
/// Ranking: eval loss descending, then occurrences descending, then earliest
/// occurrence, then position and move as a final total order.
pub fn group(records: &[DeviationRecord], min_occurrences: usize) -> Vec<DeviationGroup> {
    let mut partitions: BTreeMap<(&PositionKey, &str), Vec<&DeviationRecord>> = BTreeMap::new();
    for record in records {
        partitions
            .entry((&record.point.position, record.point.played_move.as_str()))
            .or_default()
            .push(record);
    }

    let mut groups: Vec<DeviationGroup> = partitions
        .into_values()
        .filter(|members| members.len() >= min_occurrences)
        .filter_map(DeviationGroup::from_members)
        .collect();

    groups.sort_by(|a, b| {
        b.eval_loss()
            .cmp(&a.eval_loss())
            .then_with(|| b.occurrences.cmp(&a.occurrences))
            .then_with(|| a.first_seen.cmp(&b.first_seen))
            .then_with(|| a.position.cmp(&b.position))
            .then_with(|| a.played_move.cmp(&b.played_move))
    });
    groups
}
