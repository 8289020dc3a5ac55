//! Deviation detection: find where a game first leaves the book.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::book::BookOracle;
use crate::game::{Color, Game};
use crate::position::{MoveError, Position, PositionKey};

/// The first position at which a game's move was not a book move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviationPoint {
    /// Position before the deviating move.
    pub position: PositionKey,
    /// Zero-based half-move index of the deviating move.
    pub ply: usize,
    /// Side that made the deviating move.
    pub color: Color,
    /// What the book recommended instead, best first.
    pub book_moves: Vec<String>,
    /// The move actually played (normalised UCI).
    pub played_move: String,
}

/// A game whose move list cannot be replayed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("game {game_id}: bad move at ply {ply}: {source}")]
pub struct MalformedGame {
    pub game_id: String,
    pub ply: usize,
    #[source]
    pub source: MoveError,
}

/// Walk `game` against `book` and return its first deviation, if any.
///
/// Returns `Ok(None)` when the game has no moves, when the book runs out of
/// recommendations, or when every move stays in book. Moves after the first
/// deviation are never inspected.
pub fn detect<B: BookOracle + ?Sized>(
    game: &Game,
    book: &B,
) -> Result<Option<DeviationPoint>, MalformedGame> {
    let mut position = Position::start();

    for (ply, mv) in game.moves.iter().enumerate() {
        let book_moves = book.recommended_moves(&position);
        if book_moves.is_empty() {
            return Ok(None);
        }

        let played = position.legal_uci(mv).map_err(|source| MalformedGame {
            game_id: game.id.clone(),
            ply,
            source,
        })?;

        if book_moves.contains(&played) {
            position.play(&played).map_err(|source| MalformedGame {
                game_id: game.id.clone(),
                ply,
                source,
            })?;
            continue;
        }

        return Ok(Some(DeviationPoint {
            position: position.key(),
            ply,
            color: position.turn(),
            book_moves,
            played_move: played,
        }));
    }

    Ok(None)
}
