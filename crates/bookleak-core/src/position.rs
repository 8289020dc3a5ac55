//! Board positions and their stable string keys.
//!
//! A [`Position`] is a legal board reached from the initial position. Its
//! [`PositionKey`] is the first four FEN fields (placement, side to move,
//! castling rights, en-passant square): two games reaching the same board by
//! different move orders get the same key, regardless of move counters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::Uci;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position as _, Role, Square};
use thiserror::Error;

use crate::game::Color;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("unparseable move `{0}`")]
    Syntax(String),

    #[error("illegal move `{mv}` in {position}")]
    Illegal { mv: String, position: PositionKey },

    #[error("invalid position `{0}`")]
    InvalidPosition(String),
}

/// Canonical string key of a position: FEN without the move counters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionKey(String);

impl PositionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full FEN with zeroed counters, for a UCI `position fen` command.
    pub fn to_fen(&self) -> String {
        format!("{} 0 1", self.0)
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PositionKey {
    type Err = MoveError;

    /// Accepts a key or a full FEN and normalises it through the board.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_fen(s).map(|p| p.key())
    }
}

/// A legal chess position.
#[derive(Debug, Clone, Default)]
pub struct Position {
    chess: Chess,
}

impl Position {
    /// The standard initial position.
    pub fn start() -> Self {
        Self::default()
    }

    /// Parse a FEN; the move counters may be omitted.
    pub fn from_fen(fen: &str) -> Result<Self, MoveError> {
        let invalid = || MoveError::InvalidPosition(fen.to_string());
        let fen = fen.trim();
        let full = if fen.split_whitespace().count() == 4 {
            format!("{fen} 0 1")
        } else {
            fen.to_string()
        };
        let parsed: Fen = full.parse().map_err(|_| invalid())?;
        let chess: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|_| invalid())?;
        Ok(Self { chess })
    }

    pub fn key(&self) -> PositionKey {
        let fen = Fen::from_position(self.chess.clone(), EnPassantMode::Legal).to_string();
        let key: Vec<&str> = fen.split_whitespace().take(4).collect();
        PositionKey(key.join(" "))
    }

    pub fn turn(&self) -> Color {
        match self.chess.turn() {
            shakmaty::Color::White => Color::White,
            shakmaty::Color::Black => Color::Black,
        }
    }

    /// Zobrist hash compatible with Polyglot opening books.
    pub fn polyglot_key(&self) -> u64 {
        let hash: Zobrist64 = self.chess.zobrist_hash(EnPassantMode::Legal);
        hash.0
    }

    /// Whether a king stands on the named square (e.g. `"e1"`).
    pub fn king_on(&self, square: &str) -> bool {
        square
            .parse::<Square>()
            .ok()
            .and_then(|sq| self.chess.board().piece_at(sq))
            .is_some_and(|piece| piece.role == Role::King)
    }

    /// Check that a UCI move is legal here and return its normalised form.
    ///
    /// Castling is normalised to the king-two-squares form (`e1g1`).
    pub fn legal_uci(&self, uci: &str) -> Result<String, MoveError> {
        let m = self.resolve_uci(uci)?;
        Ok(Uci::from_standard(&m).to_string())
    }

    /// Play a UCI move, returning its normalised form.
    pub fn play(&mut self, uci: &str) -> Result<String, MoveError> {
        let m = self.resolve_uci(uci)?;
        Ok(self.apply(&m))
    }

    /// Play a SAN move (check/mate suffixes allowed), returning its UCI form.
    pub fn play_san(&mut self, san: &str) -> Result<String, MoveError> {
        let parsed: SanPlus = san
            .trim()
            .parse()
            .map_err(|_| MoveError::Syntax(san.to_string()))?;
        let m = parsed
            .san
            .to_move(&self.chess)
            .map_err(|_| self.illegal(san))?;
        Ok(self.apply(&m))
    }

    fn resolve_uci(&self, uci: &str) -> Result<Move, MoveError> {
        let parsed: Uci = uci
            .trim()
            .parse()
            .map_err(|_| MoveError::Syntax(uci.to_string()))?;
        parsed.to_move(&self.chess).map_err(|_| self.illegal(uci))
    }

    fn apply(&mut self, m: &Move) -> String {
        let uci = Uci::from_standard(m).to_string();
        self.chess.play_unchecked(m);
        uci
    }

    fn illegal(&self, mv: &str) -> MoveError {
        MoveError::Illegal {
            mv: mv.to_string(),
            position: self.key(),
        }
    }
}
