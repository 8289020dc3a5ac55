//! Immutable game records as handed over by a game source.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;


#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// Side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Self::White),
            "black" | "b" => Ok(Self::Black),
            _ => Err(ParseEnumError {
                kind: "color",
                value: s.to_string(),
            }),
        }
    }
}

/// Time-control family a game was played under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeClass {
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Daily,
}

impl TimeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullet => "bullet",
            Self::Blitz => "blitz",
            Self::Rapid => "rapid",
            Self::Classical => "classical",
            Self::Daily => "daily",
        }
    }
}

impl fmt::Display for TimeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeClass {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullet" => Ok(Self::Bullet),
            "blitz" => Ok(Self::Blitz),
            "rapid" => Ok(Self::Rapid),
            "classical" | "standard" => Ok(Self::Classical),
            "daily" | "correspondence" => Ok(Self::Daily),
            _ => Err(ParseEnumError {
                kind: "time class",
                value: s.to_string(),
            }),
        }
    }
}

/// Result of a game from the player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    /// Map a Chess.com per-player result code.
    ///
    /// Anything that is neither a win nor one of the losing codes
    /// (agreed, repetition, stalemate, insufficient, 50move, timevsinsufficient)
    /// counts as a draw.
    pub fn from_result_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "win" => Self::Win,
            "checkmated" | "timeout" | "resigned" | "abandoned" | "lose" => Self::Loss,
            _ => Self::Draw,
        }
    }
}

/// A finished game, already parsed into UCI moves.
///
/// Never mutated after construction; the pipeline only borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Stable identifier (the game URL for Chess.com games).
    pub id: String,
    /// Played moves in UCI notation, from the initial position.
    pub moves: Vec<String>,
    /// Colour the analysed player had.
    pub color: Color,
    pub time_class: Option<TimeClass>,
    /// Raw time control string, e.g. `"180+2"`.
    pub time_control: String,
    pub outcome: Outcome,
    pub played_at: DateTime<Utc>,
    /// Where the record came from, e.g. `"chess.com"`.
    pub source: String,
    pub eco: Option<String>,
    pub opening: Option<String>,
}

impl Game {
    /// Number of half-moves in the game.
    pub fn plies(&self) -> usize {
        self.moves.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn color_parse_and_display() {
        assert_eq!("White".parse::<Color>().unwrap(), Color::White);
        assert_eq!("b".parse::<Color>().unwrap(), Color::Black);
        assert!("red".parse::<Color>().is_err());
        assert_eq!(Color::Black.to_string(), "black");
    }

    #[test]
    fn time_class_aliases() {
        assert_eq!("standard".parse::<TimeClass>().unwrap(), TimeClass::Classical);
        assert_eq!("Daily".parse::<TimeClass>().unwrap(), TimeClass::Daily);
        assert!("hyperbullet".parse::<TimeClass>().is_err());
    }

    #[test]
    fn outcome_codes() {
        assert_eq!(Outcome::from_result_code("win"), Outcome::Win);
        assert_eq!(Outcome::from_result_code("resigned"), Outcome::Loss);
        assert_eq!(Outcome::from_result_code("timeout"), Outcome::Loss);
        assert_eq!(Outcome::from_result_code("agreed"), Outcome::Draw);
        assert_eq!(Outcome::from_result_code("stalemate"), Outcome::Draw);
    }

    #[test]
    fn plies_count_half_moves() {
        let game = Game {
            id: "g1".into(),
            moves: vec!["e2e4".into()],
            color: Color::White,
            time_class: Some(TimeClass::Blitz),
            time_control: "180".into(),
            outcome: Outcome::Win,
            played_at: Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
            source: "test".into(),
            eco: None,
            opening: None,
        };
        assert_eq!(game.plies(), 1);
    }
}
