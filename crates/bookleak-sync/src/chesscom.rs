//! Chess.com public API payloads and their conversion into [`Game`] records.

use bookleak_core::{Color, Game, Month, Outcome, TimeClass};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::pgn::{Pgn, PgnError};

pub const SOURCE: &str = "chess.com";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{player} did not play in {url}")]
    NotParticipant { player: String, url: String },

    #[error("unsupported variant `{0}`")]
    Variant(String),

    #[error("invalid end time {0}")]
    Timestamp(i64),

    #[error(transparent)]
    Pgn(#[from] PgnError),
}

/// `GET /pub/player/{user}/games/archives`
#[derive(Debug, Deserialize)]
pub struct ArchiveList {
    #[serde(default)]
    pub archives: Vec<String>,
}

impl ArchiveList {
    /// Months listed, oldest first. Unrecognised URLs are skipped.
    pub fn months(&self) -> Vec<Month> {
        let mut months: Vec<Month> = self
            .archives
            .iter()
            .filter_map(|url| Month::from_archive_url(url))
            .collect();
        months.sort();
        months.dedup();
        months
    }
}

/// `GET /pub/player/{user}/games/{YYYY}/{MM}`
#[derive(Debug, Deserialize)]
pub struct MonthArchive {
    #[serde(default)]
    pub games: Vec<RawGame>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlayer {
    pub username: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub rating: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGame {
    pub url: String,
    #[serde(default)]
    pub pgn: String,
    #[serde(default)]
    pub time_control: String,
    pub end_time: i64,
    #[serde(default)]
    pub time_class: String,
    #[serde(default = "standard_rules")]
    pub rules: String,
    pub white: RawPlayer,
    pub black: RawPlayer,
    /// Opening page URL, e.g. `https://www.chess.com/openings/Italian-Game`.
    #[serde(default)]
    pub eco: Option<String>,
}

fn standard_rules() -> String {
    "chess".to_string()
}

/// Opening name from a Chess.com openings URL slug.
fn opening_from_url(url: &str) -> Option<String> {
    let slug = url.split("/openings/").nth(1)?.trim_end_matches('/');
    if slug.is_empty() {
        return None;
    }
    Some(slug.replace('-', " "))
}

impl RawGame {
    /// Convert from the point of view of `player` (case-insensitive).
    pub fn into_game(self, player: &str) -> Result<Game, ConvertError> {
        if self.rules != "chess" {
            return Err(ConvertError::Variant(self.rules));
        }
        let (color, me) = if self.white.username.eq_ignore_ascii_case(player) {
            (Color::White, &self.white)
        } else if self.black.username.eq_ignore_ascii_case(player) {
            (Color::Black, &self.black)
        } else {
            return Err(ConvertError::NotParticipant {
                player: player.to_string(),
                url: self.url,
            });
        };
        let outcome = Outcome::from_result_code(&me.result);
        let played_at: DateTime<Utc> = DateTime::from_timestamp(self.end_time, 0)
            .ok_or(ConvertError::Timestamp(self.end_time))?;

        let pgn = Pgn::parse(&self.pgn)?;
        let moves = pgn.mainline_uci()?;
        let eco = pgn.header("ECO").map(str::to_string);
        let opening = pgn
            .header("ECOUrl")
            .or(self.eco.as_deref())
            .and_then(opening_from_url);

        Ok(Game {
            id: self.url,
            moves,
            color,
            time_class: self.time_class.parse::<TimeClass>().ok(),
            time_control: self.time_control,
            outcome,
            played_at,
            source: SOURCE.to_string(),
            eco,
            opening,
        })
    }
}
