//! Minimal PGN reader: tag pairs plus the mainline as UCI moves.
//!
//! Comments (`{..}` and `;`), recursive variations, NAGs, move numbers,
//! annotation glyphs and the result token are dropped.

use std::collections::BTreeMap;

use bookleak_core::{MoveError, Position};
use thiserror::Error;

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PgnError {
    #[error("empty pgn")]
    Empty,

    #[error("game does not start from the initial position: {0}")]
    CustomStart(String),

    #[error("bad move `{san}` at ply {ply}: {source}")]
    Move {
        ply: usize,
        san: String,
        #[source]
        source: MoveError,
    },
}

/// A parsed PGN game.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pgn {
    pub headers: BTreeMap<String, String>,
    /// Mainline moves in SAN, as written.
    pub san: Vec<String>,
}

impl Pgn {
    pub fn parse(text: &str) -> Result<Self, PgnError> {
        if text.trim().is_empty() {
            return Err(PgnError::Empty);
        }
        let mut pgn = Self::default();
        let mut movetext = String::new();
        for line in text.lines() {
            let line = line.trim();
            if let Some(tag) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                if let Some((name, value)) = tag.split_once(char::is_whitespace) {
                    let value = value.trim().trim_matches('"').replace("\\\"", "\"");
                    pgn.headers.insert(name.to_string(), value);
                }
            } else {
                movetext.push_str(line);
                movetext.push('\n');
            }
        }
        pgn.san = mainline_tokens(&movetext);
        Ok(pgn)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Replay the mainline from the initial position and return UCI moves.
    pub fn mainline_uci(&self) -> Result<Vec<String>, PgnError> {
        if let Some(fen) = self.header("FEN") {
            if fen.trim() != START_FEN {
                return Err(PgnError::CustomStart(fen.to_string()));
            }
        }
        let mut position = Position::start();
        self.san
            .iter()
            .enumerate()
            .map(|(ply, san)| {
                position.play_san(san).map_err(|source| PgnError::Move {
                    ply,
                    san: san.clone(),
                    source,
                })
            })
            .collect()
    }
}

fn is_result(token: &str) -> bool {
    matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*")
}

/// Strip a leading move number (`12.`, `12...`, `12.e4`).
fn strip_move_number(token: &str) -> &str {
    let digits = token.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 && token[digits..].starts_with('.') {
        token[digits..].trim_start_matches('.')
    } else {
        token
    }
}

fn clean_san(token: &str) -> String {
    let san = token.trim_end_matches(['!', '?']);
    match san.trim_end_matches(['+', '#']) {
        "0-0" => san.replacen("0-0", "O-O", 1),
        "0-0-0" => san.replacen("0-0-0", "O-O-O", 1),
        _ => san.to_string(),
    }
}

fn mainline_tokens(movetext: &str) -> Vec<String> {
    let mut moves = Vec::new();
    let mut token = String::new();
    let mut depth = 0usize;
    let mut chars = movetext.chars();

    let flush = |token: &mut String, moves: &mut Vec<String>| {
        let word = strip_move_number(token.trim());
        if !word.is_empty() && !word.starts_with('$') && !is_result(word) {
            moves.push(clean_san(word));
        }
        token.clear();
    };

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                flush(&mut token, &mut moves);
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                }
            }
            ';' => {
                flush(&mut token, &mut moves);
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                flush(&mut token, &mut moves);
                depth += 1;
            }
            ')' => {
                token.clear();
                depth = depth.saturating_sub(1);
            }
            c if c.is_whitespace() => {
                if depth == 0 {
                    flush(&mut token, &mut moves);
                } else {
                    token.clear();
                }
            }
            c => token.push(c),
        }
    }
    if depth == 0 {
        flush(&mut token, &mut moves);
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHESSCOM: &str = r#"[Event "Live Chess"]
[Site "Chess.com"]
[White "alice"]
[Black "bob"]
[Result "1-0"]
[ECO "C50"]
[ECOUrl "https://www.chess.com/openings/Italian-Game"]

1. e4 {[%clk 0:02:59.9]} 1... e5 {[%clk 0:02:58.1]} 2. Nf3 {[%clk 0:02:57]} 2... Nc6 3. Bc4 Bc5 4. O-O Nf6 5. d3 d6 6. Bg5 h6 7. Bxf6 Qxf6 8. Nc3 O-O 1-0
"#;

    #[test]
    fn chesscom_pgn() {
        let pgn = Pgn::parse(CHESSCOM).unwrap();
        assert_eq!(pgn.header("ECO"), Some("C50"));
        assert_eq!(pgn.header("White"), Some("alice"));
        assert_eq!(pgn.san.len(), 16);
        let uci = pgn.mainline_uci().unwrap();
        assert_eq!(&uci[..4], &["e2e4", "e7e5", "g1f3", "b8c6"]);
        assert_eq!(uci[6], "e1g1");
        assert_eq!(uci[15], "e8g8");
    }

    #[test]
    fn variations_nags_and_glyphs_dropped() {
        let text = "1.e4!? e5 (1...c5 2.Nf3 (2.c3) d6) 2.Nf3 $1 Nc6; rest of line\n3.Bb5 a6 *";
        let pgn = Pgn::parse(text).unwrap();
        assert_eq!(pgn.san, vec!["e4", "e5", "Nf3", "Nc6", "Bb5", "a6"]);
    }

    #[test]
    fn zero_castling_and_checks() {
        let text = "1. e4 e5 2. Nf3 Nc6 3. Bc4 Nf6 4. Ng5 d5 5. exd5 Nxd5 6. Nxf7 Kxf7 7. Qf3+ Ke6 8. 0-0";
        let uci = Pgn::parse(text).unwrap().mainline_uci().unwrap();
        assert_eq!(uci.last().map(String::as_str), Some("e1g1"));
        assert_eq!(uci[12], "d1f3");
    }

    #[test]
    fn illegal_move_reports_ply() {
        let err = Pgn::parse("1. e4 e5 2. Ke3").unwrap().mainline_uci().unwrap_err();
        assert!(matches!(err, PgnError::Move { ply: 2, .. }));
    }

    #[test]
    fn custom_start_rejected() {
        let text = "[SetUp \"1\"]\n[FEN \"8/8/8/8/8/8/8/K6k w - - 0 1\"]\n\n1. Kb1 *";
        assert!(matches!(
            Pgn::parse(text).unwrap().mainline_uci(),
            Err(PgnError::CustomStart(_))
        ));
    }

    #[test]
    fn empty_rejected() {
        assert_eq!(Pgn::parse("  \n").unwrap_err(), PgnError::Empty);
    }
}
