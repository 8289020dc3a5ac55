//! The subset of the UCI text protocol needed for fixed-depth analysis.

use std::fmt;

use bookleak_core::MATE_SCORE_CP;

/// GUI-to-engine commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Uci,
    IsReady,
    SetOption { name: String, value: String },
    Position { fen: String, moves: Vec<String> },
    Go { depth: u32 },
    Quit,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uci => f.write_str("uci"),
            Self::IsReady => f.write_str("isready"),
            Self::SetOption { name, value } => write!(f, "setoption name {name} value {value}"),
            Self::Position { fen, moves } if moves.is_empty() => write!(f, "position fen {fen}"),
            Self::Position { fen, moves } => {
                write!(f, "position fen {fen} moves {}", moves.join(" "))
            }
            Self::Go { depth } => write!(f, "go depth {depth}"),
            Self::Quit => f.write_str("quit"),
        }
    }
}

/// Score as reported by the engine, for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineScore {
    Cp(i32),
    Mate(i32),
}

/// Fields of an `info` line we care about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    pub depth: Option<u32>,
    pub score: Option<EngineScore>,
    /// `lowerbound`/`upperbound` scores are aspiration-window artefacts.
    pub bound: bool,
    pub multipv: Option<u32>,
    pub pv: Vec<String>,
}

/// Engine-to-GUI messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    UciOk,
    ReadyOk,
    Info(Info),
    BestMove(Option<String>),
    Other,
}

pub fn parse_line(line: &str) -> Response {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("uciok") => Response::UciOk,
        Some("readyok") => Response::ReadyOk,
        Some("bestmove") => match tokens.next() {
            Some("(none)") | Some("0000") | None => Response::BestMove(None),
            Some(mv) => Response::BestMove(Some(mv.to_string())),
        },
        Some("info") => Response::Info(parse_info(tokens)),
        _ => Response::Other,
    }
}

fn parse_info<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Info {
    let mut info = Info::default();
    while let Some(token) = tokens.next() {
        match token {
            "depth" => info.depth = tokens.next().and_then(|t| t.parse().ok()),
            "multipv" => info.multipv = tokens.next().and_then(|t| t.parse().ok()),
            "score" => {
                let kind = tokens.next();
                let value = tokens.next().and_then(|t| t.parse::<i32>().ok());
                info.score = match (kind, value) {
                    // Anything past a mate score is noise.
                    (Some("cp"), Some(v)) => {
                        Some(EngineScore::Cp(v.clamp(-MATE_SCORE_CP, MATE_SCORE_CP)))
                    }
                    (Some("mate"), Some(v)) => Some(EngineScore::Mate(v)),
                    _ => None,
                };
            }
            "lowerbound" | "upperbound" => info.bound = true,
            // `pv` is always last on the line.
            "pv" => {
                info.pv = tokens.by_ref().map(str::to_string).collect();
            }
            // Free text runs to end of line.
            "string" => break,
            _ => {}
        }
    }
    info
}

/// Accumulates `info` lines of one search.
#[derive(Debug, Default)]
pub struct SearchState {
    pub score: Option<EngineScore>,
    pub depth: Option<u32>,
    pub pv_head: Option<String>,
}

impl SearchState {
    /// Keep the latest exact score of the principal line.
    pub fn update(&mut self, info: Info) {
        if info.bound || info.multipv.is_some_and(|n| n != 1) {
            return;
        }
        let Some(score) = info.score else {
            return;
        };
        self.score = Some(score);
        self.depth = info.depth.or(self.depth);
        if let Some(head) = info.pv.into_iter().next() {
            self.pv_head = Some(head);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_text() {
        assert_eq!(Command::Go { depth: 18 }.to_string(), "go depth 18");
        assert_eq!(
            Command::SetOption { name: "Hash".into(), value: "64".into() }.to_string(),
            "setoption name Hash value 64"
        );
        let fen = "8/8/8/8/8/8/8/K6k w - - 0 1".to_string();
        assert_eq!(
            Command::Position { fen: fen.clone(), moves: vec![] }.to_string(),
            format!("position fen {fen}")
        );
        assert_eq!(
            Command::Position { fen: fen.clone(), moves: vec!["a1a2".into()] }.to_string(),
            format!("position fen {fen} moves a1a2")
        );
    }

    #[test]
    fn parse_info_line() {
        let line = "info depth 18 seldepth 24 multipv 1 score cp -35 nodes 123 nps 9 pv e7e5 g1f3 b8c6";
        let Response::Info(info) = parse_line(line) else {
            panic!("expected info");
        };
        assert_eq!(info.depth, Some(18));
        assert_eq!(info.score, Some(EngineScore::Cp(-35)));
        assert_eq!(info.multipv, Some(1));
        assert!(!info.bound);
        assert_eq!(info.pv, vec!["e7e5", "g1f3", "b8c6"]);
    }

    #[test]
    fn parse_mate_and_bounds() {
        let Response::Info(info) = parse_line("info depth 12 score mate -3 upperbound pv h7h8") else {
            panic!("expected info");
        };
        assert_eq!(info.score, Some(EngineScore::Mate(-3)));
        assert!(info.bound);
    }

    #[test]
    fn extreme_centipawns_are_clamped() {
        let Response::Info(info) = parse_line("info depth 30 score cp -2147483648 pv a2a3") else {
            panic!("expected info");
        };
        assert_eq!(info.score, Some(EngineScore::Cp(-MATE_SCORE_CP)));
        let Response::Info(info) = parse_line("info depth 30 score cp 99999999") else {
            panic!("expected info");
        };
        assert_eq!(info.score, Some(EngineScore::Cp(MATE_SCORE_CP)));
    }

    #[test]
    fn parse_bestmove() {
        assert_eq!(parse_line("bestmove e2e4 ponder e7e5"), Response::BestMove(Some("e2e4".into())));
        assert_eq!(parse_line("bestmove (none)"), Response::BestMove(None));
        assert_eq!(parse_line("uciok"), Response::UciOk);
        assert_eq!(parse_line("readyok"), Response::ReadyOk);
        assert_eq!(parse_line("id name Stockfish 17"), Response::Other);
        assert_eq!(parse_line(""), Response::Other);
    }

    #[test]
    fn search_state_ignores_bounds_and_secondary_lines() {
        let mut state = SearchState::default();
        for line in [
            "info depth 10 score cp 20 pv e2e4",
            "info depth 11 score cp 90 lowerbound pv d2d4",
            "info depth 11 multipv 2 score cp -50 pv g2g4",
            "info string NNUE enabled",
            "info depth 11 score cp 25 pv c2c4 e7e5",
        ] {
            if let Response::Info(info) = parse_line(line) {
                state.update(info);
            }
        }
        assert_eq!(state.score, Some(EngineScore::Cp(25)));
        assert_eq!(state.depth, Some(11));
        assert_eq!(state.pv_head.as_deref(), Some("c2c4"));
    }
}
