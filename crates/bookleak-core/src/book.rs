//! Opening book oracles.
//!
//! [`PolyglotBook`] reads the de-facto standard Polyglot `.bin` format: a flat
//! array of 16-byte big-endian entries sorted by position key.
//!
//! | bytes | field  |
//! |-------|--------|
//! | 0..8  | key (Polyglot Zobrist hash) |
//! | 8..10 | move   |
//! | 10..12| weight |
//! | 12..16| learn  |

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::position::{MoveError, Position};

const ENTRY_SIZE: usize = 16;
const FILES: &[u8; 8] = b"abcdefgh";
const PROMOTIONS: [Option<char>; 8] = [None, Some('n'), Some('b'), Some('r'), Some('q'), None, None, None];

#[derive(Debug, Error)]
pub enum BookError {
    #[error("cannot read book: {0}")]
    Io(#[from] std::io::Error),

    #[error("book size {0} is not a multiple of 16 bytes")]
    Truncated(usize),
}

/// Source of known-theory moves for a position.
pub trait BookOracle: Send + Sync {
    /// Book moves in UCI notation, best first. Empty once theory is exhausted.
    fn recommended_moves(&self, position: &Position) -> Vec<String>;
}

/// One raw Polyglot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookEntry {
    pub key: u64,
    pub raw_move: u16,
    pub weight: u16,
    pub learn: u32,
}

impl BookEntry {
    fn from_bytes(b: &[u8]) -> Self {
        let mut key = [0u8; 8];
        key.copy_from_slice(&b[0..8]);
        let mut learn = [0u8; 4];
        learn.copy_from_slice(&b[12..16]);
        Self {
            key: u64::from_be_bytes(key),
            raw_move: u16::from_be_bytes([b[8], b[9]]),
            weight: u16::from_be_bytes([b[10], b[11]]),
            learn: u32::from_be_bytes(learn),
        }
    }
}

/// Decode a Polyglot move into UCI text, before castling normalisation.
///
/// Bits 0-5 are the target square, 6-11 the origin, 12-14 the promotion piece.
pub fn decode_move(raw: u16) -> String {
    let square = |idx: u16| {
        let file = FILES[(idx % 8) as usize] as char;
        let rank = (b'1' + (idx / 8) as u8) as char;
        format!("{file}{rank}")
    };
    let to = raw & 0x3f;
    let from = (raw >> 6) & 0x3f;
    let mut uci = format!("{}{}", square(from), square(to));
    if let Some(p) = PROMOTIONS[((raw >> 12) & 0x7) as usize] {
        uci.push(p);
    }
    uci
}

/// Polyglot encodes castling as king-takes-own-rook; rewrite it to the
/// king-two-squares form when a king actually stands on the origin square.
fn normalise_castling(position: &Position, uci: &str) -> String {
    let rewritten = match uci {
        "e1h1" => "e1g1",
        "e1a1" => "e1c1",
        "e8h8" => "e8g8",
        "e8a8" => "e8c8",
        other => return other.to_string(),
    };
    if position.king_on(&uci[0..2]) {
        rewritten.to_string()
    } else {
        uci.to_string()
    }
}

/// A Polyglot opening book held in memory.
pub struct PolyglotBook {
    entries: Vec<BookEntry>,
}

impl PolyglotBook {
    /// Read a `.bin` book from disk.
    pub fn open(path: &Path) -> Result<Self, BookError> {
        let bytes = std::fs::read(path)?;
        let book = Self::from_bytes(&bytes)?;
        info!(path = %path.display(), entries = book.len(), "loaded opening book");
        Ok(book)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BookError> {
        if bytes.len() % ENTRY_SIZE != 0 {
            return Err(BookError::Truncated(bytes.len()));
        }
        let mut entries: Vec<BookEntry> = bytes
            .chunks_exact(ENTRY_SIZE)
            .map(BookEntry::from_bytes)
            .collect();
        // Files are sorted by key already; a stable sort keeps hand-built books usable.
        entries.sort_by_key(|e| e.key);
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All raw entries stored under `key`.
    pub fn entries_for(&self, key: u64) -> &[BookEntry] {
        let start = self.entries.partition_point(|e| e.key < key);
        let end = self.entries.partition_point(|e| e.key <= key);
        &self.entries[start..end]
    }
}

impl BookOracle for PolyglotBook {
    fn recommended_moves(&self, position: &Position) -> Vec<String> {
        let mut found: Vec<&BookEntry> = self.entries_for(position.polyglot_key()).iter().collect();
        found.sort_by(|a, b| b.weight.cmp(&a.weight));

        let mut moves: Vec<String> = Vec::with_capacity(found.len());
        for entry in found {
            let uci = normalise_castling(position, &decode_move(entry.raw_move));
            match position.legal_uci(&uci) {
                Ok(mv) if !moves.contains(&mv) => moves.push(mv),
                Ok(_) => {}
                Err(e) => debug!(mv = %uci, error = %e, "dropping illegal book entry"),
            }
        }
        moves
    }
}

/// Book built from explicit move lines, keyed by position.
///
/// Transpositions merge: two lines reaching the same position share its
/// recommendations.
#[derive(Debug, Default, Clone)]
pub struct LineBook {
    moves: HashMap<String, Vec<String>>,
}

impl LineBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from UCI lines, each starting at the initial position.
    pub fn from_lines<I, L, S>(lines: I) -> Result<Self, MoveError>
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut book = Self::new();
        for line in lines {
            book.insert_line(line)?;
        }
        Ok(book)
    }

    pub fn insert_line<L, S>(&mut self, line: L) -> Result<(), MoveError>
    where
        L: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut position = Position::start();
        for mv in line {
            let key = position.key().as_str().to_string();
            let played = position.play(mv.as_ref())?;
            let entry = self.moves.entry(key).or_default();
            if !entry.contains(&played) {
                entry.push(played);
            }
        }
        Ok(())
    }
}

impl BookOracle for LineBook {
    fn recommended_moves(&self, position: &Position) -> Vec<String> {
        self.moves
            .get(position.key().as_str())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: u64 = 0x463b96181691fc9c;

    fn entry(key: u64, raw_move: u16, weight: u16) -> [u8; 16] {
        let mut b = [0u8; 16];
        b[0..8].copy_from_slice(&key.to_be_bytes());
        b[8..10].copy_from_slice(&raw_move.to_be_bytes());
        b[10..12].copy_from_slice(&weight.to_be_bytes());
        b
    }

    fn encode(from: u16, to: u16) -> u16 {
        (from << 6) | to
    }

    #[test]
    fn decodes_e2e4() {
        assert_eq!(decode_move(796), "e2e4");
        // e7e8=Q: from 52, to 60, promotion 4
        assert_eq!(decode_move((4 << 12) | encode(52, 60)), "e7e8q");
    }

    #[test]
    fn start_position_lookup_by_weight() {
        let mut bytes = Vec::new();
        bytes.extend(entry(START, encode(11, 27), 10)); // d2d4
        bytes.extend(entry(START, 796, 50)); // e2e4
        bytes.extend(entry(START + 1, encode(6, 21), 99)); // unrelated key
        let book = PolyglotBook::from_bytes(&bytes).unwrap();

        assert_eq!(book.len(), 3);
        assert_eq!(book.entries_for(START).len(), 2);
        let moves = book.recommended_moves(&Position::start());
        assert_eq!(moves, vec!["e2e4".to_string(), "d2d4".to_string()]);
    }

    #[test]
    fn castling_entries_are_normalised() {
        let pos = Position::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let mut bytes = Vec::new();
        bytes.extend(entry(pos.polyglot_key(), encode(4, 7), 5)); // e1h1
        bytes.extend(entry(pos.polyglot_key(), encode(4, 0), 3)); // e1a1
        let book = PolyglotBook::from_bytes(&bytes).unwrap();
        assert_eq!(book.recommended_moves(&pos), vec!["e1g1", "e1c1"]);
    }

    #[test]
    fn illegal_and_duplicate_entries_dropped() {
        let mut bytes = Vec::new();
        bytes.extend(entry(START, 796, 9));
        bytes.extend(entry(START, 796, 8));
        bytes.extend(entry(START, encode(4, 36), 7)); // e1e5, illegal
        let book = PolyglotBook::from_bytes(&bytes).unwrap();
        assert_eq!(book.recommended_moves(&Position::start()), vec!["e2e4"]);
    }

    #[test]
    fn truncated_book_rejected() {
        assert!(matches!(
            PolyglotBook::from_bytes(&[0u8; 20]),
            Err(BookError::Truncated(20))
        ));
        assert!(PolyglotBook::from_bytes(&[]).unwrap().is_empty());
    }

    #[test]
    fn open_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.bin");
        std::fs::write(&path, entry(START, 796, 1)).unwrap();
        let book = PolyglotBook::open(&path).unwrap();
        assert_eq!(book.recommended_moves(&Position::start()), vec!["e2e4"]);
    }

    #[test]
    fn line_book_merges_transpositions() {
        let book = LineBook::from_lines([
            vec!["e2e4", "e7e5", "g1f3"],
            vec!["e2e4", "c7c5"],
            vec!["d2d4"],
        ])
        .unwrap();
        assert_eq!(book.recommended_moves(&Position::start()), vec!["e2e4", "d2d4"]);
        let mut pos = Position::start();
        pos.play("e2e4").unwrap();
        assert_eq!(book.recommended_moves(&pos), vec!["e7e5", "c7c5"]);
        pos.play("a7a6").unwrap();
        assert!(book.recommended_moves(&pos).is_empty());
    }

    #[test]
    fn line_book_rejects_illegal_lines() {
        assert!(LineBook::from_lines([vec!["e2e5"]]).is_err());
    }
}
