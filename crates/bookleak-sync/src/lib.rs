//! Game acquisition: Chess.com archives, PGN replay, month-level caching and filters.

pub mod archive;
pub mod chesscom;
pub mod filter;
pub mod pgn;

#[cfg(feature = "http")]
pub mod http;

use bookleak_core::CacheError;
use thiserror::Error;

pub use archive::{ArchiveSource, CollectOptions, Collected, collect_games};
pub use chesscom::{ArchiveList, ConvertError, MonthArchive, RawGame};
pub use filter::{FilterError, TimeClassFilter, within_days};
pub use pgn::{Pgn, PgnError};

#[cfg(feature = "http")]
pub use http::ChessComClient;

#[derive(Error, Debug)]
pub enum SyncError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cache: {0}")]
    Cache(#[from] CacheError),
    #[error("{0}")]
    Other(String),
}
