//! Domain model and pure algorithms for finding recurring opening mistakes.

pub mod aggregate;
pub mod book;
pub mod cache;
pub mod detect;
pub mod eval;
pub mod game;
pub mod month;
pub mod position;
pub mod record;
pub mod repertoire;
pub mod schema;

pub use aggregate::{DeviationGroup, DeviationRecord, LossStats, group};
pub use book::{BookError, BookOracle, LineBook, PolyglotBook};
pub use cache::{ArchiveId, ArchiveStore, CacheError, EvalCache};
pub use detect::{DeviationPoint, MalformedGame, detect};
pub use eval::{EvalRequest, EvalResult, MATE_SCORE_CP, Score};
pub use game::{Color, Game, Outcome, TimeClass};
pub use month::{Month, archive_reusable, is_current_month};
pub use position::{MoveError, Position, PositionKey};
pub use record::{ResultSummary, Tally};
pub use repertoire::{OpeningStats, format_summary, opening_stats};
