//! Pipeline coordinator: games in, ranked recurring mistakes out.

mod config;
pub mod pipeline;
mod summary;

pub use config::AnalysisConfig;
pub use pipeline::{PipelineError, RunReport, run};
pub use summary::{FailureKind, GameFailure, RunSummary};
