//! Engine session and factory traits.
//!
//! A session owns one engine process and answers one request at a time. The
//! pool never shares a session between workers.

use std::time::Duration;

use async_trait::async_trait;
use bookleak_core::{EvalRequest, Score};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine process exited")]
    Exited,

    #[error("engine did not answer within {0:?}")]
    Timeout(Duration),

    #[error("engine protocol error: {0}")]
    Protocol(String),

    #[error("engine io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One live engine.
#[async_trait]
pub trait EngineSession: Send {
    /// Search the request's position and return a score for the side to move
    /// at that position.
    async fn evaluate(&mut self, request: &EvalRequest) -> Result<Score, EngineError>;

    /// Stop the engine. Must not leave the process running.
    async fn shutdown(&mut self);
}

/// Creates fresh sessions, at pool start and whenever a worker restarts.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn spawn(&self, worker: usize) -> Result<Box<dyn EngineSession>, EngineError>;
}
