//! UCI engine running as a child process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bookleak_core::{EvalRequest, Score};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::session::{EngineError, EngineFactory, EngineSession};
use crate::uci::{Command, EngineScore, Response, SearchState, parse_line};

const QUIT_GRACE: Duration = Duration::from_secs(2);

/// How to launch and configure an engine binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub threads: u32,
    pub hash_mb: u32,
    pub handshake_timeout_secs: u64,
    pub search_timeout_secs: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stockfish"),
            args: Vec::new(),
            threads: 1,
            hash_mb: 64,
            handshake_timeout_secs: 10,
            search_timeout_secs: 120,
        }
    }
}

impl EngineOptions {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

/// A running UCI engine.
pub struct UciEngine {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    search_timeout: Duration,
    worker: usize,
}

impl UciEngine {
    /// Launch the engine and complete the `uci`/`isready` handshake.
    pub async fn spawn(options: &EngineOptions, worker: usize) -> Result<Self, EngineError> {
        let mut child = tokio::process::Command::new(&options.path)
            .args(&options.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("{}: {e}", options.path.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Unavailable("no stdin pipe".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Unavailable("no stdout pipe".into()))?;

        let mut engine = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            search_timeout: options.search_timeout(),
            worker,
        };

        let limit = options.handshake_timeout();
        timeout(limit, engine.handshake(options))
            .await
            .map_err(|_| EngineError::Timeout(limit))??;
        debug!(worker, pid = ?engine.child.id(), "engine ready");
        Ok(engine)
    }

    async fn handshake(&mut self, options: &EngineOptions) -> Result<(), EngineError> {
        self.send(&Command::Uci).await?;
        self.wait_for(|r| matches!(r, Response::UciOk)).await?;
        self.send(&Command::SetOption {
            name: "Threads".into(),
            value: options.threads.to_string(),
        })
        .await?;
        self.send(&Command::SetOption {
            name: "Hash".into(),
            value: options.hash_mb.to_string(),
        })
        .await?;
        self.send(&Command::IsReady).await?;
        self.wait_for(|r| matches!(r, Response::ReadyOk)).await?;
        Ok(())
    }

    async fn send(&mut self, command: &Command) -> Result<(), EngineError> {
        let line = format!("{command}\n");
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<Response, EngineError> {
        match self.stdout.next_line().await? {
            Some(line) => Ok(parse_line(&line)),
            None => Err(EngineError::Exited),
        }
    }

    async fn wait_for(&mut self, want: impl Fn(&Response) -> bool) -> Result<(), EngineError> {
        loop {
            if want(&self.read_response().await?) {
                return Ok(());
            }
        }
    }

    async fn search(&mut self, request: &EvalRequest) -> Result<Score, EngineError> {
        self.send(&Command::Position {
            fen: request.position.to_fen(),
            moves: request.played.iter().cloned().collect(),
        })
        .await?;
        self.send(&Command::Go {
            depth: request.depth,
        })
        .await?;

        let mut state = SearchState::default();
        let best = loop {
            match self.read_response().await? {
                Response::Info(info) => state.update(info),
                Response::BestMove(mv) => break mv,
                _ => {}
            }
        };

        let depth = state.depth.unwrap_or(request.depth);
        let score = match state.score {
            Some(EngineScore::Cp(cp)) => Score::centipawns(cp, depth),
            Some(EngineScore::Mate(n)) => Score::mate_in(n, depth),
            None => return Err(EngineError::Protocol("bestmove without a score".into())),
        };
        let score = match best.or(state.pv_head) {
            Some(mv) => score.with_best_move(mv),
            None => score,
        };

        // After the played move the engine scores the opponent's position.
        Ok(if request.played.is_some() {
            score.negated()
        } else {
            score
        })
    }
}

#[async_trait]
impl EngineSession for UciEngine {
    async fn evaluate(&mut self, request: &EvalRequest) -> Result<Score, EngineError> {
        let limit = self.search_timeout;
        timeout(limit, self.search(request))
            .await
            .map_err(|_| EngineError::Timeout(limit))?
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.send(&Command::Quit).await {
            debug!(worker = self.worker, error = %e, "quit not delivered");
        }
        match timeout(QUIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(worker = self.worker, %status, "engine exited"),
            Ok(Err(e)) => warn!(worker = self.worker, error = %e, "waiting for engine failed"),
            Err(_) => {
                warn!(worker = self.worker, "engine ignored quit, killing");
                if let Err(e) = self.child.kill().await {
                    warn!(worker = self.worker, error = %e, "kill failed");
                }
            }
        }
    }
}

/// Spawns [`UciEngine`] sessions from fixed options.
#[derive(Debug, Clone)]
pub struct UciEngineFactory {
    options: EngineOptions,
}

impl UciEngineFactory {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl EngineFactory for UciEngineFactory {
    async fn spawn(&self, worker: usize) -> Result<Box<dyn EngineSession>, EngineError> {
        let engine = UciEngine::spawn(&self.options, worker).await?;
        Ok(Box::new(engine))
    }
}
