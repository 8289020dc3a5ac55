//! Supervised pool of engine workers.
//!
//! Each worker owns exactly one [`EngineSession`] and pulls jobs from a shared
//! bounded queue, so at most `workers` requests are in flight at any time.
//! A worker whose engine fails is restarted with a fresh session and retries
//! the same request until `max_attempts` is reached; the request then resolves
//! to an [`EvalFailure`] while the rest of the batch carries on.
//!
//! Worker states:
//!
//! ```text
//! Idle ──job──▶ Busy ──ok──▶ Idle
//!                │
//!              error
//!                ▼
//!           Restarting ──fresh session──▶ Busy (same job)
//!
//! queue closed and drained ──▶ Terminated
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use bookleak_core::{EvalRequest, Score};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session::{EngineError, EngineFactory, EngineSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Busy,
    Restarting,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of engine processes.
    pub workers: usize,
    /// Tries per request, counting the first one.
    pub max_attempts: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_attempts: 3,
        }
    }
}

/// A request that kept failing after every retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("evaluation failed after {attempts} attempt(s): {reason}")]
pub struct EvalFailure {
    pub attempts: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("engine pool is closed")]
pub struct PoolClosed;

type Reply = (usize, Result<Score, EvalFailure>);

struct Job {
    index: usize,
    request: EvalRequest,
    reply: mpsc::UnboundedSender<Reply>,
}

struct Shared {
    states: RwLock<Vec<WorkerState>>,
    restarts: AtomicUsize,
}

impl Shared {
    fn set(&self, worker: usize, state: WorkerState) {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = states.get_mut(worker) {
            *slot = state;
        }
    }
}

/// Fixed-size pool of supervised engine workers.
pub struct EnginePool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<Shared>,
    size: usize,
}

impl EnginePool {
    /// Spawn every worker's engine up front.
    ///
    /// If any engine cannot start, the ones already started are shut down and
    /// the error is returned.
    pub async fn start(
        factory: Arc<dyn EngineFactory>,
        config: PoolConfig,
    ) -> Result<Self, EngineError> {
        let size = config.workers.max(1);
        let max_attempts = config.max_attempts.max(1);

        let mut sessions: Vec<Box<dyn EngineSession>> = Vec::with_capacity(size);
        for worker in 0..size {
            match factory.spawn(worker).await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!(worker, error = %e, "engine failed to start");
                    for mut session in sessions {
                        session.shutdown().await;
                    }
                    return Err(e);
                }
            }
        }

        let (sender, receiver) = mpsc::channel::<Job>(size);
        let queue = Arc::new(tokio::sync::Mutex::new(receiver));
        let shared = Arc::new(Shared {
            states: RwLock::new(vec![WorkerState::Idle; size]),
            restarts: AtomicUsize::new(0),
        });

        let handles = sessions
            .into_iter()
            .enumerate()
            .map(|(id, session)| {
                let worker = Worker {
                    id,
                    session: Some(session),
                    factory: factory.clone(),
                    shared: shared.clone(),
                    max_attempts,
                };
                tokio::spawn(worker.run(queue.clone()))
            })
            .collect();

        info!(workers = size, max_attempts, "engine pool started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: tokio::sync::Mutex::new(handles),
            shared,
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Current state of every worker, by worker index.
    pub fn states(&self) -> Vec<WorkerState> {
        self.shared
            .states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of engine restarts since the pool started.
    pub fn restarts(&self) -> usize {
        self.shared.restarts.load(Ordering::Relaxed)
    }

    fn sender(&self) -> Result<mpsc::Sender<Job>, PoolClosed> {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(PoolClosed)
    }

    /// Evaluate a batch, returning one result per request in input order.
    ///
    /// A request that exhausts its retries yields `Err(EvalFailure)` in its
    /// slot; it does not fail the batch.
    pub async fn evaluate_many(
        &self,
        requests: &[EvalRequest],
    ) -> Result<Vec<Result<Score, EvalFailure>>, PoolClosed> {
        let sender = self.sender()?;
        let (reply, mut replies) = mpsc::unbounded_channel::<Reply>();
        debug!(requests = requests.len(), "dispatching batch");

        for (index, request) in requests.iter().enumerate() {
            let job = Job {
                index,
                request: request.clone(),
                reply: reply.clone(),
            };
            sender.send(job).await.map_err(|_| PoolClosed)?;
        }
        drop(reply);
        drop(sender);

        let mut results: Vec<Option<Result<Score, EvalFailure>>> = vec![None; requests.len()];
        while let Some((index, result)) = replies.recv().await {
            if let Some(slot) = results.get_mut(index) {
                *slot = Some(result);
            }
        }

        Ok(results
            .into_iter()
            .map(|r| {
                r.unwrap_or_else(|| {
                    Err(EvalFailure {
                        attempts: 0,
                        reason: "worker stopped before answering".into(),
                    })
                })
            })
            .collect())
    }

    /// Stop accepting new batches. Queued work still runs.
    pub fn close(&self) {
        if self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
        {
            info!("engine pool closed");
        }
    }

    /// Close, let workers drain the queue, and wait until every engine has
    /// been shut down.
    pub async fn shutdown(&self) {
        self.close();
        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "engine worker panicked");
            }
        }
        info!(restarts = self.restarts(), "engine pool shut down");
    }
}

struct Worker {
    id: usize,
    session: Option<Box<dyn EngineSession>>,
    factory: Arc<dyn EngineFactory>,
    shared: Arc<Shared>,
    max_attempts: u32,
}

impl Worker {
    async fn run(mut self, queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>) {
        loop {
            self.shared.set(self.id, WorkerState::Idle);
            let job = queue.lock().await.recv().await;
            let Some(job) = job else {
                break;
            };
            self.shared.set(self.id, WorkerState::Busy);
            let result = self.evaluate(&job.request).await;
            // The caller may have gone away; nothing to do then.
            let _ = job.reply.send((job.index, result));
        }

        if let Some(mut session) = self.session.take() {
            session.shutdown().await;
        }
        self.shared.set(self.id, WorkerState::Terminated);
        debug!(worker = self.id, "engine worker terminated");
    }

    async fn evaluate(&mut self, request: &EvalRequest) -> Result<Score, EvalFailure> {
        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            if self.session.is_none() {
                self.shared.set(self.id, WorkerState::Restarting);
                match self.factory.spawn(self.id).await {
                    Ok(session) => {
                        self.shared.restarts.fetch_add(1, Ordering::Relaxed);
                        info!(worker = self.id, attempt, "engine restarted");
                        self.session = Some(session);
                        self.shared.set(self.id, WorkerState::Busy);
                    }
                    Err(e) => {
                        warn!(worker = self.id, attempt, error = %e, "engine restart failed");
                        last_error = e.to_string();
                        continue;
                    }
                }
            }

            let Some(session) = self.session.as_mut() else {
                continue;
            };
            match session.evaluate(request).await {
                Ok(score) => return Ok(score),
                Err(e) => {
                    warn!(
                        worker = self.id,
                        attempt,
                        position = %request.position,
                        error = %e,
                        "engine request failed"
                    );
                    last_error = e.to_string();
                    self.shared.set(self.id, WorkerState::Restarting);
                    if let Some(mut broken) = self.session.take() {
                        broken.shutdown().await;
                    }
                }
            }
        }

        Err(EvalFailure {
            attempts: self.max_attempts,
            reason: last_error,
        })
    }
}
