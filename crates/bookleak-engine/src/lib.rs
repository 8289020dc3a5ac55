//! UCI engine plumbing: protocol codec, process sessions, and the supervised
//! worker pool that evaluates deviations.

pub mod pool;
pub mod process;
pub mod session;
pub mod uci;

pub use pool::{EnginePool, EvalFailure, PoolClosed, PoolConfig, WorkerState};
pub use process::{EngineOptions, UciEngine, UciEngineFactory};
pub use session::{EngineError, EngineFactory, EngineSession};
