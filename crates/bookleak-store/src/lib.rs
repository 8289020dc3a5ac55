//! Storage layer: evaluation/archive caches and report export.

mod error;
pub use error::StoreError;

mod memory;
pub use memory::MemoryCache;

mod export;
pub use export::{read_parquet, write_parquet};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckCache;
