//! Storage layer: the `Storage` capability, in-memory and DuckDB backends,
//! and the daily pick cache built on top of them.

mod error;
pub use error::StoreError;

mod storage;
pub use storage::Storage;

mod memory;
pub use memory::MemoryStore;

pub mod daily;
pub use daily::daily_picks;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::{DuckStore, Table};
