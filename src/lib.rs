//! Walletdash - wallet dashboard backend
//!
//! Data layer for a browser wallet dashboard:
//! - a GraphQL client that walks an ordered endpoint list until one answers,
//! - a time-windowed cache in front of it that falls back to stale data,
//! - a per-account, per-chain transaction history persisted to key-value storage.
//!
//! ## Usage
//!
//! For native builds (CLI host over SQLite):
//! ```bash
//! cargo build --features native
//! ```
//!
//! For web builds (exports over `window.localStorage`):
//! ```bash
//! cargo build --target wasm32-unknown-unknown --no-default-features --features web
//! ```

// Fetching
pub mod cache;
pub mod graph;
pub mod market;
pub mod price;

// History
pub mod events;
pub mod history;
pub mod storage;

pub mod chains;
pub mod config;
pub mod format;

// Platform abstraction layer
pub mod platform;

// WASM-facing exports (JS -> Rust) are only built on wasm32.
#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub mod wasm_api;

// Re-export commonly used types
pub use cache::{CacheOutcome, CachedQuery};
pub use config::Config;
pub use graph::{fetch_with_fallback, AggregateFetchFailure, GraphClient, HttpTransport};
pub use history::{HistoryRecord, HistoryStore, TxStatus};
pub use storage::{KeyValueStore, MemoryStore};
