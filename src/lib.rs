//! Habit Sync
//!
//! Authenticated remote procedures that keep per-user habit-tracking records
//! in a hierarchical document store and derive summary statistics from them.

pub mod config;
pub mod error;
pub mod models;
pub mod server;

pub use config::{ApiKeyEntry, Config, ConfigError, StoreBackend};
pub use error::{ErrorKind, RpcError};
pub use server::{
    ApiKeyStore, Caller, DocumentStore, FileStore, HabitSyncService, MemoryStore, StoreError,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
