//! Server-side modules for the habit sync service.

pub mod auth;
pub mod file_store;
pub mod ids;
pub mod memory_store;
pub mod rpc;
pub mod service;
pub mod storage;

pub use auth::{generate_api_key, issue_api_key, ApiKeyStore, Caller};
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use rpc::{router, Procedure};
pub use service::HabitSyncService;
pub use storage::{CollectionPath, DocPath, Document, DocumentStore, StoreError, WriteMode};
