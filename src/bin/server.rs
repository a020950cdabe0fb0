//! Habit Sync Server
//!
//! Serves the habit sync procedures over HTTP.
//!
//! # Configuration
//!
//! Environment variables:
//! - `HABIT_SYNC_PORT`: Port to listen on (default: 8080)
//! - `HABIT_SYNC_DATA_DIR`: Directory to store documents (default: ~/.local/share/habit-sync)
//! - `HABIT_SYNC_STORE`: `file` or `memory` (default: file)
//! - `HABIT_SYNC_CONFIG`: Path to config file (default: ~/.config/habit-sync/config.yaml)
//!
//! # Config File Format
//!
//! ```yaml
//! port: 8080
//! store_backend: file
//! api_keys:
//!   - key: "your-secret-key-here"
//!     user_id: "user1"
//! ```
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `POST /rpc/{procedure}`: Call a procedure with a JSON argument object

use axum::Router;
use habit_sync::server::{router, ApiKeyStore, DocumentStore};
use habit_sync::{Config, FileStore, HabitSyncService, MemoryStore, StoreBackend};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn build_app<S: DocumentStore>(store: S, api_keys: Arc<ApiKeyStore>) -> Router {
    router(Arc::new(HabitSyncService::new(store)), api_keys)
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "habit_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::load(None) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let api_keys = Arc::new(ApiKeyStore::from_entries(&config.api_keys));

    let app = match config.store_backend {
        StoreBackend::File => {
            // Ensure data directory exists
            if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
                tracing::error!("Failed to create data directory: {}", e);
                std::process::exit(1);
            }
            tracing::info!("Data directory: {}", config.data_dir.display());
            build_app(FileStore::new(&config.data_dir), api_keys)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            build_app(MemoryStore::new(), api_keys)
        }
    };

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
