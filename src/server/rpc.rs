//! HTTP transport for the procedures.
//!
//! `POST /rpc/{procedure}` takes the argument object as a JSON body and
//! answers with the procedure's JSON result, or with
//! `{"error": {"kind", "message"}}` and a matching status code.

use axum::{
    body::to_bytes,
    extract::{Path, Request, State},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::auth::{resolve_caller, ApiKeyStore, Caller};
use super::service::{authorize, HabitSyncService};
use super::storage::DocumentStore;
use crate::error::RpcError;

/// Request bodies beyond this size are rejected.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// A remotely callable procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    SyncHabitData,
    LoadHabitData,
    GetHistoricalData,
    GenerateAnalytics,
    BackupData,
    RestoreData,
    ShareProgress,
    UpdateSettings,
    GetUserSettings,
}

impl Procedure {
    pub const ALL: [Procedure; 9] = [
        Procedure::SyncHabitData,
        Procedure::LoadHabitData,
        Procedure::GetHistoricalData,
        Procedure::GenerateAnalytics,
        Procedure::BackupData,
        Procedure::RestoreData,
        Procedure::ShareProgress,
        Procedure::UpdateSettings,
        Procedure::GetUserSettings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Procedure::SyncHabitData => "syncHabitData",
            Procedure::LoadHabitData => "loadHabitData",
            Procedure::GetHistoricalData => "getHistoricalData",
            Procedure::GenerateAnalytics => "generateAnalytics",
            Procedure::BackupData => "backupData",
            Procedure::RestoreData => "restoreData",
            Procedure::ShareProgress => "shareProgress",
            Procedure::UpdateSettings => "updateSettings",
            Procedure::GetUserSettings => "getUserSettings",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|procedure| procedure.name() == name)
    }
}

/// Builds the application router.
pub fn router<S: DocumentStore>(
    service: Arc<HabitSyncService<S>>,
    api_keys: Arc<ApiKeyStore>,
) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health));

    // Caller identity is resolved for every procedure; each procedure
    // decides what an anonymous call means.
    let rpc_routes = Router::new()
        .route("/rpc/{procedure}", post(call::<S>))
        .with_state(service)
        .layer(middleware::from_fn_with_state(api_keys, resolve_caller));

    Router::new()
        .merge(public_routes)
        .merge(rpc_routes)
        .layer(TraceLayer::new_for_http())
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::version(),
    })
}

async fn call<S: DocumentStore>(
    State(service): State<Arc<HabitSyncService<S>>>,
    Path(procedure): Path<String>,
    request: Request,
) -> Response {
    match dispatch(&service, &procedure, request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(procedure = %procedure, kind = ?err.kind, "Procedure failed");
            err.into_response()
        }
    }
}

async fn dispatch<S: DocumentStore>(
    service: &HabitSyncService<S>,
    name: &str,
    request: Request,
) -> Result<Response, RpcError> {
    let procedure = Procedure::parse(name)
        .ok_or_else(|| RpcError::not_found(format!("Unknown procedure: {}", name)))?;

    // Identity first: an anonymous body is never parsed
    let caller = request
        .extensions()
        .get::<Caller>()
        .cloned()
        .ok_or_else(RpcError::unauthenticated)?;
    let args = read_args(request).await?;
    let caller = Some(&caller);

    // Authorization before typed parsing, so another user's data is refused
    // whatever shape the rest of the body has
    if let Some(user_id) = args.get("userId").and_then(Value::as_str) {
        authorize(caller, user_id)?;
    }

    let response = match procedure {
        Procedure::SyncHabitData => {
            Json(service.sync_habit_data(caller, parse(args)?).await?).into_response()
        }
        Procedure::LoadHabitData => {
            Json(service.load_habit_data(caller, parse(args)?).await?).into_response()
        }
        Procedure::GetHistoricalData => {
            Json(service.get_historical_data(caller, parse(args)?).await?).into_response()
        }
        Procedure::GenerateAnalytics => {
            Json(service.generate_analytics(caller, parse(args)?).await?).into_response()
        }
        Procedure::BackupData => {
            Json(service.backup_data(caller, parse(args)?).await?).into_response()
        }
        Procedure::RestoreData => {
            Json(service.restore_data(caller, parse(args)?).await?).into_response()
        }
        Procedure::ShareProgress => {
            Json(service.share_progress(caller, parse(args)?).await?).into_response()
        }
        Procedure::UpdateSettings => {
            Json(service.update_settings(caller, parse(args)?).await?).into_response()
        }
        Procedure::GetUserSettings => {
            Json(service.get_user_settings(caller, parse(args)?).await?).into_response()
        }
    };
    Ok(response)
}

/// Reads the argument object; an empty body counts as `{}`.
async fn read_args(request: Request) -> Result<Value, RpcError> {
    let bytes = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| RpcError::invalid_argument(format!("Unreadable request body: {}", e)))?;

    if bytes.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| RpcError::invalid_argument(format!("Malformed JSON body: {}", e)))
}

fn parse<T: DeserializeOwned>(args: Value) -> Result<T, RpcError> {
    serde_json::from_value(args).map_err(|e| RpcError::invalid_argument(e.to_string()))
}
