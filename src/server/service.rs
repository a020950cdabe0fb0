//! The habit sync procedures.
//!
//! Every procedure follows the same path: authenticate the caller, check the
//! caller addresses its own data, validate the arguments, then perform one
//! or two document operations. Store failures are logged here and surface
//! to the caller only as a fixed [`ErrorKind::Internal`] message.
//!
//! [`ErrorKind::Internal`]: crate::error::ErrorKind::Internal

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;

use super::auth::Caller;
use super::ids;
use super::storage::{
    field_order, from_document, lookup_field, to_document, CollectionPath, DocPath, Document,
    DocumentStore, StoreError, WriteMode,
};
use crate::error::RpcError;
use crate::models::{
    Analytics, CallerTimestamp, Clock, Habit, HabitState, KeyPart, MonthKey, MonthRecord,
    MonthSnapshot, ShareOptions, ShareRecord, Stats, SystemClock, TimestampError,
};

const USERS: &str = "users";
const MONTHS: &str = "months";
const BACKUPS: &str = "backups";
const SHARED_PROGRESS: &str = "shared_progress";

const YEAR_FIELD: &str = "habitState.year";
const MONTH_FIELD: &str = "habitState.month";

const DEFAULT_HISTORY_MONTHS: usize = 12;

const NO_MONTH_DATA: &str = "No data found for specified month";

fn user_path(user_id: &str) -> Result<DocPath, StoreError> {
    CollectionPath::root(USERS)?.doc(user_id)
}

fn months_collection(user_id: &str) -> Result<CollectionPath, StoreError> {
    user_path(user_id)?.collection(MONTHS)
}

fn month_path(user_id: &str, key: &MonthKey) -> Result<DocPath, StoreError> {
    months_collection(user_id)?.doc(key.as_str())
}

fn backup_path(user_id: &str, backup_id: &str) -> Result<DocPath, StoreError> {
    user_path(user_id)?.collection(BACKUPS)?.doc(backup_id)
}

fn share_path(share_id: &str) -> Result<DocPath, StoreError> {
    CollectionPath::root(SHARED_PROGRESS)?.doc(share_id)
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncHabitDataRequest {
    pub user_id: String,
    pub habit_state: HabitState,
    pub habits: Vec<Habit>,
    pub stats: Stats,
    pub timestamp: CallerTimestamp,
}

/// Addresses one month of one user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRequest {
    pub user_id: String,
    pub year: KeyPart,
    pub month: KeyPart,
}

impl MonthRequest {
    pub fn month_key(&self) -> MonthKey {
        MonthKey::new(&self.year, &self.month)
    }
}

fn default_history_months() -> usize {
    DEFAULT_HISTORY_MONTHS
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDataRequest {
    pub user_id: String,
    #[serde(default = "default_history_months")]
    pub limit_months: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDataRequest {
    pub user_id: String,
    pub data: MonthSnapshot,
    pub timestamp: CallerTimestamp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreDataRequest {
    pub user_id: String,
    pub backup_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareProgressRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub options: ShareOptions,
    pub timestamp: CallerTimestamp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub user_id: String,
    pub settings: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub user_id: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    fn new(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadHabitDataResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDataResponse {
    /// Stored month documents, each with its document id under `id`.
    pub historical_data: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsResponse {
    pub analytics: Analytics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDataResponse {
    pub backup_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareProgressResponse {
    pub share_id: String,
    pub shareable_data: ShareRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsResponse {
    pub settings: Map<String, Value>,
}

// ============================================================================
// Stored documents
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupRecord {
    data: MonthSnapshot,
    timestamp: DateTime<Utc>,
    backup_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsPatch {
    settings: Map<String, Value>,
    updated_at: DateTime<Utc>,
}

// ============================================================================
// Error helpers
// ============================================================================

/// Requires a verified caller whose identity matches `user_id`.
pub fn authorize<'a>(caller: Option<&'a Caller>, user_id: &str) -> Result<&'a Caller, RpcError> {
    let caller = caller.ok_or_else(RpcError::unauthenticated)?;
    if caller.uid != user_id {
        tracing::warn!(caller = %caller.uid, user_id = %user_id, "Caller addressed another user's data");
        return Err(RpcError::permission_denied());
    }
    Ok(caller)
}

/// Logs the provider error and hides it behind `message`.
fn internal(message: &'static str) -> impl FnOnce(StoreError) -> RpcError {
    move |e| {
        tracing::error!(error = %e, "{}", message);
        RpcError::internal(message)
    }
}

fn invalid_path(e: StoreError) -> RpcError {
    RpcError::invalid_argument(e.to_string())
}

fn invalid_timestamp(e: TimestampError) -> RpcError {
    RpcError::invalid_argument(e.to_string())
}

fn compare_field(a: &Document, b: &Document, field: &str) -> Ordering {
    match (lookup_field(a, field), lookup_field(b, field)) {
        (Some(a), Some(b)) => field_order(a, b),
        _ => Ordering::Equal,
    }
}

// ============================================================================
// Service
// ============================================================================

/// Stateless procedures over a shared document store and server clock.
pub struct HabitSyncService<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: DocumentStore> HabitSyncService<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn read_month(
        &self,
        path: &DocPath,
        failure: &'static str,
    ) -> Result<Option<MonthRecord>, RpcError> {
        let Some(document) = self.store.get(path).await.map_err(internal(failure))? else {
            return Ok(None);
        };
        from_document(path, document)
            .map(Some)
            .map_err(internal(failure))
    }

    /// Merge-writes the month record with a caller-supplied `lastUpdated`.
    pub async fn sync_habit_data(
        &self,
        caller: Option<&Caller>,
        request: SyncHabitDataRequest,
    ) -> Result<SuccessResponse, RpcError> {
        const FAILURE: &str = "Error syncing data to cloud";

        authorize(caller, &request.user_id)?;
        let last_updated = request.timestamp.resolve().map_err(invalid_timestamp)?;
        let key = request.habit_state.month_key();
        let path = month_path(&request.user_id, &key).map_err(invalid_path)?;

        let record = MonthRecord {
            habit_state: Some(request.habit_state),
            habits: Some(request.habits),
            stats: Some(request.stats),
            last_updated: Some(last_updated),
            ..Default::default()
        };
        let document = to_document(&record).map_err(internal(FAILURE))?;
        self.store
            .set(&path, document, WriteMode::Merge)
            .await
            .map_err(internal(FAILURE))?;

        tracing::info!(user_id = %request.user_id, month = %key, "Synced habit data");
        Ok(SuccessResponse::new("Data synced successfully"))
    }

    pub async fn load_habit_data(
        &self,
        caller: Option<&Caller>,
        request: MonthRequest,
    ) -> Result<LoadHabitDataResponse, RpcError> {
        authorize(caller, &request.user_id)?;
        let path = month_path(&request.user_id, &request.month_key()).map_err(invalid_path)?;

        let data = self
            .store
            .get(&path)
            .await
            .map_err(internal("Error loading data from cloud"))?;

        Ok(LoadHabitDataResponse {
            exists: data.is_some(),
            data,
        })
    }

    /// Newest months first, ordered by `habitState.year` then
    /// `habitState.month`. Records missing either field are not listed.
    pub async fn get_historical_data(
        &self,
        caller: Option<&Caller>,
        request: HistoricalDataRequest,
    ) -> Result<HistoricalDataResponse, RpcError> {
        authorize(caller, &request.user_id)?;
        let collection = months_collection(&request.user_id).map_err(invalid_path)?;

        let mut documents: Vec<(String, Document)> = self
            .store
            .list(&collection)
            .await
            .map_err(internal("Error retrieving historical data"))?
            .into_iter()
            .filter(|(_, document)| {
                lookup_field(document, YEAR_FIELD).is_some()
                    && lookup_field(document, MONTH_FIELD).is_some()
            })
            .collect();

        documents.sort_by(|(a_id, a), (b_id, b)| {
            compare_field(b, a, YEAR_FIELD)
                .then_with(|| compare_field(b, a, MONTH_FIELD))
                .then_with(|| b_id.cmp(a_id))
        });

        let historical_data = documents
            .into_iter()
            .take(request.limit_months)
            .map(|(id, document)| {
                let mut entry = Document::new();
                entry.insert("id".to_string(), Value::String(id));
                entry.extend(document);
                entry
            })
            .collect();

        Ok(HistoricalDataResponse { historical_data })
    }

    pub async fn generate_analytics(
        &self,
        caller: Option<&Caller>,
        request: MonthRequest,
    ) -> Result<AnalyticsResponse, RpcError> {
        authorize(caller, &request.user_id)?;
        let path = month_path(&request.user_id, &request.month_key()).map_err(invalid_path)?;

        let record = self
            .read_month(&path, "Error generating analytics report")
            .await?
            .ok_or_else(|| RpcError::not_found(NO_MONTH_DATA))?;

        Ok(AnalyticsResponse {
            analytics: Analytics::compute(&record, self.clock.now()),
        })
    }

    pub async fn backup_data(
        &self,
        caller: Option<&Caller>,
        request: BackupDataRequest,
    ) -> Result<BackupDataResponse, RpcError> {
        const FAILURE: &str = "Error creating backup";

        authorize(caller, &request.user_id)?;
        let timestamp = request.timestamp.resolve().map_err(invalid_timestamp)?;
        // A snapshot whose month cannot be addressed could never be restored
        month_path(&request.user_id, &request.data.habit_state.month_key())
            .map_err(invalid_path)?;

        let backup_id = ids::new_backup_id();
        let path = backup_path(&request.user_id, &backup_id).map_err(internal(FAILURE))?;
        let record = BackupRecord {
            data: request.data,
            timestamp,
            backup_id: backup_id.clone(),
        };
        let document = to_document(&record).map_err(internal(FAILURE))?;
        self.store
            .set(&path, document, WriteMode::Overwrite)
            .await
            .map_err(internal(FAILURE))?;

        tracing::info!(user_id = %request.user_id, backup_id = %backup_id, "Created backup");
        Ok(BackupDataResponse {
            backup_id,
            message: "Backup created successfully".to_string(),
        })
    }

    /// Replaces the whole month record with the backup's snapshot; fields
    /// not in the snapshot, such as `lastUpdated`, are dropped.
    pub async fn restore_data(
        &self,
        caller: Option<&Caller>,
        request: RestoreDataRequest,
    ) -> Result<MessageResponse, RpcError> {
        const FAILURE: &str = "Error restoring data";

        authorize(caller, &request.user_id)?;
        let path = backup_path(&request.user_id, &request.backup_id).map_err(invalid_path)?;

        let document = self
            .store
            .get(&path)
            .await
            .map_err(internal(FAILURE))?
            .ok_or_else(|| RpcError::not_found("Backup not found"))?;
        let backup: BackupRecord = from_document(&path, document).map_err(internal(FAILURE))?;

        let MonthSnapshot {
            habit_state,
            habits,
            stats,
            ..
        } = backup.data;
        let key = habit_state.month_key();
        let month = month_path(&request.user_id, &key).map_err(internal(FAILURE))?;

        let record = MonthRecord {
            habit_state: Some(habit_state),
            habits: Some(habits),
            stats: Some(stats),
            restored_at: Some(self.clock.now()),
            ..Default::default()
        };
        let document = to_document(&record).map_err(internal(FAILURE))?;
        self.store
            .set(&month, document, WriteMode::Overwrite)
            .await
            .map_err(internal(FAILURE))?;

        tracing::info!(
            user_id = %request.user_id,
            backup_id = %request.backup_id,
            month = %key,
            "Restored backup"
        );
        Ok(MessageResponse {
            message: "Data restored successfully".to_string(),
        })
    }

    pub async fn share_progress(
        &self,
        caller: Option<&Caller>,
        request: ShareProgressRequest,
    ) -> Result<ShareProgressResponse, RpcError> {
        const FAILURE: &str = "Error sharing progress";

        let caller = authorize(caller, &request.user_id)?;
        let shared_at = request.timestamp.resolve().map_err(invalid_timestamp)?;
        let key = MonthKey::new(&request.options.year, &request.options.month);
        let path = month_path(&request.user_id, &key).map_err(invalid_path)?;

        let record = self
            .read_month(&path, FAILURE)
            .await?
            .ok_or_else(|| RpcError::not_found(NO_MONTH_DATA))?;
        let shareable_data = ShareRecord::build(&caller.uid, &request.options, &record, shared_at);

        let share_id = ids::new_share_id();
        let path = share_path(&share_id).map_err(internal(FAILURE))?;
        let document = to_document(&shareable_data).map_err(internal(FAILURE))?;
        self.store
            .set(&path, document, WriteMode::Overwrite)
            .await
            .map_err(internal(FAILURE))?;

        tracing::info!(user_id = %caller.uid, share_id = %share_id, "Shared progress");
        Ok(ShareProgressResponse {
            share_id,
            shareable_data,
        })
    }

    /// Merge-writes settings; keys not mentioned keep their stored values.
    pub async fn update_settings(
        &self,
        caller: Option<&Caller>,
        request: UpdateSettingsRequest,
    ) -> Result<SuccessResponse, RpcError> {
        const FAILURE: &str = "Error updating settings";

        authorize(caller, &request.user_id)?;
        let path = user_path(&request.user_id).map_err(invalid_path)?;

        let patch = SettingsPatch {
            settings: request.settings,
            updated_at: self.clock.now(),
        };
        let document = to_document(&patch).map_err(internal(FAILURE))?;
        self.store
            .set(&path, document, WriteMode::Merge)
            .await
            .map_err(internal(FAILURE))?;

        Ok(SuccessResponse::new("Settings updated successfully"))
    }

    pub async fn get_user_settings(
        &self,
        caller: Option<&Caller>,
        request: UserRequest,
    ) -> Result<SettingsResponse, RpcError> {
        authorize(caller, &request.user_id)?;
        let path = user_path(&request.user_id).map_err(invalid_path)?;

        let document = self
            .store
            .get(&path)
            .await
            .map_err(internal("Error retrieving user settings"))?;

        let settings = match document.and_then(|mut document| document.remove("settings")) {
            Some(Value::Object(settings)) => settings,
            _ => Map::new(),
        };
        Ok(SettingsResponse { settings })
    }
}
