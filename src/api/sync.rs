//! Sync status and refresh endpoints.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::sync::DataSyncStore;
use crate::AppState;

/// Snapshot-level sync state reported to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub loading: bool,
    pub sync_version: i64,
    pub revision_id: i64,
    pub staff_count: usize,
    pub theme_count: usize,
    pub evaluation_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<String>,
}

fn status_of(sync: &DataSyncStore) -> SyncStatus {
    let snapshot = sync.snapshot();
    SyncStatus {
        loading: sync.is_loading(),
        sync_version: sync.sync_version(),
        revision_id: snapshot.revision,
        staff_count: snapshot.staff.len(),
        theme_count: snapshot.themes.len(),
        evaluation_count: snapshot.evaluations.len(),
        refreshed_at: snapshot.refreshed_at,
    }
}

/// GET /api/sync/status - Current snapshot state.
pub async fn sync_status(State(state): State<AppState>) -> ApiResult<SyncStatus> {
    let status = status_of(&state.sync);
    let revision_id = status.revision_id;
    success(status, revision_id)
}

/// POST /api/sync/refresh - Force a visible resynchronize and wait for the
/// follow-up refresh to land.
pub async fn sync_refresh(State(state): State<AppState>) -> ApiResult<SyncStatus> {
    state.sync.force_refresh().await;

    let status = status_of(&state.sync);
    let revision_id = status.revision_id;
    success(status, revision_id)
}
