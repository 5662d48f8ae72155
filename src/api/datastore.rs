//! Datastore API endpoints.

use axum::extract::State;
use axum::Json;

use super::{error, success, ApiResult};
use crate::models::{DatastoreExport, DatastoreImport, RevisionInfo};
use crate::AppState;

/// GET /api/datastore - Export the full datastore as raw records.
pub async fn get_datastore(State(state): State<AppState>) -> ApiResult<DatastoreExport> {
    match state.facade.export_datastore().await {
        Ok(export) => {
            let revision_id = export.revision_id;
            success(export, revision_id)
        }
        Err(e) => error(e, state.facade.current_revision()),
    }
}

/// PUT /api/datastore - Restore collections from an exported image.
/// Collections absent from the body are left untouched.
pub async fn put_datastore(
    State(state): State<AppState>,
    Json(import): Json<DatastoreImport>,
) -> ApiResult<RevisionInfo> {
    let revision_id = state.facade.current_revision();

    if let Err(e) = state.facade.import_datastore(&import).await {
        return error(e, revision_id);
    }

    match state.facade.revision_info().await {
        Ok(info) => {
            let revision_id = info.revision_id;
            success(info, revision_id)
        }
        Err(e) => error(e, state.facade.current_revision()),
    }
}

/// GET /api/datastore/revision - Get the current revision info.
pub async fn get_revision(State(state): State<AppState>) -> ApiResult<RevisionInfo> {
    match state.facade.revision_info().await {
        Ok(info) => {
            let revision_id = info.revision_id;
            success(info, revision_id)
        }
        Err(e) => error(e, state.facade.current_revision()),
    }
}
