//! Raw storage message bridge.
//!
//! Exposes the storage worker's message contract over HTTP for the desktop
//! shell. Failures travel inside the response body as an ERROR action, so
//! the endpoint itself always answers 200.

use axum::extract::State;
use axum::Json;

use crate::worker::{StorageRequest, StorageResponse};
use crate::AppState;

/// POST /api/storage/message - Relay a raw storage request to the worker.
pub async fn storage_message(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Json<StorageResponse> {
    let request: StorageRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(e) => {
            return Json(StorageResponse::error(format!(
                "Unrecognized storage request: {}",
                e
            )))
        }
    };

    match state.facade.dispatch(request).await {
        Ok(response) => Json(response),
        Err(e) => Json(StorageResponse::error(e.to_string())),
    }
}
