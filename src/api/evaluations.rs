//! Evaluation API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateEvaluationRequest, Evaluation, UpdateEvaluationRequest};
use crate::AppState;

/// GET /api/evaluations - List all evaluations.
pub async fn list_evaluations(State(state): State<AppState>) -> ApiResult<Vec<Evaluation>> {
    let revision_id = state.facade.current_revision();

    match state.facade.get_evaluations().await {
        Ok(evaluations) => success(evaluations, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/evaluations/{id} - Get a single evaluation.
pub async fn get_evaluation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Evaluation> {
    let revision_id = state.facade.current_revision();

    match state.facade.get_evaluation(id).await {
        Ok(Some(evaluation)) => success(evaluation, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Evaluation {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/evaluations - Create a new evaluation.
pub async fn create_evaluation(
    State(state): State<AppState>,
    Json(request): Json<CreateEvaluationRequest>,
) -> ApiResult<Evaluation> {
    let revision_id = state.facade.current_revision();

    if request.formation_theme.trim().is_empty() {
        return error(
            AppError::Validation("Formation theme is required".to_string()),
            revision_id,
        );
    }

    match state.facade.create_evaluation(&request).await {
        Ok(evaluation) => success(evaluation, state.facade.current_revision()),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/evaluations/{id} - Update an evaluation.
pub async fn update_evaluation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateEvaluationRequest>,
) -> ApiResult<Evaluation> {
    let revision_id = state.facade.current_revision();

    if request.formation_theme.as_ref().is_some_and(|v| v.trim().is_empty()) {
        return error(
            AppError::Validation("Formation theme cannot be blank".to_string()),
            revision_id,
        );
    }

    match state.facade.update_evaluation(id, &request).await {
        Ok(evaluation) => success(evaluation, state.facade.current_revision()),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/evaluations/{id} - Delete an evaluation.
pub async fn delete_evaluation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    let revision_id = state.facade.current_revision();

    match state.facade.delete_evaluation(id).await {
        Ok(0) => error(
            AppError::NotFound(format!("Evaluation {} not found", id)),
            revision_id,
        ),
        Ok(_) => success((), state.facade.current_revision()),
        Err(e) => error(e, revision_id),
    }
}
