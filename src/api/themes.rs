//! Theme API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateThemeRequest, Theme, UpdateThemeRequest};
use crate::AppState;

/// GET /api/themes - List all themes.
pub async fn list_themes(State(state): State<AppState>) -> ApiResult<Vec<Theme>> {
    let revision_id = state.facade.current_revision();

    match state.facade.get_themes().await {
        Ok(themes) => success(themes, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/themes - Create a new theme.
pub async fn create_theme(
    State(state): State<AppState>,
    Json(request): Json<CreateThemeRequest>,
) -> ApiResult<Theme> {
    let revision_id = state.facade.current_revision();

    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Theme name is required".to_string()),
            revision_id,
        );
    }

    match state.facade.create_theme(&request).await {
        Ok(theme) => success(theme, state.facade.current_revision()),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/themes/{id} - Update a theme.
pub async fn update_theme(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateThemeRequest>,
) -> ApiResult<Theme> {
    let revision_id = state.facade.current_revision();

    if request.name.as_ref().is_some_and(|v| v.trim().is_empty()) {
        return error(
            AppError::Validation("Theme name cannot be blank".to_string()),
            revision_id,
        );
    }

    match state.facade.update_theme(id, &request).await {
        Ok(theme) => success(theme, state.facade.current_revision()),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/themes/{id} - Delete a theme. Evaluations keep the copied
/// theme name.
pub async fn delete_theme(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    let revision_id = state.facade.current_revision();

    match state.facade.delete_theme(id).await {
        Ok(0) => error(
            AppError::NotFound(format!("Theme {} not found", id)),
            revision_id,
        ),
        Ok(_) => success((), state.facade.current_revision()),
        Err(e) => error(e, revision_id),
    }
}
