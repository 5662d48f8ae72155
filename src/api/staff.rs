//! Staff API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateStaffRequest, StaffMember, UpdateStaffRequest};
use crate::AppState;

/// GET /api/staff - List all valid staff members.
pub async fn list_staff(State(state): State<AppState>) -> ApiResult<Vec<StaffMember>> {
    let revision_id = state.facade.current_revision();

    match state.facade.get_staff().await {
        Ok(staff) => success(staff, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/staff/{id} - Get a single staff member.
pub async fn get_staff_member(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StaffMember> {
    let revision_id = state.facade.current_revision();

    match state.facade.get_staff_member(id).await {
        Ok(Some(member)) => success(member, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Staff member {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/staff - Create a new staff member.
pub async fn create_staff(
    State(state): State<AppState>,
    Json(request): Json<CreateStaffRequest>,
) -> ApiResult<StaffMember> {
    let revision_id = state.facade.current_revision();

    // Validate required fields
    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return error(
            AppError::Validation("First and last name are required".to_string()),
            revision_id,
        );
    }
    if request.email.trim().is_empty() {
        return error(
            AppError::Validation("Email is required".to_string()),
            revision_id,
        );
    }

    match state.facade.create_staff(&request).await {
        Ok(member) => success(member, state.facade.current_revision()),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/staff/{id} - Update a staff member.
pub async fn update_staff(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStaffRequest>,
) -> ApiResult<StaffMember> {
    let revision_id = state.facade.current_revision();

    // Required fields may be omitted but never blanked
    if request.first_name.as_ref().is_some_and(|v| v.trim().is_empty())
        || request.last_name.as_ref().is_some_and(|v| v.trim().is_empty())
    {
        return error(
            AppError::Validation("First and last name cannot be blank".to_string()),
            revision_id,
        );
    }
    if request.email.as_ref().is_some_and(|v| v.trim().is_empty()) {
        return error(
            AppError::Validation("Email cannot be blank".to_string()),
            revision_id,
        );
    }

    match state.facade.update_staff(id, &request).await {
        Ok(member) => success(member, state.facade.current_revision()),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/staff/{id} - Delete a staff member and cascade their
/// evaluations.
pub async fn delete_staff(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    let revision_id = state.facade.current_revision();

    match state.facade.delete_staff(id).await {
        Ok(0) => error(
            AppError::NotFound(format!("Staff member {} not found", id)),
            revision_id,
        ),
        Ok(_) => success((), state.facade.current_revision()),
        Err(e) => error(e, revision_id),
    }
}
