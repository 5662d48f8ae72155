//! Statistics API endpoints.

use axum::extract::State;

use super::{success, ApiResult};
use crate::stats::{self, DashboardStats};
use crate::AppState;

/// GET /api/stats - Dashboard statistics computed from the current
/// snapshot.
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let snapshot = state.sync.snapshot();
    success(stats::compute(&snapshot), snapshot.revision)
}
