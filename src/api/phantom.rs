use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::services::SyncReport;

/// POST /phantom/sync/abonados-olt
///
/// Runs the subscriber sync inline and returns its counts.
pub async fn sync_subscribers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let report = state.sync().sync_subscribers().await?;
    Ok(Json(ApiResponse::success(report)))
}
