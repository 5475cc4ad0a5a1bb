use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::validate_user_id;
use super::{
    ApiError, ApiJson, ApiResponse, AppState, CreateUserRequest, OkResponse, UpdateUserRequest,
};
use crate::models::{User, UserRole};
use crate::services::require_role;

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    require_role(&current.user, UserRole::Admin)?;

    let users = state.auth().list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

/// POST /users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    require_role(&current.user, UserRole::Admin)?;

    let user = state
        .auth()
        .create_user(&payload.username, &payload.password, payload.role)
        .await?;

    Ok(Json(ApiResponse::success(user)))
}

/// PUT /users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    require_role(&current.user, UserRole::Admin)?;
    let id = validate_user_id(id)?;

    let user = state
        .auth()
        .update_user(id, payload.role, payload.password.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(user)))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<OkResponse>>, ApiError> {
    require_role(&current.user, UserRole::Admin)?;
    let id = validate_user_id(id)?;

    state.auth().delete_user(&current.user, id).await?;
    Ok(Json(ApiResponse::success(OkResponse::ok())))
}
