use axum::{
    Extension, Json,
    extract::{Query, Request, State},
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use super::observability::AuthenticatedUser;
use super::{ApiError, ApiJson, ApiResponse, AppState, LoginRequest, LoginResponse, OkResponse};
use crate::models::User;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct AuthQuery {
    pub access_token: Option<String>,
}

/// The authenticated caller, inserted into request extensions by
/// [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

// ============================================================================
// Middleware
// ============================================================================

const LOGIN_PATH: &str = "/api/auth/login";

/// Every `/api` path needs a session except `POST /api/auth/login`.
fn requires_session(method: &Method, path: &str) -> bool {
    let under_api = path == "/api" || path.starts_with("/api/");
    under_api && !(method == Method::POST && path == LOGIN_PATH)
}

/// Authentication middleware that checks:
/// 1. `Authorization: Bearer <token>` header
/// 2. `?access_token=` query parameter
///
/// Runs ahead of routing, so unknown paths and wrong methods are rejected
/// with 401 as well.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !requires_session(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let Some(token) = extract_token(&query, &headers) else {
        return Err(ApiError::Unauthorized("Authentication required".to_string()));
    };

    let Some(user) = state.auth().resolve_user(&token).await? else {
        return Err(ApiError::Unauthorized(
            "Invalid or expired session".to_string(),
        ));
    };

    let user_id = user.id;
    request
        .extensions_mut()
        .insert(CurrentUser { user, token });

    let mut response = next.run(request).await;
    response
        .extensions_mut()
        .insert(AuthenticatedUser(user_id));
    Ok(response)
}

/// Extract the session token from the headers or query params
fn extract_token(query: &AuthQuery, headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some((scheme, token)) = auth_str.trim().split_once(' ')
        && scheme.eq_ignore_ascii_case("bearer")
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }

    query
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let result = state
        .auth()
        .login(&payload.username, &payload.password)
        .await?;

    Ok(Json(ApiResponse::success(LoginResponse {
        token: result.token,
        user: result.user.into(),
    })))
}

/// GET /auth/me
pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<ApiResponse<User>> {
    Json(ApiResponse::success(current.user))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<OkResponse>>, ApiError> {
    state.auth().logout(&current.token).await?;
    tracing::info!(user_id = current.user.id, "User logged out");
    Ok(Json(ApiResponse::success(OkResponse::ok())))
}
