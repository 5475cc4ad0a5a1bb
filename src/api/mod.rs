use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Uri},
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::constants::uploads::MULTIPART_OVERHEAD_BYTES;
use crate::db::Store;
use crate::services::{AuthService, ClientService, SyncService};
use crate::state::SharedState;

pub mod auth;
mod clients;
mod error;
mod extract;
mod observability;
mod phantom;
mod types;
mod users;
mod validation;

pub use auth::CurrentUser;
pub use error::ApiError;
pub use extract::ApiJson;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn clients(&self) -> &Arc<dyn ClientService> {
        &self.shared.client_service
    }

    #[must_use]
    pub fn sync(&self) -> &Arc<SyncService> {
        &self.shared.sync_service
    }
}

/// Builds the HTTP state and seeds the initial admin if configured.
pub async fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let seeded = shared
        .auth_service
        .seed_admin(&shared.config.admin_seed)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to seed admin user: {e}"))?;

    if seeded {
        info!("Initial admin account created from configuration");
    }

    Ok(Arc::new(AppState {
        shared,
        prometheus_handle,
    }))
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    create_app_state(shared, prometheus_handle).await
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/login", post(auth::login))
        .fallback(api_not_found)
        .with_state(state.clone());

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let sale_body_limit = state.config().storage.max_receipt_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/clients", get(clients::list_clients))
        .route("/clients/{id}", get(clients::get_client))
        .route("/clients/{id}/status", put(clients::update_status))
        .route(
            "/clients/{id}/sale",
            post(clients::create_sale).layer(DefaultBodyLimit::max(sale_body_limit)),
        )
        .route(
            "/clients/{id}/sale/receipt",
            get(clients::download_receipt),
        )
        .route(
            "/clients/{id}/phone/refresh",
            post(clients::refresh_phone),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            put(users::update_user).delete(users::delete_user),
        )
        .route(
            "/phantom/sync/abonados-olt",
            post(phantom::sync_subscribers),
        )
        .route("/metrics", get(observability::get_metrics))
}

async fn api_not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
