//! Per-request logging and metrics, the Prometheus endpoint and the
//! response headers every API answer carries.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, field, info, info_span};
use uuid::Uuid;

use super::{ApiError, AppState};

/// Set on the response by the auth gate so the request log can name the caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub i32);

/// GET /metrics
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let handle = state
        .prometheus_handle
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Metrics are disabled".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response())
}

/// Collapses numeric segments so `/api/clients/42/sale` is counted as
/// `/api/clients/{id}/sale`.
fn route_label(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Client id for `/api/clients/{id}/...` paths.
fn client_id(path: &str) -> Option<i32> {
    path.strip_prefix("/api/clients/")?
        .split('/')
        .next()?
        .parse()
        .ok()
}

fn outcome(status: StatusCode) -> &'static str {
    if status.is_server_error() {
        "error"
    } else if status.is_client_error() {
        "client_error"
    } else {
        "success"
    }
}

/// Opens a span per request and emits one "request finished" event with the
/// caller, the client touched and the outcome.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let route = route_label(&path);

    let span = info_span!(
        "api_request",
        request_id = %Uuid::new_v4(),
        %method,
        route = %route,
        client_id = client_id(&path),
        user_id = field::Empty,
    );

    async move {
        let response = next.run(req).await;
        let status = response.status();
        let elapsed = start.elapsed();

        let user_id = response
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|user| user.0);
        if let Some(id) = user_id {
            tracing::Span::current().record("user_id", id);
        }

        let labels = [
            ("method", method.to_string()),
            ("route", route.clone()),
            ("status", status.as_u16().to_string()),
        ];
        metrics::counter!("phantom_sales_http_requests_total", &labels).increment(1);
        metrics::histogram!("phantom_sales_http_request_duration_seconds", &labels)
            .record(elapsed.as_secs_f64());

        info!(
            status_code = status.as_u16(),
            outcome = outcome(status),
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Request finished"
        );

        response
    }
    .instrument(span)
    .await
}

/// Session tokens and receipts must not be cached by intermediaries.
pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_label_collapses_ids() {
        assert_eq!(route_label("/api/clients/42/sale"), "/api/clients/{id}/sale");
        assert_eq!(route_label("/api/users/7"), "/api/users/{id}");
        assert_eq!(
            route_label("/api/phantom/sync/abonados-olt"),
            "/api/phantom/sync/abonados-olt"
        );
        assert_eq!(route_label("/api/clients/C-12"), "/api/clients/C-12");
    }

    #[test]
    fn test_client_id_from_path() {
        assert_eq!(client_id("/api/clients/42/sale/receipt"), Some(42));
        assert_eq!(client_id("/api/clients/9"), Some(9));
        assert_eq!(client_id("/api/clients"), None);
        assert_eq!(client_id("/api/clients/abc"), None);
        assert_eq!(client_id("/api/users/3"), None);
    }

    #[test]
    fn test_outcome() {
        assert_eq!(outcome(StatusCode::OK), "success");
        assert_eq!(outcome(StatusCode::UNAUTHORIZED), "client_error");
        assert_eq!(outcome(StatusCode::BAD_GATEWAY), "error");
    }
}
