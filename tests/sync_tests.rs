use axum::{
    Router,
    body::Body,
    extract::Query,
    http::{Request, StatusCode},
    routing::get,
};
use http_body_util::BodyExt;
use phantom_sales::clients::{PhantomClient, TokenCache};
use phantom_sales::clock::{Clock, SystemClock};
use phantom_sales::config::Config;
use phantom_sales::db::Store;
use phantom_sales::state::SharedState;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Local stand-in for the Phantom API with a swappable subscriber listing.
struct FakePhantom {
    base_url: String,
    auth_calls: Arc<AtomicUsize>,
    listing: Arc<Mutex<String>>,
}

async fn spawn_fake_phantom(password: &'static str) -> FakePhantom {
    let auth_calls = Arc::new(AtomicUsize::new(0));
    let listing = Arc::new(Mutex::new("[]".to_string()));

    let counter = auth_calls.clone();
    let body = listing.clone();

    let app = Router::new().route(
        "/api.php",
        get(move |Query(q): Query<HashMap<String, String>>| {
            let counter = counter.clone();
            let body = body.clone();
            async move {
                match q.get("action").map(String::as_str) {
                    Some("autentificar") => {
                        counter.fetch_add(1, Ordering::SeqCst);
                        if q.get("api_pass").map(String::as_str) == Some(password) {
                            (StatusCode::OK, json!({"token": "tok-1"}).to_string())
                        } else {
                            (StatusCode::OK, "Error de autentificacion".to_string())
                        }
                    }
                    Some("Abonados_por_OLT")
                        if q.get("token").map(String::as_str) == Some("tok-1")
                            && q.get("OLT").map(String::as_str) == Some("*") =>
                    {
                        (StatusCode::OK, body.lock().unwrap().clone())
                    }
                    _ => (StatusCode::FORBIDDEN, "denied".to_string()),
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakePhantom {
        base_url: format!("http://{addr}/api.php"),
        auth_calls,
        listing,
    }
}

struct TestApp {
    router: Router,
    store: Store,
    token: String,
}

async fn spawn_app(upstream: &FakePhantom, api_pass: &str) -> TestApp {
    let id = uuid::Uuid::new_v4();
    let mut config = Config::default();
    config.general.database_path = format!(
        "sqlite:{}",
        std::env::temp_dir()
            .join(format!("phantom-sales-sync-{id}.db"))
            .display()
    );
    config.phantom.base_url = upstream.base_url.clone();
    config.phantom.api_user = "sales".to_string();
    config.phantom.api_pass = api_pass.to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.admin_seed.username = Some("admin".to_string());
    config.admin_seed.password = Some("pw".to_string());

    let store = Store::new(&config.general.database_path).await.unwrap();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(TokenCache::new(clock.clone()));
    let phantom = PhantomClient::new(&config.phantom, reqwest::Client::new(), cache).unwrap();

    let shared = Arc::new(SharedState::from_parts(
        config,
        store.clone(),
        clock,
        Arc::new(phantom),
    ));
    let state = phantom_sales::api::create_app_state(shared, None)
        .await
        .unwrap();
    let router = phantom_sales::api::router(state);

    let login = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({"username": "admin", "password": "pw"}).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(login).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();

    TestApp {
        router,
        store,
        token: body["data"]["token"].as_str().unwrap().to_string(),
    }
}

impl TestApp {
    async fn sync(&self) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/phantom/sync/abonados-olt")
            .header("Authorization", format!("Bearer {}", self.token))
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }
}

#[tokio::test]
async fn test_sync_skips_malformed_rows_and_is_idempotent() {
    let upstream = spawn_fake_phantom("secret").await;
    *upstream.listing.lock().unwrap() = json!([
        ["A1", "x", "Lee", "Ann", "Road 1", "City"],
        ["", "x", "No", "Id", "", ""],
        ["A2", "x"]
    ])
    .to_string();

    let app = spawn_app(&upstream, "secret").await;

    let (status, body) = app.sync().await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["data"],
        json!({"inserted": 1, "updated": 0, "total": 1, "skipped": 2})
    );

    let client = app
        .store
        .client_repo()
        .get_by_external_id("A1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.first_name, "Ann");
    assert_eq!(client.last_name, "Lee");
    assert!(client.contact_status.is_none());

    let (status, body) = app.sync().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"inserted": 0, "updated": 1, "total": 1, "skipped": 2})
    );

    assert_eq!(upstream.auth_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sync_rejects_non_array_listing() {
    let upstream = spawn_fake_phantom("secret").await;
    *upstream.listing.lock().unwrap() = json!({"error": "OLT not found"}).to_string();

    let app = spawn_app(&upstream, "secret").await;

    let (status, body) = app.sync().await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_sync_reports_upstream_auth_failure() {
    let upstream = spawn_fake_phantom("secret").await;
    let app = spawn_app(&upstream, "wrong").await;

    let (status, _) = app.sync().await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = app.sync().await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(upstream.auth_calls.load(Ordering::SeqCst), 2);
}
