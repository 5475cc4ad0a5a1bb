use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use phantom_sales::api::AppState;
use phantom_sales::clients::{PhantomError, SubscriberDirectory};
use phantom_sales::clock::SystemClock;
use phantom_sales::config::Config;
use phantom_sales::db::{ClientIdentity, Store};
use phantom_sales::state::SharedState;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "----phantom-sales-test-boundary";

struct MobileDirectory;

#[async_trait::async_trait]
impl SubscriberDirectory for MobileDirectory {
    async fn fetch_all_subscribers(&self) -> Result<Value, PhantomError> {
        Ok(json!([]))
    }

    async fn lookup_mobile_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<String>, PhantomError> {
        match external_id {
            "C-0001" => Ok(Some("555-0199".to_string())),
            "C-0002" => Err(PhantomError::UpstreamAuth("Error de autenticacion".to_string())),
            _ => Ok(None),
        }
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    token: String,
}

async fn spawn_app(client_count: usize) -> TestApp {
    let id = uuid::Uuid::new_v4();
    let mut config = Config::default();
    config.general.database_path = format!(
        "sqlite:{}",
        std::env::temp_dir()
            .join(format!("phantom-sales-clients-{id}.db"))
            .display()
    );
    config.storage.receipts_path = std::env::temp_dir()
        .join(format!("phantom-sales-client-receipts-{id}"))
        .display()
        .to_string();
    config.storage.max_receipt_bytes = 4096;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.admin_seed.username = Some("admin".to_string());
    config.admin_seed.password = Some("pw".to_string());

    let store = Store::new(&config.general.database_path)
        .await
        .expect("Failed to open store");

    let identities: Vec<ClientIdentity> = (1..=client_count)
        .rev()
        .map(|n| ClientIdentity {
            external_id: format!("C-{n:04}"),
            first_name: format!("Name{n}"),
            last_name: if n == 7 { "Ramírez" } else { "Doe" }.to_string(),
            address: format!("{n} Fiber Rd"),
            city: "Springfield".to_string(),
        })
        .collect();
    store
        .client_repo()
        .upsert_identities(&identities, "2026-01-01T00:00:00.000Z")
        .await
        .unwrap();

    let shared = Arc::new(SharedState::from_parts(
        config,
        store,
        Arc::new(SystemClock),
        Arc::new(MobileDirectory),
    ));
    let state = phantom_sales::api::create_app_state(shared, None)
        .await
        .unwrap();
    let router = phantom_sales::api::router(state.clone());

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
    let token = body["data"]["token"].as_str().unwrap().to_string();

    TestApp {
        router,
        state,
        token,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn get(&self, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {}", self.token))
            .body(Body::empty())
            .unwrap()
    }

    fn json(&self, method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn sale(&self, client_id: i32, amount: Option<&str>, file: Option<(&str, &[u8])>) -> Request<Body> {
        let mut body = Vec::new();
        if let Some(amount) = amount {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"amount\"\r\n\r\n{amount}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"receiptPdf\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(format!("/api/clients/{client_id}/sale"))
            .header("Authorization", format!("Bearer {}", self.token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn client_id(&self, external_id: &str) -> i32 {
        self.state
            .store()
            .client_repo()
            .get_by_external_id(external_id)
            .await
            .unwrap()
            .unwrap()
            .id
    }
}

#[tokio::test]
async fn test_list_pagination_and_clamping() {
    let app = spawn_app(25).await;

    let (status, body) = app.send(app.get("/api/clients")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 25);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["pageSize"], 50);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 25);
    assert_eq!(body["data"]["items"][0]["externalId"], "C-0001");

    let (_, body) = app.send(app.get("/api/clients?page=3&pageSize=1")).await;
    assert_eq!(body["data"]["total"], 25);
    assert_eq!(body["data"]["pageSize"], 10);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(items[0]["externalId"], "C-0021");

    let (_, body) = app.send(app.get("/api/clients?page=0&pageSize=500")).await;
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["pageSize"], 200);

    let (status, body) = app
        .send(app.get("/api/clients?page=9223372036854775807&pageSize=200"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 25);
    assert_eq!(body["data"]["page"], 1_000_000);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());

    let (_, body) = app.send(app.get("/api/clients?search=ram%C3%ADrez")).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["externalId"], "C-0007");

    let (_, body) = app.send(app.get("/api/clients?search=c-001")).await;
    assert_eq!(body["data"]["total"], 10);

    let (status, _) = app.send(app.get("/api/clients?status=Bogus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_and_update_status() {
    let app = spawn_app(3).await;
    let id = app.client_id("C-0002").await;

    let (status, body) = app.send(app.get(&format!("/api/clients/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["externalId"], "C-0002");
    assert!(body["data"]["contactStatus"].is_null());
    assert!(body["data"]["latestSale"].is_null());

    let (status, body) = app
        .send(app.json(
            "PUT",
            &format!("/api/clients/{id}/status"),
            &json!({"status": "ContactLater", "notes": "Call after 6pm"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"ok": true}));

    let (_, body) = app.send(app.get(&format!("/api/clients/{id}"))).await;
    assert_eq!(body["data"]["contactStatus"], "ContactLater");
    assert_eq!(body["data"]["notes"], "Call after 6pm");
    assert!(body["data"]["lastContactedByUserId"].is_number());

    let (_, body) = app.send(app.get("/api/clients?status=ContactLater")).await;
    assert_eq!(body["data"]["total"], 1);

    let (status, _) = app
        .send(app.json("PUT", "/api/clients/9999/status", &json!({"status": 1})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(app.json(
            "PUT",
            &format!("/api/clients/{id}/status"),
            &json!({"status": "Bogus"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let malformed = Request::builder()
        .method("PUT")
        .uri(format!("/api/clients/{id}/status"))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"status\":"))
        .unwrap();
    let (status, body) = app.send(malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, body) = app.send(app.get(&format!("/api/clients/{id}"))).await;
    assert_eq!(body["data"]["contactStatus"], "ContactLater");

    let (status, _) = app.send(app.get("/api/clients/9999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sale_flow_and_receipt_download() {
    let app = spawn_app(2).await;
    let id = app.client_id("C-0001").await;
    let pdf: &[u8] = b"%PDF-1.4\n%test receipt\n";

    let (status, _) = app.send(app.get(&format!("/api/clients/{id}/sale/receipt"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(app.sale(id, Some("249.90"), Some(("Recibo.PDF", pdf))))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["ok"], true);
    let sale_id = body["data"]["saleId"].as_i64().unwrap();

    let (_, body) = app.send(app.get(&format!("/api/clients/{id}"))).await;
    assert_eq!(body["data"]["contactStatus"], "SaleClosed");
    assert_eq!(body["data"]["latestSale"]["id"], sale_id);
    assert_eq!(body["data"]["latestSale"]["amount"], 249.9);

    let response = app
        .router
        .clone()
        .oneshot(app.get(&format!("/api/clients/{id}/sale/receipt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "application/pdf"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"C-0001_"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], pdf);
}

#[tokio::test]
async fn test_sale_validation() {
    let app = spawn_app(1).await;
    let id = app.client_id("C-0001").await;
    let pdf: &[u8] = b"%PDF-1.4";
    let oversized = vec![b'x'; 5000];

    let cases = [
        app.sale(id, Some("0"), Some(("r.pdf", pdf))),
        app.sale(id, Some("-12"), Some(("r.pdf", pdf))),
        app.sale(id, Some("twelve"), Some(("r.pdf", pdf))),
        app.sale(id, None, Some(("r.pdf", pdf))),
        app.sale(id, Some("10"), Some(("r.docx", pdf))),
        app.sale(id, Some("10"), None),
        app.sale(id, Some("10"), Some(("big.pdf", oversized.as_slice()))),
    ];

    for request in cases {
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["success"], false);
    }

    let (_, body) = app.send(app.get(&format!("/api/clients/{id}"))).await;
    assert!(body["data"]["latestSale"].is_null());
    assert!(body["data"]["contactStatus"].is_null());

    let (status, _) = app.send(app.sale(9999, Some("10"), Some(("r.pdf", pdf)))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_phone_refresh() {
    let app = spawn_app(3).await;

    let refresh = |id: i32| {
        Request::builder()
            .method("POST")
            .uri(format!("/api/clients/{id}/phone/refresh"))
            .header("Authorization", format!("Bearer {}", app.token))
            .body(Body::empty())
            .unwrap()
    };

    let found = app.client_id("C-0001").await;
    let (status, body) = app.send(refresh(found)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "555-0199");
    let (_, body) = app.send(app.get(&format!("/api/clients/{found}"))).await;
    assert_eq!(body["data"]["phone"], "555-0199");

    let missing = app.client_id("C-0003").await;
    let (status, body) = app.send(refresh(missing)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["phone"].is_null());

    let upstream_error = app.client_id("C-0002").await;
    let (status, _) = app.send(refresh(upstream_error)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
