use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use gas_procurement_api::{
    config::{AppConfig, BillingSettings},
    db::{self, DbConfig},
    events::{self, EventSender},
    handlers::{app_router, AppState},
    services::notifications::{LogNotifier, SupplierNotifier},
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Test harness: application state backed by an in-memory SQLite database
/// with the embedded migrations applied.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(false, Arc::new(LogNotifier)).await
    }

    pub async fn with_synthetic_ids() -> Self {
        Self::build(true, Arc::new(LogNotifier)).await
    }

    pub async fn with_notifier(notifier: Arc<dyn SupplierNotifier>) -> Self {
        Self::build(false, notifier).await
    }

    async fn build(allow_synthetic: bool, notifier: Arc<dyn SupplierNotifier>) -> Self {
        let cfg = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: 1,
            db_min_connections: 1,
            allow_synthetic_order_ids: allow_synthetic,
            billing: BillingSettings::default(),
        };

        // A single connection keeps every query on the same in-memory
        // database.
        let db_cfg = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = Arc::new(AppState::new(db_arc, event_sender, notifier, &cfg));
        let router = app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Sends a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Reads a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Drives an order through creation and offer selection, returning its id.
#[allow(dead_code)]
pub async fn seed_order_with_offer(app: &TestApp) -> String {
    let create = app
        .request(
            Method::POST,
            "/api/v1/purchase-orders",
            Some(serde_json::json!({
                "quantity_kg": 500,
                "justification": "Winter stock replenishment",
                "actor": "maria.lopez"
            })),
        )
        .await;
    assert_eq!(create.status(), 201);
    let body = response_json(create).await;
    let order_id = body["order_id"].as_str().expect("order id").to_string();

    let offer = app
        .request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{}/offer", order_id),
            Some(serde_json::json!({
                "supplier": "GasAndes S.A.",
                "quantity_kg": 500,
                "unit_cost": "120.50",
                "total_cost": "60250.00",
                "delivery_days": 7,
                "actor": "maria.lopez"
            })),
        )
        .await;
    assert_eq!(offer.status(), 200);

    order_id
}
