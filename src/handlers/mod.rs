pub mod audit;
pub mod billing;
pub mod orders;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::AppConfig,
    db::{self, DbPool},
    events::EventSender,
    services::{
        notifications::SupplierNotifier, AuditLedger, BillingCalculator, PurchaseOrderService,
    },
};

/// Shared handler state: the service facades plus a database handle for
/// health probing.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub orders: PurchaseOrderService,
    pub ledger: AuditLedger,
    pub billing: BillingCalculator,
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn SupplierNotifier>,
        config: &AppConfig,
    ) -> Self {
        let orders = PurchaseOrderService::new(
            db.clone(),
            event_sender,
            notifier,
            config.allow_synthetic_order_ids,
        );
        let ledger = AuditLedger::new(db.clone());
        let billing = BillingCalculator::new(config.billing.clone());
        Self {
            db,
            orders,
            ledger,
            billing,
        }
    }
}

/// Builds the full application router.
pub fn app_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/purchase-orders", orders::routes())
        .nest("/audit", audit::routes())
        .nest("/billing", billing::routes());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match db::check_connection(state.db.as_ref()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected" })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "database": e.to_string() })),
        ),
    }
}
