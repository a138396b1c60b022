use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    commands::orders::{
        AttachOfferCommand, CreateOrderCommand, RegisterReceiptCommand, ReportDiscrepancyCommand,
    },
    entities::purchase_order::OrderState,
    errors::ServiceError,
    handlers::AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:order_id", get(get_order))
        .route("/:order_id/offer", post(attach_offer))
        .route("/:order_id/send", post(send_order))
        .route("/:order_id/receipt", post(register_receipt))
        .route("/:order_id/accept", post(accept_order))
        .route("/:order_id/discrepancy", post(report_discrepancy))
        .route("/:order_id/history", get(order_history))
        .route("/:order_id/summary", get(order_summary))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub quantity_kg: i32,
    pub justification: String,
    pub observations: Option<String>,
    pub needed_by: Option<String>,
    pub actor: String,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let command = CreateOrderCommand {
        quantity_kg: payload.quantity_kg,
        justification: payload.justification,
        observations: payload.observations,
        needed_by: payload.needed_by,
        actor: payload.actor,
    };
    let result = state.orders.create_order(command).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub state: Option<OrderState>,
    pub requester: Option<String>,
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let store = state.orders.store();
    let orders = match (query.state, query.requester) {
        (Some(order_state), _) => store.find_by_state(order_state).await?,
        (None, Some(requester)) => store.find_by_requester(&requester).await?,
        (None, None) => {
            return Err(ServiceError::ValidationError(
                "Provide a state or requester filter".into(),
            ))
        }
    };
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.orders.get_order(&order_id).await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct AttachOfferRequest {
    pub supplier: String,
    pub quantity_kg: i32,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub delivery_days: i32,
    pub actor: String,
}

async fn attach_offer(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Json(payload): Json<AttachOfferRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let command = AttachOfferCommand {
        order_id,
        supplier: payload.supplier,
        quantity_kg: payload.quantity_kg,
        unit_cost: payload.unit_cost,
        total_cost: payload.total_cost,
        delivery_days: payload.delivery_days,
        actor: payload.actor,
    };
    let result = state.orders.attach_offer(command).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor: String,
}

async fn send_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Json(payload): Json<ActorRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state.orders.send_order(&order_id, &payload.actor).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct RegisterReceiptRequest {
    pub actor: String,
    pub received_quantity: Option<i32>,
}

async fn register_receipt(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Json(payload): Json<RegisterReceiptRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let command = RegisterReceiptCommand {
        order_id,
        actor: payload.actor,
        received_quantity: payload.received_quantity,
        allow_synthetic_id: false,
    };
    let result = state.orders.register_receipt(command).await?;
    Ok(Json(result))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Json(payload): Json<ActorRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state.orders.accept_order(&order_id, &payload.actor).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ReportDiscrepancyRequest {
    pub actor: String,
    #[serde(default)]
    pub details: String,
    pub kind: Option<String>,
}

/// Always answers 200: failures are carried in the outcome payload so the
/// orchestrator's workflow step completes either way.
async fn report_discrepancy(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    Json(payload): Json<ReportDiscrepancyRequest>,
) -> impl IntoResponse {
    let command = ReportDiscrepancyCommand {
        order_id,
        actor: payload.actor,
        details: payload.details,
        kind: payload.kind,
    };
    let outcome = state.orders.report_discrepancy(command).await;
    Json(outcome)
}

async fn order_history(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    // Reads go straight to the ledger: trails recorded under synthetic
    // ORD_ identifiers have no order row but are still retrievable here.
    let history = state.ledger.history_for_order(&order_id).await?;
    Ok(Json(history))
}

async fn order_summary(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.ledger.order_summary(&order_id).await?;
    Ok(Json(summary))
}
