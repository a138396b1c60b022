use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{errors::ServiceError, handlers::AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(query_audit))
}

/// Supported filter combinations, checked in this order: order id plus
/// action, order id, action, actor, then a timestamp range.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub order_id: Option<String>,
    pub action: Option<String>,
    pub actor: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let ledger = &state.ledger;

    let entries = match (&query.order_id, &query.action, &query.actor) {
        (Some(order_id), Some(action), _) => {
            ledger.history_for_order_and_action(order_id, action).await?
        }
        (Some(order_id), None, _) => ledger.history_for_order(order_id).await?,
        (None, Some(action), _) => ledger.history_for_action(action).await?,
        (None, None, Some(actor)) => ledger.history_for_actor(actor).await?,
        (None, None, None) => match (query.from, query.to) {
            (Some(from), Some(to)) => ledger.history_in_range(from, to).await?,
            _ => {
                return Err(ServiceError::ValidationError(
                    "Provide an order_id, action, actor, or a from/to range".into(),
                ))
            }
        },
    };

    Ok(Json(entries))
}
