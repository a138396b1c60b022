use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{errors::ServiceError, handlers::AppState, services::billing::BillingRegime};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/calculate", post(calculate_bill))
}

#[derive(Debug, Deserialize)]
pub struct CalculateBillRequest {
    pub previous_reading: Option<i64>,
    pub current_reading: Option<i64>,
    /// Subsidy fraction in (0, 1]; absent or non-positive means no subsidy.
    pub subsidy_rate: Option<Decimal>,
    /// Applies the solidarity contribution surcharge. Wins over the subsidy
    /// when both are supplied.
    #[serde(default)]
    pub contribution: bool,
}

async fn calculate_bill(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CalculateBillRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let previous = payload.previous_reading.ok_or_else(|| {
        ServiceError::ValidationError("A previous meter reading is required".into())
    })?;
    let current = payload.current_reading.ok_or_else(|| {
        ServiceError::ValidationError("A current meter reading is required".into())
    })?;

    let regime = BillingRegime::resolve(payload.subsidy_rate, payload.contribution);
    let statement = state.billing.calculate(previous, current, regime)?;
    Ok(Json(statement))
}
