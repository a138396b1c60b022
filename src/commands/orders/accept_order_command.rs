use crate::{
    commands::Command,
    db::DbPool,
    entities::{
        audit_entry::AuditAction,
        purchase_order::{self, OrderState},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{audit, audit::NewAuditEntry, orders::OrderStore},
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{ActiveValue::Set, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use validator::Validate;

lazy_static! {
    static ref ORDER_ACCEPTANCES: IntCounter = IntCounter::new(
        "purchase_order_acceptances_total",
        "Total number of purchase orders accepted"
    )
    .expect("metric can be created");
}

const UNSPECIFIED_SUPPLIER: &str = "NOT_SPECIFIED";

/// Accepts a received order: the terminal happy-path transition. Marks
/// the order ready for billing and records who approved it.
///
/// Mutually exclusive with discrepancy reporting: an order that already
/// has a notified discrepancy cannot be accepted.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AcceptOrderCommand {
    #[validate(length(min = 1, message = "An order id is required"))]
    pub order_id: String,

    #[validate(length(min = 1, message = "An acting user is required"))]
    pub actor: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptOrderResult {
    pub order_id: String,
    pub state: OrderState,
    /// Falls back to NOT_SPECIFIED when the order never had an offer
    /// attached, so downstream consumers always get a recipient label.
    pub supplier: String,
    pub quantity_kg: Option<i32>,
    pub ready_for_billing: bool,
    pub already_accepted: bool,
}

#[async_trait::async_trait]
impl Command for AcceptOrderCommand {
    type Result = AcceptOrderResult;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(format!("Invalid input: {}", e)))?;

        let order_id = self.order_id.clone();
        let actor = self.actor.clone();

        let (saved, already_accepted) = db_pool
            .transaction::<_, (purchase_order::Model, bool), ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = OrderStore::find_by_order_id_on(txn, &order_id)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Order {} not found", order_id))
                        })?;

                    if order.state == OrderState::Aceptada {
                        return Ok((order, true));
                    }

                    if order.discrepancy_status.is_some() {
                        return Err(ServiceError::InvalidState(format!(
                            "Order {} has a notified discrepancy and cannot be accepted",
                            order.order_id
                        )));
                    }

                    if !order.state.can_transition_to(OrderState::Aceptada) {
                        return Err(ServiceError::InvalidState(format!(
                            "Cannot accept order {} from state {}",
                            order.order_id, order.state
                        )));
                    }

                    let previous_state = order.state;
                    let supplier = order
                        .supplier
                        .clone()
                        .unwrap_or_else(|| UNSPECIFIED_SUPPLIER.to_string());
                    let mut active: purchase_order::ActiveModel = order.into();
                    active.state = Set(OrderState::Aceptada);
                    active.ready_for_billing = Set(true);
                    active.approving_user = Set(Some(actor.clone()));
                    active.approved_at = Set(Some(Utc::now()));
                    active.modifying_user = Set(Some(actor.clone()));
                    let updated = OrderStore::save_on(txn, active).await?;

                    audit::append(
                        txn,
                        NewAuditEntry {
                            order_id: updated.order_id.clone(),
                            action: AuditAction::Accepted.to_string(),
                            actor,
                            description: format!(
                                "Order accepted; supplier {} cleared for billing",
                                supplier
                            ),
                            previous_state: Some(previous_state.to_string()),
                            new_state: Some(updated.state.to_string()),
                            details: None,
                        },
                    )
                    .await?;

                    Ok((updated, false))
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        if already_accepted {
            info!(order_id = %saved.order_id, "order already accepted; retry is a no-op");
        } else {
            info!(order_id = %saved.order_id, "purchase order accepted");
            event_sender
                .send(Event::OrderAccepted {
                    order_id: saved.order_id.clone(),
                })
                .await
                .map_err(|e| {
                    error!("Failed to send event for accepted order: {}", e);
                    ServiceError::EventError(e)
                })?;
            ORDER_ACCEPTANCES.inc();
        }

        Ok(AcceptOrderResult {
            order_id: saved.order_id,
            state: saved.state,
            supplier: saved
                .supplier
                .unwrap_or_else(|| UNSPECIFIED_SUPPLIER.to_string()),
            quantity_kg: Some(saved.quantity_kg),
            ready_for_billing: saved.ready_for_billing,
            already_accepted,
        })
    }
}
