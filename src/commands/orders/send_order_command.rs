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
use rust_decimal::Decimal;
use sea_orm::{ActiveValue::Set, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use validator::Validate;

/// Marks the order as sent to its supplier. Requires an attached offer:
/// an order with no supplier cannot be dispatched.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SendOrderCommand {
    #[validate(length(min = 1, message = "An order id is required"))]
    pub order_id: String,

    #[validate(length(min = 1, message = "An acting user is required"))]
    pub actor: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendOrderResult {
    pub order_id: String,
    pub state: OrderState,
    pub supplier: String,
    pub quantity_kg: i32,
    pub total_cost: Option<Decimal>,
    /// True when the order was already sent and this call was a retry.
    pub already_sent: bool,
}

#[async_trait::async_trait]
impl Command for SendOrderCommand {
    type Result = SendOrderResult;

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

        let (saved, already_sent) = db_pool
            .transaction::<_, (purchase_order::Model, bool), ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = OrderStore::find_by_order_id_on(txn, &order_id)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Order {} not found", order_id))
                        })?;

                    if order.supplier.is_none() {
                        return Err(ServiceError::InvalidState(format!(
                            "Order {} has no offer attached and cannot be sent",
                            order.order_id
                        )));
                    }

                    if order.state == OrderState::OrdenEnviada {
                        return Ok((order, true));
                    }

                    if !order.state.can_transition_to(OrderState::OrdenEnviada) {
                        return Err(ServiceError::InvalidState(format!(
                            "Cannot send order {} from state {}",
                            order.order_id, order.state
                        )));
                    }

                    let previous_state = order.state;
                    let supplier = order.supplier.clone().unwrap_or_default();
                    let mut active: purchase_order::ActiveModel = order.into();
                    active.state = Set(OrderState::OrdenEnviada);
                    active.modifying_user = Set(Some(actor.clone()));
                    let updated = OrderStore::save_on(txn, active).await?;

                    audit::append(
                        txn,
                        NewAuditEntry {
                            order_id: updated.order_id.clone(),
                            action: AuditAction::Sent.to_string(),
                            actor,
                            description: format!(
                                "Purchase order sent to supplier: {}",
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

        if already_sent {
            info!(order_id = %saved.order_id, "order already sent; retry is a no-op");
        } else {
            info!(order_id = %saved.order_id, "purchase order sent to supplier");
            event_sender
                .send(Event::OrderSent {
                    order_id: saved.order_id.clone(),
                })
                .await
                .map_err(|e| {
                    error!("Failed to send event for dispatched order: {}", e);
                    ServiceError::EventError(e)
                })?;
        }

        Ok(SendOrderResult {
            order_id: saved.order_id,
            state: saved.state,
            supplier: saved.supplier.unwrap_or_default(),
            quantity_kg: saved.quantity_kg,
            total_cost: saved.total_cost,
            already_sent,
        })
    }
}
