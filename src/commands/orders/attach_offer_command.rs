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

/// Attaches the winning supplier offer to an order, moving it from
/// NECESIDAD_EVALUADA to OFERTA_SELECCIONADA.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AttachOfferCommand {
    #[validate(length(min = 1, message = "An order id is required"))]
    pub order_id: String,

    #[validate(length(min = 1, message = "A supplier is required"))]
    pub supplier: String,

    #[validate(range(min = 1, message = "Offered quantity must be greater than 0"))]
    pub quantity_kg: i32,

    pub unit_cost: Decimal,
    pub total_cost: Decimal,

    #[validate(range(min = 1, message = "Delivery time must be at least one day"))]
    pub delivery_days: i32,

    #[validate(length(min = 1, message = "An acting user is required"))]
    pub actor: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachOfferResult {
    pub order_id: String,
    pub state: OrderState,
    pub supplier: String,
}

#[async_trait::async_trait]
impl Command for AttachOfferCommand {
    type Result = AttachOfferResult;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(format!("Invalid input: {}", e)))?;

        if self.unit_cost <= Decimal::ZERO || self.total_cost <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Offer costs must be positive".into(),
            ));
        }

        let order_id = self.order_id.clone();
        let supplier = self.supplier.clone();
        let quantity_kg = self.quantity_kg;
        let unit_cost = self.unit_cost;
        let total_cost = self.total_cost;
        let delivery_days = self.delivery_days;
        let actor = self.actor.clone();

        let saved = db_pool
            .transaction::<_, purchase_order::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = OrderStore::find_by_order_id_on(txn, &order_id)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Order {} not found", order_id))
                        })?;

                    // Retrying the same selection is a no-op.
                    if order.state == OrderState::OfertaSeleccionada
                        && order.supplier.as_deref() == Some(supplier.as_str())
                    {
                        return Ok(order);
                    }

                    if !order.state.can_transition_to(OrderState::OfertaSeleccionada) {
                        return Err(ServiceError::InvalidState(format!(
                            "Cannot attach an offer to order {} in state {}",
                            order.order_id, order.state
                        )));
                    }

                    let previous_state = order.state;
                    let mut active: purchase_order::ActiveModel = order.into();
                    active.supplier = Set(Some(supplier.clone()));
                    active.quantity_kg = Set(quantity_kg);
                    active.unit_cost = Set(Some(unit_cost));
                    active.total_cost = Set(Some(total_cost));
                    active.delivery_days = Set(Some(delivery_days));
                    active.modifying_user = Set(Some(actor.clone()));
                    active.state = Set(OrderState::OfertaSeleccionada);
                    let updated = OrderStore::save_on(txn, active).await?;

                    audit::append(
                        txn,
                        NewAuditEntry {
                            order_id: updated.order_id.clone(),
                            action: AuditAction::OfferSelected.to_string(),
                            actor,
                            description: format!(
                                "Offer selected from supplier {}: {} kg at {} ({} total), {} day delivery",
                                supplier, quantity_kg, unit_cost, total_cost, delivery_days
                            ),
                            previous_state: Some(previous_state.to_string()),
                            new_state: Some(updated.state.to_string()),
                            details: None,
                        },
                    )
                    .await?;

                    Ok(updated)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(
            order_id = %saved.order_id,
            supplier = %self.supplier,
            "offer attached to purchase order"
        );

        event_sender
            .send(Event::OfferAttached {
                order_id: saved.order_id.clone(),
                supplier: self.supplier.clone(),
            })
            .await
            .map_err(|e| {
                error!("Failed to send event for attached offer: {}", e);
                ServiceError::EventError(e)
            })?;

        Ok(AttachOfferResult {
            order_id: saved.order_id,
            state: saved.state,
            supplier: self.supplier.clone(),
        })
    }
}
