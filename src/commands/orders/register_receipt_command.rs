use crate::{
    commands::Command,
    db::DbPool,
    entities::{
        audit_entry::AuditAction,
        purchase_order::{self, OrderState},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    ids,
    services::{audit, audit::NewAuditEntry, orders::OrderStore},
};
use sea_orm::{ActiveValue::Set, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

/// Registers reception of the goods for an order, moving it from
/// ORDEN_ENVIADA to PEDIDO_RECIBIDO. Every receipt gets a `REC-` id
/// recorded on the audit trail.
///
/// When the order id cannot be resolved and `allow_synthetic_id` is on,
/// the receipt is still audited under a generated `ORD_` identifier so
/// the paper trail survives a lost order reference. No order row is
/// touched in that case.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterReceiptCommand {
    #[validate(length(min = 1, message = "An order id is required"))]
    pub order_id: String,

    #[validate(length(min = 1, message = "An acting user is required"))]
    pub actor: String,

    /// Quantity actually delivered, when the receiving clerk recorded one.
    pub received_quantity: Option<i32>,

    /// Set by the service from configuration, not by callers.
    #[serde(skip)]
    pub allow_synthetic_id: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterReceiptResult {
    /// The id the receipt was audited under. Differs from the requested
    /// order id only on the synthetic path.
    pub order_id: String,
    pub receipt_id: String,
    pub state: Option<OrderState>,
    pub synthetic: bool,
    pub already_received: bool,
}

enum ReceiptPath {
    Updated(purchase_order::Model, String),
    AlreadyReceived(purchase_order::Model),
    Synthetic { order_id: String, receipt_id: String },
}

#[async_trait::async_trait]
impl Command for RegisterReceiptCommand {
    type Result = RegisterReceiptResult;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()
            .map_err(|e| ServiceError::ValidationError(format!("Invalid input: {}", e)))?;

        if let Some(quantity) = self.received_quantity {
            if quantity < 0 {
                return Err(ServiceError::ValidationError(
                    "Received quantity cannot be negative".into(),
                ));
            }
        }

        let order_id = self.order_id.clone();
        let actor = self.actor.clone();
        let received_quantity = self.received_quantity;
        let allow_synthetic = self.allow_synthetic_id;

        let path = db_pool
            .transaction::<_, ReceiptPath, ServiceError>(move |txn| {
                Box::pin(async move {
                    let found = OrderStore::find_by_order_id_on(txn, &order_id).await?;

                    let order = match found {
                        Some(order) => order,
                        None if allow_synthetic => {
                            let synthetic_id = ids::synthetic_order_id();
                            let receipt_id = ids::receipt_id();
                            audit::append(
                                txn,
                                NewAuditEntry {
                                    order_id: synthetic_id.clone(),
                                    action: AuditAction::Received.to_string(),
                                    actor,
                                    description: format!(
                                        "Receipt {} registered under synthetic id; requested order {} not found",
                                        receipt_id, order_id
                                    ),
                                    previous_state: None,
                                    new_state: Some(OrderState::PedidoRecibido.to_string()),
                                    details: received_quantity
                                        .map(|q| format!(r#"{{"received_quantity_kg":{}}}"#, q)),
                                },
                            )
                            .await?;
                            return Ok(ReceiptPath::Synthetic {
                                order_id: synthetic_id,
                                receipt_id,
                            });
                        }
                        None => {
                            return Err(ServiceError::NotFound(format!(
                                "Order {} not found",
                                order_id
                            )))
                        }
                    };

                    if order.state == OrderState::PedidoRecibido {
                        return Ok(ReceiptPath::AlreadyReceived(order));
                    }

                    if !order.state.can_transition_to(OrderState::PedidoRecibido) {
                        return Err(ServiceError::InvalidState(format!(
                            "Cannot register a receipt for order {} in state {}",
                            order.order_id, order.state
                        )));
                    }

                    let receipt_id = ids::receipt_id();
                    let previous_state = order.state;
                    let mut active: purchase_order::ActiveModel = order.into();
                    active.state = Set(OrderState::PedidoRecibido);
                    active.received_quantity_kg = Set(received_quantity);
                    active.modifying_user = Set(Some(actor.clone()));
                    let updated = OrderStore::save_on(txn, active).await?;

                    audit::append(
                        txn,
                        NewAuditEntry {
                            order_id: updated.order_id.clone(),
                            action: AuditAction::Received.to_string(),
                            actor,
                            description: format!("Goods received, receipt {}", receipt_id),
                            previous_state: Some(previous_state.to_string()),
                            new_state: Some(updated.state.to_string()),
                            details: received_quantity
                                .map(|q| format!(r#"{{"received_quantity_kg":{}}}"#, q)),
                        },
                    )
                    .await?;

                    Ok(ReceiptPath::Updated(updated, receipt_id))
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        match path {
            ReceiptPath::Updated(order, receipt_id) => {
                info!(order_id = %order.order_id, receipt_id = %receipt_id, "receipt registered");
                event_sender
                    .send(Event::ReceiptRegistered {
                        order_id: order.order_id.clone(),
                        synthetic: false,
                    })
                    .await
                    .map_err(|e| {
                        error!("Failed to send event for registered receipt: {}", e);
                        ServiceError::EventError(e)
                    })?;
                Ok(RegisterReceiptResult {
                    order_id: order.order_id,
                    receipt_id,
                    state: Some(order.state),
                    synthetic: false,
                    already_received: false,
                })
            }
            ReceiptPath::AlreadyReceived(order) => {
                info!(order_id = %order.order_id, "receipt already registered; retry is a no-op");
                Ok(RegisterReceiptResult {
                    order_id: order.order_id,
                    receipt_id: String::new(),
                    state: Some(order.state),
                    synthetic: false,
                    already_received: true,
                })
            }
            ReceiptPath::Synthetic {
                order_id,
                receipt_id,
            } => {
                warn!(
                    synthetic_id = %order_id,
                    requested = %self.order_id,
                    "receipt audited under synthetic order id"
                );
                event_sender
                    .send(Event::ReceiptRegistered {
                        order_id: order_id.clone(),
                        synthetic: true,
                    })
                    .await
                    .map_err(|e| {
                        error!("Failed to send event for synthetic receipt: {}", e);
                        ServiceError::EventError(e)
                    })?;
                Ok(RegisterReceiptResult {
                    order_id,
                    receipt_id,
                    state: None,
                    synthetic: true,
                    already_received: false,
                })
            }
        }
    }
}
