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
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{ActiveValue::Set, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

lazy_static! {
    static ref DISCREPANCIES_REPORTED: IntCounter = IntCounter::new(
        "purchase_order_discrepancies_total",
        "Total number of discrepancies reported on purchase orders"
    )
    .expect("metric can be created");
}

const DISCREPANCY_NOTIFIED: &str = "NOTIFIED";

/// Reports a discrepancy on a received order. This operation must never
/// abort the surrounding workflow step: problems are reported through the
/// outcome payload, not through errors. Only infrastructure failures
/// (a broken database connection) surface as `Err`.
///
/// The persisted `state` column is left untouched; the discrepancy lives
/// in the ticket and status side attributes so the order remains
/// addressable by the rest of the lifecycle queries.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ReportDiscrepancyCommand {
    #[validate(length(min = 1, message = "An order id is required"))]
    pub order_id: String,

    #[validate(length(min = 1, message = "An acting user is required"))]
    pub actor: String,

    /// Free-form description of what was wrong with the shipment.
    pub details: String,

    /// Optional classification, e.g. "QUANTITY" or "QUALITY".
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscrepancyOutcome {
    pub success: bool,
    pub order_id: String,
    pub ticket_id: Option<String>,
    pub supplier: Option<String>,
    pub discrepancy_status: Option<String>,
    pub error: Option<String>,
}

impl DiscrepancyOutcome {
    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            order_id: String::new(),
            ticket_id: None,
            supplier: None,
            discrepancy_status: None,
            error: Some(message),
        }
    }
}

#[async_trait::async_trait]
impl Command for ReportDiscrepancyCommand {
    type Result = DiscrepancyOutcome;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = %self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        if self.validate().is_err() {
            return Ok(DiscrepancyOutcome {
                success: false,
                order_id: self.order_id.clone(),
                ticket_id: None,
                supplier: None,
                discrepancy_status: None,
                error: Some("An order id and an acting user are required".to_string()),
            });
        }

        let order_id = self.order_id.clone();
        let actor = self.actor.clone();
        let details = self.details.clone();
        let kind = self.kind.clone();

        let outcome = db_pool
            .transaction::<_, DiscrepancyOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = match OrderStore::find_by_order_id_on(txn, &order_id).await? {
                        Some(order) => order,
                        None => {
                            return Ok(DiscrepancyOutcome {
                                success: false,
                                order_id: order_id.clone(),
                                ticket_id: None,
                                supplier: None,
                                discrepancy_status: None,
                                error: Some(format!("Order {} not found", order_id)),
                            })
                        }
                    };

                    // Reporting twice reuses the original ticket.
                    if let Some(ticket) = order.discrepancy_ticket.clone() {
                        return Ok(DiscrepancyOutcome {
                            success: true,
                            order_id: order.order_id,
                            ticket_id: Some(ticket),
                            supplier: order.supplier,
                            discrepancy_status: order.discrepancy_status,
                            error: None,
                        });
                    }

                    // Acceptance and discrepancy are mutually exclusive
                    // branches: an accepted order is never mutated here.
                    if order.state == OrderState::Aceptada {
                        return Ok(DiscrepancyOutcome {
                            success: false,
                            order_id: order.order_id.clone(),
                            ticket_id: None,
                            supplier: order.supplier,
                            discrepancy_status: order.discrepancy_status,
                            error: Some(format!(
                                "Order {} was already accepted",
                                order.order_id
                            )),
                        });
                    }

                    if order.state != OrderState::PedidoRecibido {
                        // Lenient on earlier states: the notification still
                        // goes out, the anomaly is only logged.
                        warn!(
                            order_id = %order.order_id,
                            state = %order.state,
                            "discrepancy reported outside PEDIDO_RECIBIDO"
                        );
                    }

                    let ticket = ids::discrepancy_ticket();
                    let previous_state = order.state;
                    let supplier = order.supplier.clone();
                    let mut active: purchase_order::ActiveModel = order.into();
                    active.discrepancy_status = Set(Some(DISCREPANCY_NOTIFIED.to_string()));
                    active.discrepancy_ticket = Set(Some(ticket.clone()));
                    active.modifying_user = Set(Some(actor.clone()));
                    let updated = OrderStore::save_on(txn, active).await?;

                    let details_json = serde_json::json!({
                        "ticket_id": ticket,
                        "kind": kind,
                        "details": details,
                    });

                    audit::append(
                        txn,
                        NewAuditEntry {
                            order_id: updated.order_id.clone(),
                            action: AuditAction::DiscrepancyNotified.to_string(),
                            actor,
                            description: format!("Discrepancy notified, ticket {}", ticket),
                            previous_state: Some(previous_state.to_string()),
                            new_state: Some(OrderState::DiscrepanciaDetectada.to_string()),
                            details: Some(details_json.to_string()),
                        },
                    )
                    .await?;

                    Ok(DiscrepancyOutcome {
                        success: true,
                        order_id: updated.order_id,
                        ticket_id: Some(ticket),
                        supplier,
                        discrepancy_status: updated.discrepancy_status,
                        error: None,
                    })
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        if outcome.success {
            if let Some(ticket) = &outcome.ticket_id {
                info!(
                    order_id = %outcome.order_id,
                    ticket_id = %ticket,
                    "discrepancy reported"
                );
                DISCREPANCIES_REPORTED.inc();
                // Event loss is tolerable here; the ticket is already
                // committed and the outcome reports success.
                if let Err(e) = event_sender
                    .send(Event::DiscrepancyReported {
                        order_id: outcome.order_id.clone(),
                        ticket_id: ticket.clone(),
                    })
                    .await
                {
                    error!("Failed to send event for reported discrepancy: {}", e);
                }
            }
        } else {
            warn!(
                order_id = %self.order_id,
                error = ?outcome.error,
                "discrepancy report completed without effect"
            );
        }

        Ok(outcome)
    }
}
