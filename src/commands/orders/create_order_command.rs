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
    services::audit::{self, NewAuditEntry},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{ActiveValue::Set, ActiveModelTrait, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref ORDER_CREATIONS: IntCounter = IntCounter::new(
        "purchase_order_creations_total",
        "Total number of purchase orders created"
    )
    .expect("metric can be created");
    static ref ORDER_CREATION_FAILURES: IntCounter = IntCounter::new(
        "purchase_order_creation_failures_total",
        "Total number of failed purchase order creations"
    )
    .expect("metric can be created");
}

/// Creates a purchase order from an evaluated need. The order id is
/// generated here and never changes afterwards.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderCommand {
    #[validate(range(min = 1, message = "Estimated quantity must be greater than 0"))]
    pub quantity_kg: i32,

    #[validate(length(min = 1, message = "A justification for the need is required"))]
    pub justification: String,

    pub observations: Option<String>,

    /// Date the gas is needed by, as supplied by the need-evaluation form.
    pub needed_by: Option<String>,

    #[validate(length(min = 1, message = "An acting user is required"))]
    pub actor: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderResult {
    pub id: Uuid,
    pub order_id: String,
    pub state: OrderState,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Command for CreateOrderCommand {
    type Result = CreateOrderResult;

    #[instrument(skip(self, db_pool, event_sender), fields(actor = %self.actor))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            ORDER_CREATION_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;

        let saved = self.create_order(db_pool.as_ref()).await?;

        info!(
            order_id = %saved.order_id,
            quantity_kg = %saved.quantity_kg,
            "purchase order created"
        );

        if let Err(e) = event_sender
            .send(Event::OrderCreated {
                order_id: saved.order_id.clone(),
            })
            .await
        {
            return Err(ServiceError::EventError(e));
        }

        ORDER_CREATIONS.inc();

        Ok(CreateOrderResult {
            id: saved.id,
            order_id: saved.order_id,
            state: saved.state,
            created_at: saved.created_at,
        })
    }
}

impl CreateOrderCommand {
    async fn create_order(&self, db: &DbPool) -> Result<purchase_order::Model, ServiceError> {
        let order_id = ids::order_id();
        let quantity_kg = self.quantity_kg;
        let justification = self.justification.clone();
        let observations = self.observations.clone();
        let needed_by = self.needed_by.clone();
        let actor = self.actor.clone();

        db.transaction::<_, purchase_order::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                let now = Utc::now();
                let new_order = purchase_order::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id.clone()),
                    state: Set(OrderState::NecesidadEvaluada),
                    supplier: Set(None),
                    quantity_kg: Set(quantity_kg),
                    unit_cost: Set(None),
                    total_cost: Set(None),
                    delivery_days: Set(None),
                    justification: Set(justification.clone()),
                    observations: Set(observations),
                    needed_by: Set(needed_by),
                    requesting_user: Set(Some(actor.clone())),
                    approving_user: Set(None),
                    modifying_user: Set(None),
                    received_quantity_kg: Set(None),
                    discrepancy_status: Set(None),
                    discrepancy_ticket: Set(None),
                    ready_for_billing: Set(false),
                    created_at: Set(now),
                    updated_at: Set(Some(now)),
                    approved_at: Set(None),
                    rejected_at: Set(None),
                    version: Set(0),
                };

                let saved = new_order.insert(txn).await.map_err(|e| {
                    let msg = format!("Failed to create purchase order {}: {}", order_id, e);
                    error!("{}", msg);
                    ServiceError::db_error(e)
                })?;

                audit::append(
                    txn,
                    NewAuditEntry {
                        order_id: saved.order_id.clone(),
                        action: AuditAction::Created.to_string(),
                        actor,
                        description: "Purchase order created from need evaluation".to_string(),
                        previous_state: None,
                        new_state: Some(saved.state.to_string()),
                        details: None,
                    },
                )
                .await?;

                Ok(saved)
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }
}
