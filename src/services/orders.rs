use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder,
};
use tracing::{info, instrument, warn};

use crate::{
    commands::{
        orders::{
            AcceptOrderCommand, AcceptOrderResult, AttachOfferCommand, AttachOfferResult,
            CreateOrderCommand, CreateOrderResult, DiscrepancyOutcome, RegisterReceiptCommand,
            RegisterReceiptResult, ReportDiscrepancyCommand, SendOrderCommand, SendOrderResult,
        },
        Command,
    },
    db::DbPool,
    entities::purchase_order::{self, Entity as PurchaseOrderEntity, OrderState},
    errors::ServiceError,
    events::EventSender,
    services::notifications::{self, SupplierNotifier},
};

/// Dumb persistence port over the purchase_orders table. No business rules
/// live here; the lifecycle commands own validation and transitions.
#[derive(Clone)]
pub struct OrderStore {
    db: Arc<DbPool>,
}

impl OrderStore {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn find_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<purchase_order::Model>, ServiceError> {
        Self::find_by_order_id_on(self.db.as_ref(), order_id).await
    }

    pub async fn find_by_state(
        &self,
        state: OrderState,
    ) -> Result<Vec<purchase_order::Model>, ServiceError> {
        PurchaseOrderEntity::find()
            .filter(purchase_order::Column::State.eq(state))
            .order_by_desc(purchase_order::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn find_by_requester(
        &self,
        requester: &str,
    ) -> Result<Vec<purchase_order::Model>, ServiceError> {
        PurchaseOrderEntity::find()
            .filter(purchase_order::Column::RequestingUser.eq(requester))
            .order_by_desc(purchase_order::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn save(
        &self,
        active: purchase_order::ActiveModel,
    ) -> Result<purchase_order::Model, ServiceError> {
        Self::save_on(self.db.as_ref(), active).await
    }

    /// Lookup on an explicit connection, usable inside a lifecycle
    /// transaction.
    pub async fn find_by_order_id_on<C: ConnectionTrait>(
        conn: &C,
        order_id: &str,
    ) -> Result<Option<purchase_order::Model>, ServiceError> {
        PurchaseOrderEntity::find()
            .filter(purchase_order::Column::OrderId.eq(order_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Persists a mutation on an explicit connection: refreshes `updated_at`
    /// and bumps the optimistic-lock version.
    pub async fn save_on<C: ConnectionTrait>(
        conn: &C,
        mut active: purchase_order::ActiveModel,
    ) -> Result<purchase_order::Model, ServiceError> {
        active.updated_at = Set(Some(Utc::now()));
        let current_version = *active.version.as_ref();
        active.version = Set(current_version + 1);
        active.update(conn).await.map_err(ServiceError::db_error)
    }
}

/// Facade the orchestrator adapter talks to. Wraps the lifecycle commands,
/// owns the post-commit best-effort notifications, and applies the
/// "never fail the step" policy where the contract demands it.
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn SupplierNotifier>,
    store: OrderStore,
    allow_synthetic_order_ids: bool,
}

impl PurchaseOrderService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn SupplierNotifier>,
        allow_synthetic_order_ids: bool,
    ) -> Self {
        let store = OrderStore::new(db.clone());
        Self {
            db,
            event_sender,
            notifier,
            store,
            allow_synthetic_order_ids,
        }
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    /// Creates a new purchase order from an evaluated need.
    #[instrument(skip(self, command))]
    pub async fn create_order(
        &self,
        command: CreateOrderCommand,
    ) -> Result<CreateOrderResult, ServiceError> {
        command
            .execute(self.db.clone(), self.event_sender.clone())
            .await
    }

    /// Attaches the selected supplier offer to an order.
    #[instrument(skip(self, command))]
    pub async fn attach_offer(
        &self,
        command: AttachOfferCommand,
    ) -> Result<AttachOfferResult, ServiceError> {
        command
            .execute(self.db.clone(), self.event_sender.clone())
            .await
    }

    /// Sends the order to the supplier. The notification is dispatched
    /// after the transaction commits and is best-effort only.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn send_order(
        &self,
        order_id: &str,
        actor: &str,
    ) -> Result<SendOrderResult, ServiceError> {
        let command = SendOrderCommand {
            order_id: order_id.to_string(),
            actor: actor.to_string(),
        };
        let result = command
            .execute(self.db.clone(), self.event_sender.clone())
            .await?;

        let body = notifications::dispatch_body(
            &result.order_id,
            &result.supplier,
            result.quantity_kg,
            result.total_cost,
        );
        self.notify_best_effort(
            &result.supplier,
            &format!("Purchase order dispatched: {}", result.order_id),
            &body,
        )
        .await;

        Ok(result)
    }

    /// Registers reception of the goods for an order.
    #[instrument(skip(self, command))]
    pub async fn register_receipt(
        &self,
        mut command: RegisterReceiptCommand,
    ) -> Result<RegisterReceiptResult, ServiceError> {
        command.allow_synthetic_id = self.allow_synthetic_order_ids;
        command
            .execute(self.db.clone(), self.event_sender.clone())
            .await
    }

    /// Accepts a received order and marks it ready for billing.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn accept_order(
        &self,
        order_id: &str,
        actor: &str,
    ) -> Result<AcceptOrderResult, ServiceError> {
        let command = AcceptOrderCommand {
            order_id: order_id.to_string(),
            actor: actor.to_string(),
        };
        let result = command
            .execute(self.db.clone(), self.event_sender.clone())
            .await?;

        let body = notifications::acceptance_body(
            &result.order_id,
            &result.supplier,
            result.quantity_kg,
        );
        self.notify_best_effort(
            &result.supplier,
            &format!("Order accepted: {}", result.order_id),
            &body,
        )
        .await;

        Ok(result)
    }

    /// Reports a discrepancy on a received order. This is the one
    /// best-effort lifecycle operation: it never returns an error, so the
    /// surrounding workflow step always completes. Failures are encoded in
    /// the outcome payload instead.
    #[instrument(skip(self, command), fields(order_id = %command.order_id))]
    pub async fn report_discrepancy(&self, command: ReportDiscrepancyCommand) -> DiscrepancyOutcome {
        let details = command.details.clone();
        let kind = command.kind.clone();

        match command
            .execute(self.db.clone(), self.event_sender.clone())
            .await
        {
            Ok(outcome) => {
                if let (Some(ticket), true) = (&outcome.ticket_id, outcome.success) {
                    let supplier = outcome
                        .supplier
                        .clone()
                        .unwrap_or_else(|| "NOT_SPECIFIED".to_string());
                    let body = notifications::discrepancy_body(
                        ticket,
                        &outcome.order_id,
                        &supplier,
                        &details,
                        kind.as_deref(),
                    );
                    self.notify_best_effort(
                        &supplier,
                        &format!("Discrepancy in order: {}", outcome.order_id),
                        &body,
                    )
                    .await;
                }
                outcome
            }
            Err(err) => {
                warn!("discrepancy report failed: {}", err);
                DiscrepancyOutcome::failure(err.to_string())
            }
        }
    }

    /// Fetches the current snapshot of one order.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: &str) -> Result<purchase_order::Model, ServiceError> {
        self.store
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn notify_best_effort(&self, recipient: &str, subject: &str, body: &str) {
        match self.notifier.notify(recipient, subject, body).await {
            Ok(()) => info!(recipient = %recipient, "supplier notification delivered"),
            Err(err) => {
                // Downstream notification failures must never block the
                // state machine; the transition already committed.
                warn!(recipient = %recipient, "supplier notification failed: {}", err);
            }
        }
    }
}
