use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::audit_entry::{self, Entity as AuditEntryEntity},
    errors::ServiceError,
};

/// Input for one ledger append. The id and timestamp are generated at
/// insertion; callers never control them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub order_id: String,
    pub action: String,
    pub actor: String,
    pub description: String,
    pub previous_state: Option<String>,
    pub new_state: Option<String>,
    pub details: Option<String>,
}

impl NewAuditEntry {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.order_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Audit entry requires an order id".into(),
            ));
        }
        if self.action.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Audit entry requires an action".into(),
            ));
        }
        if self.actor.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Audit entry requires an actor".into(),
            ));
        }
        Ok(())
    }
}

/// Appends an entry on the given connection. Lifecycle commands call this
/// inside their own transaction so the order mutation and its audit entry
/// commit (or roll back) together.
pub async fn append<C: ConnectionTrait>(
    conn: &C,
    entry: NewAuditEntry,
) -> Result<audit_entry::Model, ServiceError> {
    entry.validate()?;

    let model = audit_entry::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(entry.order_id),
        action: Set(entry.action),
        actor: Set(entry.actor),
        description: Set(entry.description),
        previous_state: Set(entry.previous_state),
        new_state: Set(entry.new_state),
        details: Set(entry.details),
        timestamp: Set(Utc::now()),
    };

    let saved = model.insert(conn).await.map_err(ServiceError::db_error)?;
    debug!(
        audit_id = %saved.id,
        order_id = %saved.order_id,
        action = %saved.action,
        "audit entry appended"
    );
    Ok(saved)
}

/// Aggregated view of one order's trail: counts per action plus the first
/// and last entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAuditSummary {
    pub order_id: String,
    pub total_entries: u64,
    pub actions: Vec<ActionCount>,
    pub first_entry: Option<audit_entry::Model>,
    pub last_entry: Option<audit_entry::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCount {
    pub action: String,
    pub count: u64,
}

/// Append-only ledger over the audit_entries table. Entries are never
/// updated or deleted; every read returns newest-first ordering.
#[derive(Clone)]
pub struct AuditLedger {
    db: Arc<DbPool>,
}

impl AuditLedger {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Appends a standalone entry outside any lifecycle transaction.
    #[instrument(skip(self, entry), fields(order_id = %entry.order_id, action = %entry.action))]
    pub async fn append(&self, entry: NewAuditEntry) -> Result<audit_entry::Model, ServiceError> {
        let saved = append(self.db.as_ref(), entry).await?;
        info!(audit_id = %saved.id, "audit entry recorded");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn history_for_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<audit_entry::Model>, ServiceError> {
        self.require_non_blank(order_id, "order id")?;
        AuditEntryEntity::find()
            .filter(audit_entry::Column::OrderId.eq(order_id))
            .order_by_desc(audit_entry::Column::Timestamp)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn history_for_action(
        &self,
        action: &str,
    ) -> Result<Vec<audit_entry::Model>, ServiceError> {
        self.require_non_blank(action, "action")?;
        AuditEntryEntity::find()
            .filter(audit_entry::Column::Action.eq(action))
            .order_by_desc(audit_entry::Column::Timestamp)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn history_for_actor(
        &self,
        actor: &str,
    ) -> Result<Vec<audit_entry::Model>, ServiceError> {
        self.require_non_blank(actor, "actor")?;
        AuditEntryEntity::find()
            .filter(audit_entry::Column::Actor.eq(actor))
            .order_by_desc(audit_entry::Column::Timestamp)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn history_for_order_and_action(
        &self,
        order_id: &str,
        action: &str,
    ) -> Result<Vec<audit_entry::Model>, ServiceError> {
        self.require_non_blank(order_id, "order id")?;
        self.require_non_blank(action, "action")?;
        AuditEntryEntity::find()
            .filter(audit_entry::Column::OrderId.eq(order_id))
            .filter(audit_entry::Column::Action.eq(action))
            .order_by_desc(audit_entry::Column::Timestamp)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn history_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<audit_entry::Model>, ServiceError> {
        if start > end {
            return Err(ServiceError::ValidationError(
                "Range start must not be after range end".into(),
            ));
        }
        AuditEntryEntity::find()
            .filter(audit_entry::Column::Timestamp.gte(start))
            .filter(audit_entry::Column::Timestamp.lte(end))
            .order_by_desc(audit_entry::Column::Timestamp)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn count_for_order(&self, order_id: &str) -> Result<u64, ServiceError> {
        self.require_non_blank(order_id, "order id")?;
        AuditEntryEntity::find()
            .filter(audit_entry::Column::OrderId.eq(order_id))
            .count(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Builds the aggregated per-order view backing `GetOrderSummary`.
    #[instrument(skip(self))]
    pub async fn order_summary(&self, order_id: &str) -> Result<OrderAuditSummary, ServiceError> {
        let history = self.history_for_order(order_id).await?;

        let mut actions: Vec<ActionCount> = Vec::new();
        for entry in &history {
            match actions.iter_mut().find(|a| a.action == entry.action) {
                Some(existing) => existing.count += 1,
                None => actions.push(ActionCount {
                    action: entry.action.clone(),
                    count: 1,
                }),
            }
        }

        // History is newest-first, so the chronological first entry is last.
        let first_entry = history.last().cloned();
        let last_entry = history.first().cloned();

        Ok(OrderAuditSummary {
            order_id: order_id.to_string(),
            total_entries: history.len() as u64,
            actions,
            first_entry,
            last_entry,
        })
    }

    fn require_non_blank(&self, value: &str, what: &str) -> Result<(), ServiceError> {
        if value.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "The {} is required",
                what
            )));
        }
        Ok(())
    }
}
