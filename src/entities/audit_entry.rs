use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actions the lifecycle itself emits. The `action` column stays an open
/// string so callers may record additional actions through the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum AuditAction {
    #[strum(serialize = "CREATED")]
    Created,
    #[strum(serialize = "OFFER_SELECTED")]
    OfferSelected,
    #[strum(serialize = "SENT")]
    Sent,
    #[strum(serialize = "RECEIVED")]
    Received,
    #[strum(serialize = "ACCEPTED")]
    Accepted,
    #[strum(serialize = "DISCREPANCY_NOTIFIED")]
    DiscrepancyNotified,
}

/// The `audit_entries` table: append-only trail of state-changing actions.
/// Entries are never updated or deleted, and retrieval is always newest
/// first. `order_id` is intentionally not a foreign key; actions may be
/// audited under identifiers that are not (yet) persisted orders.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub order_id: String,
    pub action: String,
    pub actor: String,
    pub description: String,

    pub previous_state: Option<String>,
    pub new_state: Option<String>,

    /// Free-form JSON payload with extra context.
    pub details: Option<String>,

    /// Set at insertion, never backdated.
    pub timestamp: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
