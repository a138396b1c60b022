use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states of a purchase order. The string values are the wire
/// vocabulary shared with the workflow orchestrator and must not change.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OrderState {
    #[sea_orm(string_value = "NECESIDAD_EVALUADA")]
    #[strum(serialize = "NECESIDAD_EVALUADA")]
    #[serde(rename = "NECESIDAD_EVALUADA")]
    NecesidadEvaluada,

    #[sea_orm(string_value = "OFERTA_SELECCIONADA")]
    #[strum(serialize = "OFERTA_SELECCIONADA")]
    #[serde(rename = "OFERTA_SELECCIONADA")]
    OfertaSeleccionada,

    #[sea_orm(string_value = "ORDEN_ENVIADA")]
    #[strum(serialize = "ORDEN_ENVIADA")]
    #[serde(rename = "ORDEN_ENVIADA")]
    OrdenEnviada,

    #[sea_orm(string_value = "PEDIDO_RECIBIDO")]
    #[strum(serialize = "PEDIDO_RECIBIDO")]
    #[serde(rename = "PEDIDO_RECIBIDO")]
    PedidoRecibido,

    #[sea_orm(string_value = "ACEPTADA")]
    #[strum(serialize = "ACEPTADA")]
    #[serde(rename = "ACEPTADA")]
    Aceptada,

    /// Used as audit transition context when a discrepancy is notified; the
    /// persisted `state` column keeps PEDIDO_RECIBIDO and the discrepancy is
    /// tracked through the side attributes.
    #[sea_orm(string_value = "DISCREPANCIA_DETECTADA")]
    #[strum(serialize = "DISCREPANCIA_DETECTADA")]
    #[serde(rename = "DISCREPANCIA_DETECTADA")]
    DiscrepanciaDetectada,
}

impl OrderState {
    /// Validates if a state transition is allowed. Transitions are monotonic;
    /// no operation may move an order backward. Retrying into the current
    /// state is tolerated so orchestrator-driven retries stay safe.
    pub fn can_transition_to(self, next: OrderState) -> bool {
        match (self, next) {
            (OrderState::NecesidadEvaluada, OrderState::OfertaSeleccionada) => true,
            (OrderState::OfertaSeleccionada, OrderState::OrdenEnviada) => true,
            (OrderState::OrdenEnviada, OrderState::PedidoRecibido) => true,

            // Mutually exclusive branches out of PEDIDO_RECIBIDO
            (OrderState::PedidoRecibido, OrderState::Aceptada) => true,
            (OrderState::PedidoRecibido, OrderState::DiscrepanciaDetectada) => true,

            // Retrying the same step is a no-op, not an error
            _ if self == next => true,

            _ => false,
        }
    }
}

/// The `purchase_orders` table: one row per order, holding the current
/// state snapshot. Rows are never deleted; terminal states are logical.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Business identifier, format `OC-<year>-<8-char token>`. Assigned
    /// exactly once at creation and never reused.
    #[sea_orm(unique)]
    pub order_id: String,

    pub state: OrderState,

    /// Supplier name, set once an offer is selected.
    pub supplier: Option<String>,

    /// Estimated gas quantity in kilograms. Always positive.
    pub quantity_kg: i32,

    pub unit_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub delivery_days: Option<i32>,

    pub justification: String,
    pub observations: Option<String>,
    pub needed_by: Option<String>,

    /// Identity fields supplied by the caller at each transition,
    /// never inferred from any ambient authentication context.
    pub requesting_user: Option<String>,
    pub approving_user: Option<String>,
    pub modifying_user: Option<String>,

    pub received_quantity_kg: Option<i32>,

    /// Discrepancy side attributes; the `state` column is not affected by a
    /// discrepancy notification.
    pub discrepancy_status: Option<String>,
    pub discrepancy_ticket: Option<String>,

    pub ready_for_billing: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,

    /// Optimistic-lock counter, incremented on every mutation.
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_monotonic() {
        assert!(OrderState::NecesidadEvaluada.can_transition_to(OrderState::OfertaSeleccionada));
        assert!(OrderState::OfertaSeleccionada.can_transition_to(OrderState::OrdenEnviada));
        assert!(OrderState::OrdenEnviada.can_transition_to(OrderState::PedidoRecibido));
        assert!(OrderState::PedidoRecibido.can_transition_to(OrderState::Aceptada));

        // Backward moves are refused
        assert!(!OrderState::OrdenEnviada.can_transition_to(OrderState::NecesidadEvaluada));
        assert!(!OrderState::Aceptada.can_transition_to(OrderState::PedidoRecibido));
        // Skipping ahead is refused
        assert!(!OrderState::NecesidadEvaluada.can_transition_to(OrderState::OrdenEnviada));
        assert!(!OrderState::OfertaSeleccionada.can_transition_to(OrderState::Aceptada));
    }

    #[test]
    fn retrying_the_current_state_is_allowed() {
        assert!(OrderState::PedidoRecibido.can_transition_to(OrderState::PedidoRecibido));
    }

    #[test]
    fn wire_values_are_stable() {
        assert_eq!(
            OrderState::NecesidadEvaluada.to_string(),
            "NECESIDAD_EVALUADA"
        );
        assert_eq!(
            OrderState::DiscrepanciaDetectada.to_string(),
            "DISCREPANCIA_DETECTADA"
        );
    }
}
