//! Generated identifiers for orders, receipts and discrepancy tickets.
//!
//! Formats are part of the contract with the orchestrator and must stay
//! stable: `OC-<year>-<8 hex>` for orders, `REC-<year>-<8 hex>` for
//! receipts, `DISC-<timestamp>-<4 digits>` for discrepancy tickets.

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

const ORDER_PREFIX: &str = "OC";
const RECEIPT_PREFIX: &str = "REC";

fn token() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Generates a unique purchase-order identifier, e.g. `OC-2026-9F41C30A`.
pub fn order_id() -> String {
    format!("{}-{}-{}", ORDER_PREFIX, Utc::now().format("%Y"), token())
}

/// Generates a unique receipt identifier, e.g. `REC-2026-0B77D2E1`.
pub fn receipt_id() -> String {
    format!("{}-{}-{}", RECEIPT_PREFIX, Utc::now().format("%Y"), token())
}

/// Generates a discrepancy ticket, e.g. `DISC-20260824153000-0042`.
pub fn discrepancy_ticket() -> String {
    let now = Utc::now();
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("DISC-{}-{:04}", now.format("%Y%m%d%H%M%S"), suffix)
}

/// Fallback identifier used when a receipt arrives without a resolvable
/// order id and the synthetic-id policy is enabled.
pub fn synthetic_order_id() -> String {
    format!("ORD_{}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_matches_documented_format() {
        let id = order_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "OC");
        assert_eq!(parts[1].len(), 4);
        assert!(parts[1].parse::<u16>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn order_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1_000 {
            assert!(seen.insert(order_id()));
        }
    }

    #[test]
    fn discrepancy_ticket_matches_documented_format() {
        let ticket = discrepancy_ticket();
        let parts: Vec<&str> = ticket.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "DISC");
        assert_eq!(parts[1].len(), 14);
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].parse::<u16>().is_ok());
    }

    #[test]
    fn synthetic_order_id_carries_timestamp() {
        let id = synthetic_order_id();
        assert!(id.starts_with("ORD_"));
        assert!(id[4..].parse::<i64>().is_ok());
    }
}
