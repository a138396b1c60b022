//! Best-effort supplier notifications.
//!
//! Delivery happens strictly after the lifecycle transaction commits and is
//! never allowed to fail the state machine: the facade logs failures and
//! moves on.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::errors::ServiceError;

#[async_trait]
pub trait SupplierNotifier: Send + Sync {
    async fn notify(&self, recipient: &str, subject: &str, body: &str)
        -> Result<(), ServiceError>;
}

/// Default notifier: writes the message to the log instead of delivering it.
/// Production deployments swap in a mail or supplier-API implementation.
pub struct LogNotifier;

#[async_trait]
impl SupplierNotifier for LogNotifier {
    async fn notify(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), ServiceError> {
        info!(recipient = %recipient, subject = %subject, "supplier notification\n{}", body);
        Ok(())
    }
}

pub fn dispatch_body(
    order_id: &str,
    supplier: &str,
    quantity_kg: i32,
    total_cost: Option<Decimal>,
) -> String {
    let mut body = format!(
        "Purchase order {} has been dispatched.\n\nSupplier: {}\nQuantity: {} kg\n",
        order_id, supplier, quantity_kg
    );
    if let Some(cost) = total_cost {
        body.push_str(&format!("Amount: ${}\n", cost));
    }
    body.push_str("\nPlease confirm reception and coordinate delivery with the purchasing department.\n");
    body
}

pub fn acceptance_body(order_id: &str, supplier: &str, quantity_kg: Option<i32>) -> String {
    let mut body = format!(
        "Order {} was received and accepted without discrepancies.\n\nSupplier: {}\n",
        order_id, supplier
    );
    if let Some(quantity) = quantity_kg {
        body.push_str(&format!("Quantity: {} kg\n", quantity));
    }
    body.push_str("\nThe order is now ready for invoicing.\n");
    body
}

pub fn discrepancy_body(
    ticket_id: &str,
    order_id: &str,
    supplier: &str,
    details: &str,
    kind: Option<&str>,
) -> String {
    let mut body = format!(
        "A discrepancy was detected in order {}.\n\nTicket: {}\nSupplier: {}\n",
        order_id, ticket_id, supplier
    );
    if let Some(kind) = kind {
        body.push_str(&format!("Type: {}\n", kind));
    }
    body.push_str(&format!(
        "\nDetails:\n{}\n\nPlease review the shipment and reply with an action plan referencing the ticket.\n",
        if details.is_empty() {
            "No additional description"
        } else {
            details
        }
    ));
    body
}
