pub mod audit;
pub mod billing;
pub mod notifications;
pub mod orders;

pub use audit::AuditLedger;
pub use billing::BillingCalculator;
pub use orders::{OrderStore, PurchaseOrderService};
