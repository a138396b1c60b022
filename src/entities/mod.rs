pub mod audit_entry;
pub mod purchase_order;

pub use audit_entry::AuditAction;
pub use purchase_order::OrderState;
