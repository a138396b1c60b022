pub mod accept_order_command;
pub mod attach_offer_command;
pub mod create_order_command;
pub mod register_receipt_command;
pub mod report_discrepancy_command;
pub mod send_order_command;

pub use accept_order_command::{AcceptOrderCommand, AcceptOrderResult};
pub use attach_offer_command::{AttachOfferCommand, AttachOfferResult};
pub use create_order_command::{CreateOrderCommand, CreateOrderResult};
pub use register_receipt_command::{RegisterReceiptCommand, RegisterReceiptResult};
pub use report_discrepancy_command::{DiscrepancyOutcome, ReportDiscrepancyCommand};
pub use send_order_command::{SendOrderCommand, SendOrderResult};
