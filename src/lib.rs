//! Purchase-order lifecycle and billing core for a municipal gas utility.
//!
//! The crate exposes the lifecycle operations an external workflow
//! orchestrator drives over HTTP: creating an order from an evaluated need,
//! attaching the selected supplier offer, sending the order, registering
//! reception, and closing with either acceptance or a discrepancy ticket.
//! Every state change lands in an append-only audit ledger within the same
//! transaction. A stateless billing calculator converts meter readings into
//! payable totals under mutually exclusive subsidy/contribution regimes.

pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod ids;
pub mod migrator;
pub mod services;

pub use config::{load_config, AppConfig};
pub use db::DbPool;
pub use errors::ServiceError;
pub use handlers::{app_router, AppState};
