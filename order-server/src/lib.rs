//! order-server: order lifecycle and notification fan-out engine
//!
//! - Order transaction manager: catalog-priced, all-or-nothing order creation
//!   and guarded status transitions
//! - Payment webhook reconciler: signed gateway events applied idempotently
//! - Notification dispatch engine: persisted rows plus realtime push
//! - Connection registry: one live WebSocket session per user

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod live;
pub mod logger;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod reservations;
pub mod state;
pub mod validation;

pub use api::build_app;
pub use config::Config;
pub use state::AppState;
