//! Data models
//!
//! Shared between order-server and its clients (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` snowflakes, all timestamps epoch milliseconds.

pub mod notification;
pub mod order;
pub mod payment;
pub mod product;
pub mod reservation;
pub mod user;

// Re-exports
pub use notification::*;
pub use order::*;
pub use payment::*;
pub use product::*;
pub use reservation::*;
pub use user::*;
