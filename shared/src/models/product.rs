//! Product Model
//!
//! Catalog rows are owned by the catalog service; this crate only reads them.

use serde::{Deserialize, Serialize};

/// Product entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Price in cents
    pub price_cents: i64,
    pub is_active: bool,
}
