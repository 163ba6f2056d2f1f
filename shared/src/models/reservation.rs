//! Reservation Model

use serde::{Deserialize, Serialize};

use super::user::UserId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

/// Reservation entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Reservation {
    pub id: i64,
    pub user_id: UserId,
    pub party_size: i64,
    /// Reserved slot (epoch ms)
    pub reserved_for: i64,
    pub note: Option<String>,
    pub status: ReservationStatus,
    /// Deposit in cents, 0 when none is required
    pub deposit_cents: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create reservation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    pub party_size: i64,
    pub reserved_for: i64,
    pub note: Option<String>,
    #[serde(default)]
    pub deposit_cents: i64,
}
