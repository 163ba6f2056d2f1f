//! Payment Model

use serde::{Deserialize, Serialize};

use super::user::UserId;

/// Payment row status
///
/// Status only moves forward by [`PaymentStatus::rank`]; gateway events may
/// arrive out of order and a lower-ranked event must not overwrite a higher one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum PaymentStatus {
    Pending,
    Failed,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Failed => 1,
            Self::Paid => 2,
            Self::Refunded => 3,
        }
    }

    pub fn can_advance_to(self, next: PaymentStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }
}

/// Payment entity (one row per gateway transaction)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: i64,
    pub user_id: UserId,
    pub order_id: Option<i64>,
    pub reservation_id: Option<i64>,
    /// Gateway transaction id (payment intent), unique
    pub gateway_txn_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Gateway checkout session handed back to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_is_forward_only() {
        assert!(PaymentStatus::Pending.can_advance_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Failed.can_advance_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Paid.can_advance_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Paid.can_advance_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Paid.can_advance_to(PaymentStatus::Paid));
        assert!(!PaymentStatus::Refunded.can_advance_to(PaymentStatus::Paid));
    }
}
