use shared::error::{AppError, ErrorCode};
use shared::models::{OrderStatus, UserId};
use thiserror::Error;

use crate::db::RepoError;

/// Order transaction manager errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    InvalidInput(AppError),

    #[error("Order has no items")]
    Empty,

    #[error("Product {0} is unavailable")]
    ProductUnavailable(i64),

    #[error("Order {0} not found")]
    NotFound(i64),

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order {0} was changed by someone else")]
    Conflict(i64),

    #[error("Transaction failed: {0}")]
    Storage(#[from] RepoError),
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        OrderError::Storage(RepoError::Database(e))
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::InvalidInput(err) => err,
            OrderError::Empty => AppError::new(ErrorCode::OrderEmpty),
            OrderError::ProductUnavailable(id) => {
                AppError::with_message(ErrorCode::ProductUnavailable, e.to_string())
                    .with_detail("product_id", id)
            }
            OrderError::NotFound(id) => {
                AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", id)
            }
            OrderError::UserNotFound(id) => {
                AppError::new(ErrorCode::UserNotFound).with_detail("user_id", id.get())
            }
            OrderError::InvalidTransition { from, to } => {
                AppError::with_message(ErrorCode::InvalidTransition, e.to_string())
                    .with_detail("from", from.as_str())
                    .with_detail("to", to.as_str())
            }
            OrderError::Conflict(id) => {
                AppError::new(ErrorCode::OrderStatusConflict).with_detail("order_id", id)
            }
            OrderError::Storage(err) => {
                tracing::error!(error = %err, "Order transaction failed");
                AppError::database("Order transaction failed")
            }
        }
    }
}
