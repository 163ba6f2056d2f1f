//! Event vocabulary and priority rules

use serde::Serialize;
use shared::models::{NotificationPriority, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDomain {
    Order,
    Payment,
    Reservation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Created,
    Preparing,
    EnRoute,
    Delivered,
    Cancelled,
    Confirmed,
    Completed,
    Succeeded,
    Failed,
    Refunded,
}

impl From<OrderStatus> for EventAction {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Received => Self::Created,
            OrderStatus::Preparing => Self::Preparing,
            OrderStatus::EnRoute => Self::EnRoute,
            OrderStatus::Delivered => Self::Delivered,
            OrderStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// Priority of a notification, from what happened and nothing else.
pub fn priority_for(domain: EventDomain, action: EventAction) -> NotificationPriority {
    use EventAction::*;
    if domain == EventDomain::Payment || action == Cancelled {
        return NotificationPriority::High;
    }
    match action {
        Created | Delivered | Confirmed | Completed => NotificationPriority::Medium,
        _ => NotificationPriority::Low,
    }
}
