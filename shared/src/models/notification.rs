//! Notification Model

use serde::{Deserialize, Serialize};

use super::user::UserId;

/// Visual class of a notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum NotificationType {
    Success,
    #[default]
    Info,
    Warning,
    Error,
}

impl NotificationType {
    /// Lenient parse used for generator output
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Some(Self::Success),
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Notification priority, stored as 1..=3
#[repr(i32)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
pub enum NotificationPriority {
    Low = 1,
    Medium = 2,
    High = 3,
}

/// Persisted notification
///
/// `recipient_user_id = None` marks an admin broadcast row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Notification {
    pub id: i64,
    pub recipient_user_id: Option<UserId>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_order_id: Option<i64>,
    pub is_read: bool,
    pub read_at: Option<i64>,
    pub priority: NotificationPriority,
    pub created_at: i64,
}

/// Addressee of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    User(UserId),
    AdminBroadcast,
}

impl Recipient {
    pub fn user_id(self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::AdminBroadcast => None,
        }
    }
}

/// Unread counter response
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_and_serializes() {
        assert!(NotificationPriority::High > NotificationPriority::Medium);
        assert_eq!(
            serde_json::to_string(&NotificationPriority::Medium).unwrap(),
            "\"medium\""
        );
        assert_eq!(NotificationPriority::High as i32, 3);
    }

    #[test]
    fn type_parse_is_lenient() {
        assert_eq!(NotificationType::parse(" Success "), Some(NotificationType::Success));
        assert_eq!(NotificationType::parse("urgent"), None);
    }
}
