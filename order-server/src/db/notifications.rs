//! Notification Repository
//!
//! Rows addressed to a user carry `recipient_user_id`; admin broadcast rows
//! carry NULL. Every read/mark query is scoped with `recipient_user_id IS ?`
//! so a caller only ever touches its own pool of rows.

use super::RepoResult;
use shared::models::{Notification, UserId};
use sqlx::SqliteExecutor;

const NOTIFICATION_COLUMNS: &str = "id, recipient_user_id, notification_type, title, message, related_order_id, is_read, read_at, priority, created_at";

pub async fn insert<'e, E: SqliteExecutor<'e>>(executor: E, n: &Notification) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO notifications (id, recipient_user_id, notification_type, title, message, related_order_id, is_read, read_at, priority, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(n.id)
    .bind(n.recipient_user_id)
    .bind(n.notification_type)
    .bind(&n.title)
    .bind(&n.message)
    .bind(n.related_order_id)
    .bind(n.is_read)
    .bind(n.read_at)
    .bind(n.priority)
    .bind(n.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// `recipient = None` lists the admin broadcast pool
pub async fn list<'e, E: SqliteExecutor<'e>>(
    executor: E,
    recipient: Option<UserId>,
    unread_only: bool,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<Notification>> {
    let sql = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE recipient_user_id IS ? AND (? = 0 OR is_read = 0) ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let rows = sqlx::query_as::<_, Notification>(&sql)
        .bind(recipient)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

pub async fn unread_count<'e, E: SqliteExecutor<'e>>(
    executor: E,
    recipient: Option<UserId>,
) -> RepoResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE recipient_user_id IS ? AND is_read = 0",
    )
    .bind(recipient)
    .fetch_one(executor)
    .await?;
    Ok(count)
}

/// Returns `false` when no row with that id belongs to `recipient`.
/// Marking an already-read row keeps its original `read_at`.
pub async fn mark_read<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
    recipient: Option<UserId>,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = 1, read_at = COALESCE(read_at, ?) WHERE id = ? AND recipient_user_id IS ?",
    )
    .bind(now)
    .bind(id)
    .bind(recipient)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_all_read<'e, E: SqliteExecutor<'e>>(
    executor: E,
    recipient: Option<UserId>,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = 1, read_at = ? WHERE recipient_user_id IS ? AND is_read = 0",
    )
    .bind(now)
    .bind(recipient)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Delete read rows created before `cutoff` (epoch ms)
pub async fn purge_read_before<'e, E: SqliteExecutor<'e>>(executor: E, cutoff: i64) -> RepoResult<u64> {
    let result = sqlx::query("DELETE FROM notifications WHERE is_read = 1 AND created_at < ?")
        .bind(cutoff)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use shared::models::{NotificationPriority, NotificationType};

    fn row(id: i64, recipient: Option<i64>, created_at: i64) -> Notification {
        Notification {
            id,
            recipient_user_id: recipient.map(|r| UserId::new(r).unwrap()),
            notification_type: NotificationType::Info,
            title: "Order update".into(),
            message: "Your order is being prepared".into(),
            related_order_id: Some(42),
            is_read: false,
            read_at: None,
            priority: NotificationPriority::Low,
            created_at,
        }
    }

    #[tokio::test]
    async fn mark_read_is_recipient_scoped() {
        let pool = test_pool().await;
        insert(&pool, &row(1, Some(5), 10)).await.unwrap();
        insert(&pool, &row(2, None, 10)).await.unwrap();

        let other = UserId::new(6).ok();
        let owner = UserId::new(5).ok();
        assert!(!mark_read(&pool, 1, other, 20).await.unwrap());
        assert!(!mark_read(&pool, 2, owner, 20).await.unwrap());
        assert!(mark_read(&pool, 1, owner, 20).await.unwrap());
        assert!(mark_read(&pool, 2, None, 20).await.unwrap());

        assert_eq!(unread_count(&pool, owner).await.unwrap(), 0);
        assert_eq!(unread_count(&pool, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn admin_pool_and_user_rows_are_separate() {
        let pool = test_pool().await;
        insert(&pool, &row(1, Some(5), 10)).await.unwrap();
        insert(&pool, &row(2, None, 11)).await.unwrap();
        insert(&pool, &row(3, None, 12)).await.unwrap();

        let admin = list(&pool, None, false, 50, 0).await.unwrap();
        assert_eq!(admin.iter().map(|n| n.id).collect::<Vec<_>>(), vec![3, 2]);

        let user = list(&pool, UserId::new(5).ok(), false, 50, 0).await.unwrap();
        assert_eq!(user.len(), 1);
        assert_eq!(user[0].priority, NotificationPriority::Low);
    }

    #[tokio::test]
    async fn purge_only_removes_old_read_rows() {
        let pool = test_pool().await;
        insert(&pool, &row(1, Some(5), 10)).await.unwrap();
        insert(&pool, &row(2, Some(5), 10)).await.unwrap();
        insert(&pool, &row(3, Some(5), 1000)).await.unwrap();
        mark_all_read(&pool, UserId::new(5).ok(), 1001).await.unwrap();
        mark_read(&pool, 2, UserId::new(5).ok(), 1002).await.unwrap();

        sqlx::query("UPDATE notifications SET is_read = 0 WHERE id = 2")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(purge_read_before(&pool, 500).await.unwrap(), 1);
        let remaining = list(&pool, UserId::new(5).ok(), false, 50, 0).await.unwrap();
        assert_eq!(remaining.len(), 2);
    }
}
