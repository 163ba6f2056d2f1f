//! Processed webhook event markers (idempotency)

use super::RepoResult;
use sqlx::SqliteExecutor;

/// Record `event_id` as processed. `false` means it was already recorded.
///
/// Must run in the same transaction as the state change it guards, so a
/// rollback also forgets the marker.
pub async fn try_mark_processed<'e, E: SqliteExecutor<'e>>(
    executor: E,
    event_id: &str,
    event_type: &str,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "INSERT INTO processed_webhook_events (event_id, event_type, processed_at) VALUES (?, ?, ?) ON CONFLICT DO NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn second_mark_reports_duplicate() {
        let pool = test_pool().await;
        assert!(try_mark_processed(&pool, "evt_1", "charge.refunded", 1).await.unwrap());
        assert!(!try_mark_processed(&pool, "evt_1", "charge.refunded", 2).await.unwrap());
    }

    #[tokio::test]
    async fn rolled_back_marker_is_forgotten() {
        let pool = test_pool().await;
        let mut tx = pool.begin().await.unwrap();
        assert!(try_mark_processed(&mut *tx, "evt_2", "x", 1).await.unwrap());
        tx.rollback().await.unwrap();

        assert!(try_mark_processed(&pool, "evt_2", "x", 2).await.unwrap());
    }
}
