//! Order Repository

use super::RepoResult;
use shared::models::{Order, OrderLine, OrderPaymentStatus, OrderStatus, UserId};
use sqlx::SqliteExecutor;

const ORDER_COLUMNS: &str = "id, user_id, status, payment_status, total_cents, delivery_location, latitude, longitude, created_at, updated_at";

/// Row for a freshly created order; the total is filled in from its lines.
pub struct NewOrder<'a> {
    pub id: i64,
    pub user_id: UserId,
    pub delivery_location: &'a str,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub now: i64,
}

pub async fn insert<'e, E: SqliteExecutor<'e>>(executor: E, order: &NewOrder<'_>) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO orders (id, user_id, status, payment_status, total_cents, delivery_location, latitude, longitude, created_at, updated_at) VALUES (?1, ?2, 'received', 'unpaid', 0, ?3, ?4, ?5, ?6, ?6)",
    )
    .bind(order.id)
    .bind(order.user_id)
    .bind(order.delivery_location)
    .bind(order.latitude)
    .bind(order.longitude)
    .bind(order.now)
    .execute(executor)
    .await?;
    Ok(())
}

/// Insert one line, snapshotting name and price from the catalog row in the
/// same statement. Returns `false` when the product is missing or inactive.
pub async fn insert_line_from_catalog<'e, E: SqliteExecutor<'e>>(
    executor: E,
    line_id: i64,
    order_id: i64,
    product_id: i64,
    quantity: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "INSERT INTO order_lines (id, order_id, product_id, product_name, quantity, unit_price_cents) SELECT ?1, ?2, p.id, p.name, ?3, p.price_cents FROM products p WHERE p.id = ?4 AND p.is_active = 1",
    )
    .bind(line_id)
    .bind(order_id)
    .bind(quantity)
    .bind(product_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Set `total_cents` from the persisted lines and return it
pub async fn settle_total<'e, E: SqliteExecutor<'e>>(executor: E, order_id: i64) -> RepoResult<i64> {
    let total: i64 = sqlx::query_scalar(
        "UPDATE orders SET total_cents = (SELECT COALESCE(SUM(unit_price_cents * quantity), 0) FROM order_lines WHERE order_id = ?1) WHERE id = ?1 RETURNING total_cents",
    )
    .bind(order_id)
    .fetch_one(executor)
    .await?;
    Ok(total)
}

pub async fn find_by_id<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> RepoResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
    let row = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn find_lines<'e, E: SqliteExecutor<'e>>(
    executor: E,
    order_id: i64,
) -> RepoResult<Vec<OrderLine>> {
    let rows = sqlx::query_as::<_, OrderLine>(
        "SELECT id, order_id, product_id, product_name, quantity, unit_price_cents FROM order_lines WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

pub async fn list_by_user<'e, E: SqliteExecutor<'e>>(
    executor: E,
    user_id: UserId,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<Order>> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let rows = sqlx::query_as::<_, Order>(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

/// Back-office listing, optionally filtered by status
pub async fn list_all<'e, E: SqliteExecutor<'e>>(
    executor: E,
    status: Option<OrderStatus>,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<Order>> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
    );
    let rows = sqlx::query_as::<_, Order>(&sql)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

/// Compare-and-set status move. `false` means the row no longer has `from`.
pub async fn compare_and_set_status<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
    from: OrderStatus,
    to: OrderStatus,
    now: i64,
) -> RepoResult<bool> {
    let result =
        sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(to)
            .bind(now)
            .bind(id)
            .bind(from)
            .execute(executor)
            .await?;
    Ok(result.rows_affected() == 1)
}

/// Absolute set of the payment flag; refunded is never downgraded to paid.
pub async fn set_payment_status<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
    status: OrderPaymentStatus,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE orders SET payment_status = ?1, updated_at = ?2 WHERE id = ?3 AND NOT (payment_status = 'refunded' AND ?1 <> 'refunded')",
    )
    .bind(status)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::db::test_pool;

    async fn order_with_line(pool: &sqlx::SqlitePool) -> i64 {
        seed_user(pool, 1, "Ana", None).await;
        seed_product(pool, 10, "Burger", 1000, true).await;
        let user = UserId::new(1).unwrap();
        insert(
            pool,
            &NewOrder {
                id: 100,
                user_id: user,
                delivery_location: "Calle Mayor 1",
                latitude: None,
                longitude: None,
                now: 1,
            },
        )
        .await
        .unwrap();
        assert!(insert_line_from_catalog(pool, 1000, 100, 10, 2).await.unwrap());
        100
    }

    #[tokio::test]
    async fn line_insert_skips_inactive_products() {
        let pool = test_pool().await;
        let order_id = order_with_line(&pool).await;
        seed_product(&pool, 11, "Retired", 500, false).await;

        assert!(!insert_line_from_catalog(&pool, 1001, order_id, 11, 1).await.unwrap());
        assert!(!insert_line_from_catalog(&pool, 1002, order_id, 99, 1).await.unwrap());
        assert_eq!(find_lines(&pool, order_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settle_total_sums_snapshots() {
        let pool = test_pool().await;
        let order_id = order_with_line(&pool).await;
        assert_eq!(settle_total(&pool, order_id).await.unwrap(), 2000);

        set_price(&pool, 10, 9999).await;
        assert_eq!(settle_total(&pool, order_id).await.unwrap(), 2000);
    }

    #[tokio::test]
    async fn compare_and_set_detects_stale_read() {
        let pool = test_pool().await;
        let order_id = order_with_line(&pool).await;

        assert!(
            compare_and_set_status(&pool, order_id, OrderStatus::Received, OrderStatus::Preparing, 2)
                .await
                .unwrap()
        );
        assert!(
            !compare_and_set_status(&pool, order_id, OrderStatus::Received, OrderStatus::Cancelled, 3)
                .await
                .unwrap()
        );
        let order = find_by_id(&pool, order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Preparing);
    }

    #[tokio::test]
    async fn refunded_flag_is_not_downgraded() {
        let pool = test_pool().await;
        let order_id = order_with_line(&pool).await;

        assert!(set_payment_status(&pool, order_id, OrderPaymentStatus::Refunded, 2).await.unwrap());
        assert!(!set_payment_status(&pool, order_id, OrderPaymentStatus::Paid, 3).await.unwrap());
        let order = find_by_id(&pool, order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, OrderPaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn list_all_filters_by_status() {
        let pool = test_pool().await;
        order_with_line(&pool).await;

        let received = list_all(&pool, Some(OrderStatus::Received), 50, 0).await.unwrap();
        let delivered = list_all(&pool, Some(OrderStatus::Delivered), 50, 0).await.unwrap();
        let everything = list_all(&pool, None, 50, 0).await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(delivered.is_empty());
        assert_eq!(everything.len(), 1);
    }
}
