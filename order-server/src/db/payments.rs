//! Payment Repository
//!
//! One row per gateway transaction. Status writes only ever move forward by
//! rank (pending < failed < paid < refunded).

use super::RepoResult;
use shared::models::{Payment, PaymentStatus};
use sqlx::SqliteExecutor;

const PAYMENT_COLUMNS: &str = "id, user_id, order_id, reservation_id, gateway_txn_id, amount_cents, currency, status, method, created_at, updated_at";

/// Insert the row, or advance an existing row's status when the incoming one
/// outranks it. Returns `true` if anything was written.
pub async fn upsert_forward<'e, E: SqliteExecutor<'e>>(executor: E, payment: &Payment) -> RepoResult<bool> {
    let result = sqlx::query(
        "INSERT INTO payments (id, user_id, order_id, reservation_id, gateway_txn_id, amount_cents, currency, status, method, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
         ON CONFLICT(gateway_txn_id) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at
         WHERE (CASE payments.status WHEN 'pending' THEN 0 WHEN 'failed' THEN 1 WHEN 'paid' THEN 2 ELSE 3 END)
             < (CASE excluded.status WHEN 'pending' THEN 0 WHEN 'failed' THEN 1 WHEN 'paid' THEN 2 ELSE 3 END)",
    )
    .bind(payment.id)
    .bind(payment.user_id)
    .bind(payment.order_id)
    .bind(payment.reservation_id)
    .bind(&payment.gateway_txn_id)
    .bind(payment.amount_cents)
    .bind(&payment.currency)
    .bind(payment.status)
    .bind(&payment.method)
    .bind(payment.created_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Forward-only status move on an existing row
pub async fn advance_status<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
    status: PaymentStatus,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE payments SET status = ?1, updated_at = ?2 WHERE id = ?3
         AND (CASE status WHEN 'pending' THEN 0 WHEN 'failed' THEN 1 WHEN 'paid' THEN 2 ELSE 3 END) < ?4",
    )
    .bind(status)
    .bind(now)
    .bind(id)
    .bind(status.rank() as i64)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find_by_id<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> RepoResult<Option<Payment>> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?");
    let row = sqlx::query_as::<_, Payment>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn find_by_txn<'e, E: SqliteExecutor<'e>>(
    executor: E,
    gateway_txn_id: &str,
) -> RepoResult<Option<Payment>> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_txn_id = ?");
    let row = sqlx::query_as::<_, Payment>(&sql)
        .bind(gateway_txn_id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}
