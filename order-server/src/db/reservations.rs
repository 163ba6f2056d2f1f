//! Reservation Repository

use super::RepoResult;
use shared::models::{Reservation, UserId};
use sqlx::SqliteExecutor;

const RESERVATION_COLUMNS: &str =
    "id, user_id, party_size, reserved_for, note, status, deposit_cents, created_at, updated_at";

pub async fn insert<'e, E: SqliteExecutor<'e>>(executor: E, r: &Reservation) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO reservations (id, user_id, party_size, reserved_for, note, status, deposit_cents, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(r.id)
    .bind(r.user_id)
    .bind(r.party_size)
    .bind(r.reserved_for)
    .bind(&r.note)
    .bind(r.status)
    .bind(r.deposit_cents)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_by_id<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
) -> RepoResult<Option<Reservation>> {
    let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?");
    let row = sqlx::query_as::<_, Reservation>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn list_by_user<'e, E: SqliteExecutor<'e>>(
    executor: E,
    user_id: UserId,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<Reservation>> {
    let sql = format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE user_id = ? ORDER BY reserved_for DESC, id DESC LIMIT ? OFFSET ?"
    );
    let rows = sqlx::query_as::<_, Reservation>(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

/// `pending → confirmed`; any other current status is left untouched.
pub async fn confirm_if_pending<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        "UPDATE reservations SET status = 'confirmed', updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}
