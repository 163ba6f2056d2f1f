//! User Directory Repository (read-only)

use super::RepoResult;
use shared::models::{UserId, UserProfile};
use sqlx::SqliteExecutor;

pub async fn find_profile<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: UserId,
) -> RepoResult<Option<UserProfile>> {
    let row = sqlx::query_as::<_, UserProfile>(
        "SELECT id, name, email, stored_address, latitude, longitude FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

/// Display name, used as the actor in notification text
pub async fn find_name<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: UserId,
) -> RepoResult<Option<String>> {
    let name: Option<String> = sqlx::query_scalar("SELECT name FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(name)
}
