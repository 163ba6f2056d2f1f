//! Catalog Repository (read-only)

use super::RepoResult;
use shared::models::Product;
use sqlx::SqliteExecutor;

/// Current row of an active product, `None` if missing or deactivated
pub async fn find_active<'e, E: SqliteExecutor<'e>>(
    executor: E,
    id: i64,
) -> RepoResult<Option<Product>> {
    let row = sqlx::query_as::<_, Product>(
        "SELECT id, name, price_cents, is_active FROM products WHERE id = ? AND is_active = 1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}
