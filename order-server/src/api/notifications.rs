//! Notification read API
//!
//! Customers see their own rows. Staff and admins see the admin broadcast
//! pool, which they share, by default; `?scope=own` reads the rows addressed
//! to them personally (their own orders and reservations).

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::{Notification, UnreadCount, UserId};
use shared::util::now_millis;

use super::ApiResult;
use crate::auth::CurrentUser;
use crate::db;
use crate::state::AppState;
use crate::validation::{page, validate_range};

const DAY_MS: i64 = 86_400_000;
const DEFAULT_RETENTION_DAYS: i64 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/{id}/read", post(mark_read))
        .route("/api/admin/notifications", delete(purge))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Own,
    Admin,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub scope: Option<Scope>,
}

/// Pool the caller reads from; `None` is the admin broadcast pool
fn pool_of(user: &CurrentUser, scope: Option<Scope>) -> Result<Option<UserId>, AppError> {
    match scope {
        Some(Scope::Own) => Ok(Some(user.id)),
        Some(Scope::Admin) => {
            user.require_back_office()?;
            Ok(None)
        }
        None if user.is_back_office() => Ok(None),
        None => Ok(Some(user.id)),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub scope: Option<Scope>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Affected {
    pub affected: u64,
}

/// GET /api/notifications
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<ListQuery>,
) -> ApiResult<Vec<Notification>> {
    let (limit, offset) = page(q.limit, q.offset);
    let pool = pool_of(&user, q.scope)?;
    let rows = db::notifications::list(&state.pool, pool, q.unread_only, limit, offset).await?;
    Ok(Json(rows))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<ScopeQuery>,
) -> ApiResult<UnreadCount> {
    let unread = db::notifications::unread_count(&state.pool, pool_of(&user, q.scope)?).await?;
    Ok(Json(UnreadCount { unread }))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Query(q): Query<ScopeQuery>,
) -> ApiResult<Affected> {
    let pool = pool_of(&user, q.scope)?;
    let updated = db::notifications::mark_read(&state.pool, id, pool, now_millis()).await?;
    if !updated {
        return Err(AppError::new(ErrorCode::NotificationNotFound)
            .with_detail("notification_id", id)
            .into());
    }
    Ok(Json(Affected { affected: 1 }))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<ScopeQuery>,
) -> ApiResult<Affected> {
    let pool = pool_of(&user, q.scope)?;
    let affected = db::notifications::mark_all_read(&state.pool, pool, now_millis()).await?;
    Ok(Json(Affected { affected }))
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    pub older_than_days: Option<i64>,
}

/// DELETE /api/admin/notifications?older_than_days=
pub async fn purge(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<PurgeQuery>,
) -> ApiResult<Affected> {
    user.require_admin()?;
    let days = q.older_than_days.unwrap_or(DEFAULT_RETENTION_DAYS);
    validate_range(days, "older_than_days", 1, 3650)?;

    let affected =
        db::notifications::purge_read_before(&state.pool, now_millis() - days * DAY_MS).await?;
    tracing::info!(affected, days, by = %user.id, "Purged read notifications");
    Ok(Json(Affected { affected }))
}
