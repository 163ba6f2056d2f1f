//! Back-office endpoints (staff and admin)

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use shared::models::{Order, OrderStatus, Payment, UpdateStatusRequest};

use super::ApiResult;
use crate::auth::CurrentUser;
use crate::state::AppState;
use crate::validation::page;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/orders", get(list_orders))
        .route("/api/admin/orders/{id}/status", put(update_status))
        .route("/api/admin/payments/{id}/refund", post(refund))
}

#[derive(Debug, Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/admin/orders?status=
pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<AdminOrderQuery>,
) -> ApiResult<Vec<Order>> {
    user.require_back_office()?;
    let (limit, offset) = page(q.limit, q.offset);
    Ok(Json(state.orders.list_all(q.status, limit, offset).await?))
}

/// PUT /api/admin/orders/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Order> {
    user.require_back_office()?;
    tracing::info!(order_id = id, by = %user.id, to = %req.status, "Status change requested");
    Ok(Json(state.orders.update_status(id, req.status).await?))
}

/// POST /api/admin/payments/{id}/refund
pub async fn refund(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Payment> {
    user.require_admin()?;
    Ok(Json(state.payments.refund(id).await?))
}
