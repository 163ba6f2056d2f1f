//! Customer order endpoints

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use shared::models::{CheckoutSession, CreateOrderRequest, Order, OrderCreated, OrderDetail};

use super::{ApiResult, PageQuery};
use crate::auth::CurrentUser;
use crate::error::ServiceError;
use crate::state::AppState;
use crate::validation::page;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(create_order).get(list_orders))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/checkout", post(checkout))
}

/// POST /api/orders
pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreated>), ServiceError> {
    let created = state.orders.create_order(user.id, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<PageQuery>,
) -> ApiResult<Vec<Order>> {
    let (limit, offset) = page(q.limit, q.offset);
    Ok(Json(state.orders.list_own(user.id, limit, offset).await?))
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<OrderDetail> {
    let detail = state
        .orders
        .get_detail(id, user.id, user.is_back_office())
        .await?;
    Ok(Json(detail))
}

/// POST /api/orders/{id}/checkout
pub async fn checkout(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<CheckoutSession> {
    Ok(Json(state.payments.checkout_order(user.id, id).await?))
}
