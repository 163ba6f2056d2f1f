//! Reservation endpoints

use axum::extract::{Path, Query, State};
use axum::routing::post;
use axum::{Json, Router};
use http::StatusCode;
use shared::models::{CheckoutSession, CreateReservationRequest, Reservation};

use super::{ApiResult, PageQuery};
use crate::auth::CurrentUser;
use crate::error::ServiceError;
use crate::state::AppState;
use crate::validation::page;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reservations", post(create).get(list))
        .route("/api/reservations/{id}/checkout", post(checkout))
}

/// POST /api/reservations
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), ServiceError> {
    let reservation = state.reservations.create(user.id, req).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /api/reservations
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(q): Query<PageQuery>,
) -> ApiResult<Vec<Reservation>> {
    let (limit, offset) = page(q.limit, q.offset);
    Ok(Json(state.reservations.list_own(user.id, limit, offset).await?))
}

/// POST /api/reservations/{id}/checkout
pub async fn checkout(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<CheckoutSession> {
    Ok(Json(state.payments.checkout_reservation(user.id, id).await?))
}
