//! HTTP API
//!
//! Each submodule exposes a `router()`; [`build_app`] merges them and adds
//! the tower-http layers.

pub mod admin;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod reservations;
pub mod ws;

use axum::{Json, Router, middleware};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::ServiceError;
use crate::state::AppState;

pub(crate) type ApiResult<T> = Result<Json<T>, ServiceError>;

/// `?limit=&offset=`
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// HTTP access log
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = std::time::Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        target: "http_access",
        "{} {} {} {}ms",
        method,
        uri.path(),
        response.status(),
        started.elapsed().as_millis()
    );
    response
}

/// Every route, without state or layers
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(reservations::router())
        .merge(admin::router())
        .merge(payments::router())
        .merge(notifications::router())
        .merge(ws::router())
}

/// Fully configured application
pub fn build_app(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout;
    build_router()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(log_request))
}
