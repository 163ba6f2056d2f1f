//! Gateway webhook endpoint
//!
//! Raw body is required for signature verification. No response body
//! contract: the gateway only looks at the status code.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use http::{HeaderMap, StatusCode};

use crate::payments::Ack;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/payments/webhook", post(handle_webhook))
}

/// POST /api/payments/webhook
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    match state.reconciler.handle_event(&body, signature).await {
        Ok(Ack::Processed | Ack::Duplicate | Ack::Ignored) => StatusCode::OK,
        Err(e) => {
            let status = e.status_code();
            if status.is_server_error() {
                tracing::error!(error = %e, "Webhook failed, gateway will retry");
            } else {
                tracing::warn!(error = %e, "Webhook rejected");
            }
            status
        }
    }
}
