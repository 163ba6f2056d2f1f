//! Realtime WebSocket endpoint
//!
//! GET /api/ws?token=<JWT>
//! Auth: JWT in the query string (browser WebSocket cannot set headers).
//! A bad token still upgrades, then the socket is closed without a message.
//!
//! Protocol:
//! - Server → client: LiveMessage (Ready, Notification, Pong)
//! - Client → server: LiveCommand (Ping)

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Router;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::live::{LiveCommand, LiveMessage};
use tokio::time::Duration;

use crate::auth::CurrentUser;
use crate::db;
use crate::live::live_channel;
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub fn router() -> Router<AppState> {
    Router::new().route("/api/ws", get(handle_ws))
}

#[derive(Deserialize)]
pub struct WsAuthQuery {
    #[serde(default)]
    token: String,
}

/// GET /api/ws?token=<JWT>
pub async fn handle_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let user = match state.jwt.validate_token(&query.token) {
        Ok(claims) => Some(CurrentUser::from(claims)),
        Err(e) => {
            tracing::debug!(target: "security", error = %e, "WS token rejected");
            None
        }
    };

    ws.on_upgrade(move |mut socket| async move {
        match user {
            Some(user) => ws_session(socket, state, user).await,
            None => {
                let _ = socket.send(Message::Close(None)).await;
            }
        }
    })
}

/// Own rows, plus the admin pool for back-office sessions
async fn unread_on_connect(
    state: &AppState,
    user: &CurrentUser,
    is_admin: bool,
) -> db::RepoResult<i64> {
    let own = db::notifications::unread_count(&state.pool, Some(user.id)).await?;
    if !is_admin {
        return Ok(own);
    }
    let pool = db::notifications::unread_count(&state.pool, None).await?;
    Ok(own + pool)
}

async fn ws_session(socket: WebSocket, state: AppState, user: CurrentUser) {
    let (mut sink, mut stream) = socket.split();
    let is_admin = user.is_back_office();

    let (tx, mut rx) = live_channel();
    let conn_id = state.registry.register(user.id, is_admin, tx);
    tracing::info!(user_id = %user.id, is_admin, conn_id, "WS connected");

    let unread = unread_on_connect(&state, &user, is_admin)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Unread count unavailable");
            0
        });
    if send_message(&mut sink, &LiveMessage::Ready { unread }).await.is_err() {
        state.registry.unregister(user.id, is_admin, conn_id);
        return;
    }

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            msg = rx.recv() => {
                match msg {
                    Some(msg) => {
                        if send_message(&mut sink, &msg).await.is_err() {
                            break;
                        }
                    }
                    // Replaced by a newer connection, or shutting down
                    None => break,
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<LiveCommand>(&text) {
                            Ok(LiveCommand::Ping) => {
                                if send_message(&mut sink, &LiveMessage::Pong).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::debug!(error = %e, "Ignoring unknown WS command"),
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.registry.unregister(user.id, is_admin, conn_id);
    let _ = sink.close().await;
    tracing::info!(user_id = %user.id, conn_id, "WS disconnected");
}

async fn send_message<S>(sink: &mut S, msg: &LiveMessage) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
