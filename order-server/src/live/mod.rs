//! ConnectionRegistry: live realtime sessions
//!
//! ```text
//! WS session ──register──► ConnectionRegistry
//!                            ├── users:  user_id → Slot (one per user, last connect wins)
//!                            └── admins: user_id → Slot (back-office sessions)
//! Notifier ──send_to / broadcast──► Slot.tx (bounded mpsc, try_send)
//! ```
//!
//! Sends never block and never fail: a full channel drops the message, a
//! closed channel drops the slot. The persisted notification row is the
//! durable copy.

use dashmap::DashMap;
use shared::live::LiveMessage;
use shared::models::UserId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Per-session outbound buffer
pub const LIVE_CHANNEL_CAPACITY: usize = 64;

pub type LiveSender = mpsc::Sender<LiveMessage>;
pub type LiveReceiver = mpsc::Receiver<LiveMessage>;

/// Bounded channel for one session
pub fn live_channel() -> (LiveSender, LiveReceiver) {
    mpsc::channel(LIVE_CHANNEL_CAPACITY)
}

/// Identifies one registration; unregister only succeeds with the id it got.
pub type ConnectionId = u64;

#[derive(Clone)]
struct Slot {
    conn_id: ConnectionId,
    tx: LiveSender,
}

#[derive(Default)]
struct Inner {
    users: DashMap<UserId, Slot>,
    admins: DashMap<UserId, Slot>,
    next_id: AtomicU64,
}

/// Injectable registry, cheap to clone
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. A previous session for the same user is replaced.
    pub fn register(&self, user_id: UserId, is_admin: bool, tx: LiveSender) -> ConnectionId {
        let conn_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let slot = Slot { conn_id, tx };
        if is_admin {
            self.inner.admins.insert(user_id, slot.clone());
        }
        if let Some(previous) = self.inner.users.insert(user_id, slot) {
            tracing::debug!(
                user_id = %user_id,
                replaced = previous.conn_id,
                conn_id,
                "Live session replaced"
            );
        }
        conn_id
    }

    /// Remove a session, unless it has already been replaced by a newer one.
    pub fn unregister(&self, user_id: UserId, is_admin: bool, conn_id: ConnectionId) {
        self.inner
            .users
            .remove_if(&user_id, |_, slot| slot.conn_id == conn_id);
        if is_admin {
            self.inner
                .admins
                .remove_if(&user_id, |_, slot| slot.conn_id == conn_id);
        }
    }

    /// Push to one user. Returns whether the message was queued.
    pub fn send_to(&self, user_id: UserId, msg: LiveMessage) -> bool {
        let slot = match self.inner.users.get(&user_id) {
            Some(s) => s.clone(),
            None => return false,
        };
        match slot.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(user_id = %user_id, "Live channel full, message dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.inner
                    .users
                    .remove_if(&user_id, |_, s| s.conn_id == slot.conn_id);
                false
            }
        }
    }

    /// Push to every connected admin. Returns how many sessions received it.
    pub fn broadcast(&self, msg: LiveMessage) -> usize {
        let targets: Vec<(UserId, Slot)> = self
            .inner
            .admins
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        let mut delivered = 0;
        for (user_id, slot) in targets {
            match slot.tx.try_send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(user_id = %user_id, "Admin live channel full, message dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    self.inner
                        .admins
                        .remove_if(&user_id, |_, s| s.conn_id == slot.conn_id);
                }
            }
        }
        delivered
    }

    pub fn is_connected(&self, user_id: UserId) -> bool {
        self.inner.users.contains_key(&user_id)
    }

    pub fn admin_count(&self) -> usize {
        self.inner.admins.len()
    }

    /// Drop every handle; sessions observe a closed channel and exit.
    pub fn shutdown(&self) {
        let users = self.inner.users.len();
        self.inner.users.clear();
        self.inner.admins.clear();
        tracing::info!(sessions = users, "Connection registry cleared");
    }
}
