//! Notification dispatch engine
//!
//! `dispatch` persists a row (awaited) and then pushes it to whoever is
//! connected. `notify` is the event API: it runs generation and dispatch on
//! one detached task tracked by a [`TaskTracker`], so callers never wait on
//! the generator and never see a notification error.
//!
//! A crash between the caller's commit and the detached INSERT loses that
//! notification (at-most-once). Graceful shutdown drains tracked tasks.

pub mod content;
pub mod priority;

use std::sync::Arc;
use std::time::Duration;

use shared::live::LiveMessage;
use shared::models::{Notification, NotificationPriority, Recipient, UserId};
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;
use tokio_util::task::TaskTracker;

use crate::db;
use crate::live::ConnectionRegistry;
use content::{Audience, Content, ContentContext, ContentGenerator};
use priority::{EventAction, EventDomain, priority_for};

pub use content::{HttpContentGenerator, NoopGenerator, build_generator};

/// Something that happened and who it happened to
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub domain: EventDomain,
    pub action: EventAction,
    /// Owner of the order / reservation / payment
    pub owner: UserId,
    /// Order or reservation id
    pub reference_id: i64,
    pub related_order_id: Option<i64>,
    pub actor_name: Option<String>,
    pub amount: Option<String>,
    /// Raised by a payment, even when the wording is about the reservation
    pub payment_related: bool,
}

impl NotificationEvent {
    pub fn priority(&self) -> NotificationPriority {
        let domain = if self.payment_related {
            EventDomain::Payment
        } else {
            self.domain
        };
        priority_for(domain, self.action)
    }

    fn context(&self, audience: Audience) -> ContentContext {
        ContentContext {
            domain: self.domain,
            action: self.action,
            audience,
            reference_id: self.reference_id,
            actor_name: self.actor_name.clone(),
            amount: self.amount.clone(),
        }
    }
}

/// Who gets a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fanout {
    Owner,
    Admins,
    OwnerAndAdmins,
}

impl Fanout {
    fn audiences(self) -> &'static [Audience] {
        match self {
            Fanout::Owner => &[Audience::Owner],
            Fanout::Admins => &[Audience::Admin],
            Fanout::OwnerAndAdmins => &[Audience::Owner, Audience::Admin],
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    pool: SqlitePool,
    registry: ConnectionRegistry,
    generator: Arc<dyn ContentGenerator>,
    generator_timeout: Duration,
    tracker: TaskTracker,
}

impl Notifier {
    pub fn new(
        pool: SqlitePool,
        registry: ConnectionRegistry,
        generator: Arc<dyn ContentGenerator>,
        generator_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            registry,
            generator,
            generator_timeout,
            tracker: TaskTracker::new(),
        }
    }

    /// Persist one notification, then push it. Storage failure is logged and
    /// absorbed; the push is skipped in that case.
    pub async fn dispatch(
        &self,
        recipient: Recipient,
        content: Content,
        related_order_id: Option<i64>,
        priority: NotificationPriority,
    ) -> Option<Notification> {
        let notification = Notification {
            id: snowflake_id(),
            recipient_user_id: recipient.user_id(),
            notification_type: content.notification_type,
            title: content.title,
            message: content.message,
            related_order_id,
            is_read: false,
            read_at: None,
            priority,
            created_at: now_millis(),
        };

        if let Err(e) = db::notifications::insert(&self.pool, &notification).await {
            tracing::error!(
                error = %e,
                recipient = ?recipient,
                related_order_id,
                "Failed to persist notification"
            );
            return None;
        }

        let msg = LiveMessage::Notification {
            notification: notification.clone(),
        };
        match recipient {
            Recipient::User(user_id) => {
                let pushed = self.registry.send_to(user_id, msg);
                tracing::debug!(user_id = %user_id, pushed, "Notification dispatched");
            }
            Recipient::AdminBroadcast => {
                let pushed = self.registry.broadcast(msg);
                tracing::debug!(admins = pushed, "Admin notification dispatched");
            }
        }

        Some(notification)
    }

    /// Fire-and-forget fan-out of one event.
    pub fn notify(&self, event: NotificationEvent, fanout: Fanout) {
        let this = self.clone();
        self.tracker.spawn(async move {
            let priority = event.priority();
            for &audience in fanout.audiences() {
                let ctx = event.context(audience);
                let content = content::generate_or_fallback(
                    this.generator.as_ref(),
                    &ctx,
                    this.generator_timeout,
                )
                .await;
                let recipient = match audience {
                    Audience::Owner => Recipient::User(event.owner),
                    Audience::Admin => Recipient::AdminBroadcast,
                };
                this.dispatch(recipient, content, event.related_order_id, priority)
                    .await;
            }
        });
    }

    /// Wait for every detached notification task spawned so far.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stop accepting work and drain in-flight tasks.
    pub async fn shutdown(&self) {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!(pending, "Draining notification tasks");
        }
        self.tracker.wait().await;
    }
}
