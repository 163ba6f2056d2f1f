//! Payment webhook reconciler
//!
//! ```text
//! verify signature ─► parse ─► BEGIN
//!   ─► mark event processed (dup ⇒ Ack, no effects)
//!   ─► upsert payment by gateway txn (forward-only rank)
//!   ─► set order payment_status / confirm reservation
//! ─► COMMIT ─► notify (detached)
//! ```
//!
//! A storage failure anywhere rolls back the event marker too, so the
//! gateway retry re-applies the whole event.

use std::time::Duration;

use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use shared::models::{OrderPaymentStatus, Payment, PaymentStatus, UserId};
use shared::util::{format_cents, now_millis, snowflake_id};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;

use super::stripe::{PaymentTarget, verify_webhook_signature};
use crate::db::{self, RepoError};
use crate::notify::priority::{EventAction, EventDomain};
use crate::notify::{Fanout, NotificationEvent, Notifier};

/// Webhook outcome that is acknowledged with 200
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Processed,
    Duplicate,
    Ignored,
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid signature: {0}")]
    InvalidSignature(&'static str),

    #[error("malformed event: {0}")]
    Parse(String),

    #[error("storage failure: {0}")]
    Storage(#[from] RepoError),

    #[error("webhook processing timed out")]
    Timeout,
}

impl From<sqlx::Error> for WebhookError {
    fn from(e: sqlx::Error) -> Self {
        WebhookError::Storage(RepoError::Database(e))
    }
}

impl WebhookError {
    /// The gateway retries on 5xx only
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature(_) | WebhookError::Parse(_) => StatusCode::BAD_REQUEST,
            WebhookError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GatewayEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    CheckoutCompleted,
    PaymentSucceeded,
    PaymentFailed,
    Refunded,
}

impl EventKind {
    fn parse(event_type: &str) -> Option<Self> {
        match event_type {
            "checkout.session.completed" => Some(Self::CheckoutCompleted),
            "payment_intent.succeeded" => Some(Self::PaymentSucceeded),
            "payment_intent.payment_failed" => Some(Self::PaymentFailed),
            "charge.refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    fn payment_status(self) -> PaymentStatus {
        match self {
            Self::CheckoutCompleted | Self::PaymentSucceeded => PaymentStatus::Paid,
            Self::PaymentFailed => PaymentStatus::Failed,
            Self::Refunded => PaymentStatus::Refunded,
        }
    }
}

/// Fields pulled out of the event object
#[derive(Debug)]
struct GatewayPayment {
    txn_id: String,
    target: Option<PaymentTarget>,
    amount_cents: Option<i64>,
    currency: Option<String>,
    method: String,
}

impl GatewayPayment {
    fn extract(kind: EventKind, obj: &Value) -> Result<Self, WebhookError> {
        let txn_id = match kind {
            // Sessions without an intent (e.g. zero-amount) fall back to the session id
            EventKind::CheckoutCompleted => obj["payment_intent"].as_str().or(obj["id"].as_str()),
            EventKind::PaymentSucceeded | EventKind::PaymentFailed => obj["id"].as_str(),
            EventKind::Refunded => obj["payment_intent"].as_str(),
        }
        .ok_or_else(|| WebhookError::Parse("event object has no payment reference".into()))?
        .to_string();

        let amount_cents = match kind {
            EventKind::CheckoutCompleted => obj["amount_total"].as_i64(),
            EventKind::PaymentSucceeded => obj["amount_received"].as_i64().or(obj["amount"].as_i64()),
            EventKind::PaymentFailed => obj["amount"].as_i64(),
            EventKind::Refunded => obj["amount_refunded"].as_i64().or(obj["amount"].as_i64()),
        };

        let method = obj["payment_method_types"][0]
            .as_str()
            .or(obj["payment_method_details"]["type"].as_str())
            .unwrap_or("card")
            .to_string();

        Ok(Self {
            txn_id,
            target: target_from_metadata(&obj["metadata"])?,
            amount_cents,
            currency: obj["currency"].as_str().map(str::to_lowercase),
            method,
        })
    }
}

fn target_from_metadata(metadata: &Value) -> Result<Option<PaymentTarget>, WebhookError> {
    let parse = |key: &str| -> Result<Option<i64>, WebhookError> {
        match &metadata[key] {
            Value::Null => Ok(None),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| WebhookError::Parse(format!("metadata.{key} is not an id"))),
            Value::Number(n) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| WebhookError::Parse(format!("metadata.{key} is not an id"))),
            _ => Err(WebhookError::Parse(format!("metadata.{key} is not an id"))),
        }
    };
    if let Some(id) = parse("order_id")? {
        return Ok(Some(PaymentTarget::Order(id)));
    }
    Ok(parse("reservation_id")?.map(PaymentTarget::Reservation))
}

/// Entity a payment belongs to, with its owner and the amount it is worth
struct ResolvedTarget {
    target: PaymentTarget,
    owner: UserId,
    amount_cents: i64,
}

#[derive(Clone)]
pub struct Reconciler {
    pool: SqlitePool,
    notifier: Notifier,
    webhook_secret: String,
    default_currency: String,
    timeout: Duration,
}

impl Reconciler {
    pub fn new(
        pool: SqlitePool,
        notifier: Notifier,
        webhook_secret: impl Into<String>,
        default_currency: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            pool,
            notifier,
            webhook_secret: webhook_secret.into(),
            default_currency: default_currency.into(),
            timeout,
        }
    }

    /// Verify and apply one gateway event, bounded by the webhook timeout.
    pub async fn handle_event(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<Ack, WebhookError> {
        match tokio::time::timeout(self.timeout, self.process(payload, signature)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(timeout_ms = self.timeout.as_millis() as u64, "Webhook timed out");
                Err(WebhookError::Timeout)
            }
        }
    }

    async fn process(&self, payload: &[u8], signature: Option<&str>) -> Result<Ack, WebhookError> {
        let signature =
            signature.ok_or(WebhookError::InvalidSignature("Missing Stripe-Signature header"))?;
        verify_webhook_signature(
            payload,
            signature,
            &self.webhook_secret,
            chrono::Utc::now().timestamp(),
        )
        .map_err(WebhookError::InvalidSignature)?;

        let event: GatewayEvent =
            serde_json::from_slice(payload).map_err(|e| WebhookError::Parse(e.to_string()))?;
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Received gateway webhook");

        let Some(kind) = EventKind::parse(&event.event_type) else {
            tracing::debug!(event_type = %event.event_type, "Unhandled webhook event type");
            return Ok(Ack::Ignored);
        };
        let incoming = GatewayPayment::extract(kind, &event.data.object)?;

        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        if !db::webhook_events::try_mark_processed(&mut *tx, &event.id, &event.event_type, now)
            .await?
        {
            tracing::info!(event_id = %event.id, "Duplicate webhook event, skipping");
            return Ok(Ack::Duplicate);
        }

        let Some(resolved) = resolve_target(&mut tx, &incoming).await? else {
            tracing::warn!(
                event_id = %event.id,
                txn_id = %incoming.txn_id,
                "Webhook references no known order or reservation"
            );
            tx.commit().await?;
            return Ok(Ack::Ignored);
        };

        let status = kind.payment_status();
        let currency = incoming
            .currency
            .clone()
            .unwrap_or_else(|| self.default_currency.clone());
        let amount_cents = incoming.amount_cents.unwrap_or(resolved.amount_cents);
        let (order_id, reservation_id) = match resolved.target {
            PaymentTarget::Order(id) => (Some(id), None),
            PaymentTarget::Reservation(id) => (None, Some(id)),
        };

        let advanced = db::payments::upsert_forward(
            &mut *tx,
            &Payment {
                id: snowflake_id(),
                user_id: resolved.owner,
                order_id,
                reservation_id,
                gateway_txn_id: incoming.txn_id.clone(),
                amount_cents,
                currency: currency.clone(),
                status,
                method: incoming.method.clone(),
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

        let mut reservation_confirmed = false;
        if advanced {
            match (resolved.target, status) {
                (PaymentTarget::Order(id), PaymentStatus::Paid) => {
                    db::orders::set_payment_status(&mut *tx, id, OrderPaymentStatus::Paid, now)
                        .await?;
                }
                (PaymentTarget::Order(id), PaymentStatus::Refunded) => {
                    db::orders::set_payment_status(&mut *tx, id, OrderPaymentStatus::Refunded, now)
                        .await?;
                }
                (PaymentTarget::Reservation(id), PaymentStatus::Paid) => {
                    reservation_confirmed =
                        db::reservations::confirm_if_pending(&mut *tx, id, now).await?;
                }
                _ => {}
            }
        }

        tx.commit().await?;

        if !advanced {
            tracing::info!(
                event_id = %event.id,
                txn_id = %incoming.txn_id,
                status = status.as_str(),
                "Stale or repeated payment status, no change"
            );
            return Ok(Ack::Processed);
        }

        tracing::info!(
            event_id = %event.id,
            txn_id = %incoming.txn_id,
            status = status.as_str(),
            order_id,
            reservation_id,
            "Payment reconciled"
        );

        let (domain, action, fanout) = match (kind, reservation_confirmed) {
            (EventKind::CheckoutCompleted, true) => {
                (EventDomain::Reservation, EventAction::Confirmed, Fanout::OwnerAndAdmins)
            }
            (EventKind::CheckoutCompleted, false) => {
                (EventDomain::Payment, EventAction::Completed, Fanout::OwnerAndAdmins)
            }
            (EventKind::PaymentSucceeded, true) => {
                (EventDomain::Reservation, EventAction::Confirmed, Fanout::Owner)
            }
            (EventKind::PaymentSucceeded, false) => {
                (EventDomain::Payment, EventAction::Succeeded, Fanout::Owner)
            }
            (EventKind::PaymentFailed, _) => (EventDomain::Payment, EventAction::Failed, Fanout::Owner),
            (EventKind::Refunded, _) => (EventDomain::Payment, EventAction::Refunded, Fanout::Owner),
        };
        let actor_name = db::users::find_name(&self.pool, resolved.owner)
            .await
            .ok()
            .flatten();
        self.notifier.notify(
            NotificationEvent {
                domain,
                action,
                owner: resolved.owner,
                reference_id: resolved.target.id(),
                related_order_id: order_id,
                actor_name,
                amount: Some(format!("{} {}", format_cents(amount_cents), currency.to_uppercase())),
                payment_related: true,
            },
            fanout,
        );

        Ok(Ack::Processed)
    }
}

/// Metadata first, then an earlier payment row for the same transaction.
async fn resolve_target(
    tx: &mut Transaction<'_, Sqlite>,
    incoming: &GatewayPayment,
) -> Result<Option<ResolvedTarget>, WebhookError> {
    let target = match incoming.target {
        Some(t) => Some(t),
        None => db::payments::find_by_txn(&mut **tx, &incoming.txn_id)
            .await?
            .and_then(|p| match (p.order_id, p.reservation_id) {
                (Some(id), _) => Some(PaymentTarget::Order(id)),
                (None, Some(id)) => Some(PaymentTarget::Reservation(id)),
                (None, None) => None,
            }),
    };

    let resolved = match target {
        Some(PaymentTarget::Order(id)) => db::orders::find_by_id(&mut **tx, id)
            .await?
            .map(|o| ResolvedTarget {
                target: PaymentTarget::Order(id),
                owner: o.user_id,
                amount_cents: o.total_cents,
            }),
        Some(PaymentTarget::Reservation(id)) => db::reservations::find_by_id(&mut **tx, id)
            .await?
            .map(|r| ResolvedTarget {
                target: PaymentTarget::Reservation(id),
                owner: r.user_id,
                amount_cents: r.deposit_cents,
            }),
        None => None,
    };
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::orders::fixtures::{count, seed_product, seed_user};
    use crate::db::orders::NewOrder;
    use crate::db::test_pool;
    use crate::live::ConnectionRegistry;
    use crate::notify::NoopGenerator;
    use crate::payments::stripe::sign_payload;
    use shared::models::{NotificationPriority, ReservationStatus};
    use std::sync::Arc;

    const SECRET: &str = "whsec_test";
    const ORDER_ID: i64 = 500;

    async fn setup() -> (SqlitePool, Reconciler, Notifier) {
        let pool = test_pool().await;
        seed_user(&pool, 1, "Ana", None).await;
        seed_product(&pool, 10, "Burger", 1000, true).await;
        let mut tx = pool.begin().await.unwrap();
        db::orders::insert(
            &mut *tx,
            &NewOrder {
                id: ORDER_ID,
                user_id: UserId::new(1).unwrap(),
                delivery_location: "Calle Luna 5",
                latitude: None,
                longitude: None,
                now: 1,
            },
        )
        .await
        .unwrap();
        db::orders::insert_line_from_catalog(&mut *tx, 501, ORDER_ID, 10, 2)
            .await
            .unwrap();
        db::orders::settle_total(&mut *tx, ORDER_ID).await.unwrap();
        tx.commit().await.unwrap();

        let notifier = Notifier::new(
            pool.clone(),
            ConnectionRegistry::new(),
            Arc::new(NoopGenerator),
            Duration::from_millis(100),
        );
        let reconciler = Reconciler::new(
            pool.clone(),
            notifier.clone(),
            SECRET,
            "eur",
            Duration::from_secs(5),
        );
        (pool, reconciler, notifier)
    }

    fn event(id: &str, event_type: &str, object: Value) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": id,
            "type": event_type,
            "data": { "object": object },
        }))
        .unwrap()
    }

    fn checkout_completed(event_id: &str, intent: &str) -> Vec<u8> {
        event(
            event_id,
            "checkout.session.completed",
            serde_json::json!({
                "id": "cs_1",
                "payment_intent": intent,
                "amount_total": 2000,
                "currency": "eur",
                "metadata": { "order_id": ORDER_ID.to_string(), "user_id": "1" },
            }),
        )
    }

    async fn deliver(reconciler: &Reconciler, body: &[u8]) -> Result<Ack, WebhookError> {
        let sig = sign_payload(body, SECRET, chrono::Utc::now().timestamp());
        reconciler.handle_event(body, Some(&sig)).await
    }

    async fn order_payment_status(pool: &SqlitePool) -> OrderPaymentStatus {
        db::orders::find_by_id(pool, ORDER_ID)
            .await
            .unwrap()
            .unwrap()
            .payment_status
    }

    #[tokio::test]
    async fn duplicate_delivery_applies_once() {
        let (pool, reconciler, notifier) = setup().await;
        let body = checkout_completed("evt_1", "pi_1");

        assert_eq!(deliver(&reconciler, &body).await.unwrap(), Ack::Processed);
        assert_eq!(deliver(&reconciler, &body).await.unwrap(), Ack::Duplicate);
        notifier.flush().await;

        assert_eq!(count(&pool, "payments").await, 1);
        let payment = db::payments::find_by_txn(&pool, "pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.amount_cents, 2000);
        assert_eq!(payment.order_id, Some(ORDER_ID));
        assert_eq!(order_payment_status(&pool).await, OrderPaymentStatus::Paid);

        let own = db::notifications::list(&pool, UserId::new(1).ok(), false, 10, 0)
            .await
            .unwrap();
        let admin = db::notifications::list(&pool, None, false, 10, 0).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(admin.len(), 1);
        assert_eq!(own[0].priority, NotificationPriority::High);
        assert_eq!(own[0].related_order_id, Some(ORDER_ID));
    }

    #[tokio::test]
    async fn second_event_for_same_txn_keeps_one_row() {
        let (pool, reconciler, notifier) = setup().await;
        deliver(&reconciler, &checkout_completed("evt_1", "pi_1")).await.unwrap();
        let succeeded = event(
            "evt_2",
            "payment_intent.succeeded",
            serde_json::json!({ "id": "pi_1", "amount_received": 2000, "currency": "eur" }),
        );
        assert_eq!(deliver(&reconciler, &succeeded).await.unwrap(), Ack::Processed);
        notifier.flush().await;

        assert_eq!(count(&pool, "payments").await, 1);
        // Only the first event changed anything
        let own = db::notifications::list(&pool, UserId::new(1).ok(), false, 10, 0)
            .await
            .unwrap();
        assert_eq!(own.len(), 1);
    }

    #[tokio::test]
    async fn stale_failure_after_paid_is_ignored() {
        let (pool, reconciler, _) = setup().await;
        deliver(&reconciler, &checkout_completed("evt_1", "pi_1")).await.unwrap();
        let failed = event(
            "evt_0",
            "payment_intent.payment_failed",
            serde_json::json!({
                "id": "pi_1",
                "amount": 2000,
                "metadata": { "order_id": ORDER_ID.to_string() },
            }),
        );
        assert_eq!(deliver(&reconciler, &failed).await.unwrap(), Ack::Processed);

        let payment = db::payments::find_by_txn(&pool, "pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(order_payment_status(&pool).await, OrderPaymentStatus::Paid);
    }

    #[tokio::test]
    async fn refund_event_marks_order_refunded() {
        let (pool, reconciler, _) = setup().await;
        deliver(&reconciler, &checkout_completed("evt_1", "pi_1")).await.unwrap();
        let refunded = event(
            "evt_3",
            "charge.refunded",
            serde_json::json!({ "id": "ch_1", "payment_intent": "pi_1", "amount_refunded": 2000 }),
        );
        assert_eq!(deliver(&reconciler, &refunded).await.unwrap(), Ack::Processed);

        let payment = db::payments::find_by_txn(&pool, "pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Refunded);
        assert_eq!(order_payment_status(&pool).await, OrderPaymentStatus::Refunded);

        // A late paid event cannot undo the refund
        let late = event(
            "evt_4",
            "payment_intent.succeeded",
            serde_json::json!({ "id": "pi_1", "metadata": { "order_id": ORDER_ID } }),
        );
        deliver(&reconciler, &late).await.unwrap();
        assert_eq!(order_payment_status(&pool).await, OrderPaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn storage_failure_rolls_back_marker() {
        let (pool, reconciler, _) = setup().await;
        sqlx::query("ALTER TABLE payments RENAME TO payments_offline")
            .execute(&pool)
            .await
            .unwrap();

        let body = checkout_completed("evt_1", "pi_1");
        let err = deliver(&reconciler, &body).await.unwrap_err();
        assert!(matches!(err, WebhookError::Storage(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(count(&pool, "processed_webhook_events").await, 0);
        assert_eq!(order_payment_status(&pool).await, OrderPaymentStatus::Unpaid);

        sqlx::query("ALTER TABLE payments_offline RENAME TO payments")
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(deliver(&reconciler, &body).await.unwrap(), Ack::Processed);
        assert_eq!(order_payment_status(&pool).await, OrderPaymentStatus::Paid);
    }

    #[tokio::test]
    async fn bad_signature_changes_nothing() {
        let (pool, reconciler, _) = setup().await;
        let body = checkout_completed("evt_1", "pi_1");
        let sig = sign_payload(&body, "whsec_wrong", chrono::Utc::now().timestamp());

        let err = reconciler.handle_event(&body, Some(&sig)).await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err = reconciler.handle_event(&body, None).await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature(_)));

        assert_eq!(count(&pool, "processed_webhook_events").await, 0);
        assert_eq!(count(&pool, "payments").await, 0);
    }

    #[tokio::test]
    async fn unknown_types_and_unknown_targets_are_acknowledged() {
        let (pool, reconciler, _) = setup().await;
        let body = event("evt_9", "customer.created", serde_json::json!({ "id": "cus_1" }));
        assert_eq!(deliver(&reconciler, &body).await.unwrap(), Ack::Ignored);

        let orphan = event(
            "evt_10",
            "payment_intent.succeeded",
            serde_json::json!({ "id": "pi_orphan", "amount": 100 }),
        );
        assert_eq!(deliver(&reconciler, &orphan).await.unwrap(), Ack::Ignored);
        assert_eq!(count(&pool, "payments").await, 0);

        let garbage = b"not json".to_vec();
        assert!(matches!(
            deliver(&reconciler, &garbage).await,
            Err(WebhookError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn deposit_checkout_confirms_reservation() {
        let (pool, reconciler, notifier) = setup().await;
        sqlx::query(
            "INSERT INTO reservations (id, user_id, party_size, reserved_for, status, deposit_cents, created_at, updated_at) VALUES (77, 1, 4, 0, 'pending', 1500, 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let body = event(
            "evt_r1",
            "checkout.session.completed",
            serde_json::json!({
                "id": "cs_r1",
                "payment_intent": "pi_r1",
                "metadata": { "reservation_id": "77" },
            }),
        );
        assert_eq!(deliver(&reconciler, &body).await.unwrap(), Ack::Processed);
        notifier.flush().await;

        let reservation = db::reservations::find_by_id(&pool, 77).await.unwrap().unwrap();
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        let payment = db::payments::find_by_txn(&pool, "pi_r1").await.unwrap().unwrap();
        assert_eq!(payment.amount_cents, 1500);
        assert_eq!(payment.reservation_id, Some(77));

        let own = db::notifications::list(&pool, UserId::new(1).ok(), false, 10, 0)
            .await
            .unwrap();
        assert_eq!(own[0].title, "Reservation confirmed");
        assert_eq!(own[0].related_order_id, None);
        // Paid by a deposit, so it ranks like any other payment event
        assert_eq!(own[0].priority, NotificationPriority::High);
        let admin = db::notifications::list(&pool, None, false, 10, 0).await.unwrap();
        assert_eq!(admin.len(), 1);
        assert_eq!(admin[0].priority, NotificationPriority::High);
    }

    #[tokio::test]
    async fn extreme_signature_timestamp_is_rejected() {
        let (pool, reconciler, _) = setup().await;
        let err = reconciler
            .handle_event(b"{}", Some("t=-9223372036854775808,v1=00"))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature(_)));
        assert_eq!(count(&pool, "processed_webhook_events").await, 0);
    }

    #[tokio::test]
    async fn blocked_storage_times_out_without_marking() {
        let (pool, patient, notifier) = setup().await;
        let hasty = Reconciler::new(
            pool.clone(),
            notifier,
            SECRET,
            "eur",
            Duration::from_millis(50),
        );

        // The in-memory pool has a single connection; hold it
        let held = pool.acquire().await.unwrap();
        let body = checkout_completed("evt_1", "pi_1");
        let err = deliver(&hasty, &body).await.unwrap_err();
        assert!(matches!(err, WebhookError::Timeout));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        drop(held);

        assert_eq!(count(&pool, "processed_webhook_events").await, 0);
        assert_eq!(count(&pool, "payments").await, 0);
        assert_eq!(order_payment_status(&pool).await, OrderPaymentStatus::Unpaid);

        // The retry goes through once storage is free
        assert_eq!(deliver(&patient, &body).await.unwrap(), Ack::Processed);
    }

    #[test]
    fn timeout_maps_to_retryable_status() {
        assert_eq!(WebhookError::Timeout.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            WebhookError::Parse("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
