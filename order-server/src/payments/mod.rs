//! Payments: outbound checkout/refund and inbound webhook reconciliation

pub mod reconciler;
pub mod stripe;

use shared::error::{AppError, ErrorCode};
use shared::models::{
    CheckoutSession, OrderPaymentStatus, OrderStatus, Payment, PaymentStatus, ReservationStatus,
    UserId,
};
use shared::util::{format_cents, now_millis};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::{self, RepoError};
use crate::notify::priority::{EventAction, EventDomain};
use crate::notify::{Fanout, NotificationEvent, Notifier};

pub use reconciler::{Ack, Reconciler, WebhookError};
pub use stripe::{CheckoutRequest, GatewayError, PaymentTarget, StripeClient};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Order {0} not found")]
    OrderNotFound(i64),

    #[error("Reservation {0} not found")]
    ReservationNotFound(i64),

    #[error("Payment {0} not found")]
    PaymentNotFound(i64),

    #[error("Order {0} has already been paid")]
    AlreadyPaid(i64),

    #[error("Reservation {0} is no longer pending")]
    ReservationNotPending(i64),

    #[error("{0}")]
    NotPayable(String),

    #[error("Payment {0} has already been refunded")]
    AlreadyRefunded(i64),

    #[error("Payment {0} is not refundable")]
    NotRefundable(i64),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(#[from] RepoError),
}

impl From<sqlx::Error> for PaymentError {
    fn from(e: sqlx::Error) -> Self {
        PaymentError::Storage(RepoError::Database(e))
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::OrderNotFound(id) => {
                AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", id)
            }
            PaymentError::ReservationNotFound(id) => {
                AppError::new(ErrorCode::ReservationNotFound).with_detail("reservation_id", id)
            }
            PaymentError::PaymentNotFound(id) => {
                AppError::new(ErrorCode::PaymentNotFound).with_detail("payment_id", id)
            }
            PaymentError::AlreadyPaid(id) => {
                AppError::new(ErrorCode::OrderAlreadyPaid).with_detail("order_id", id)
            }
            PaymentError::ReservationNotPending(id) => {
                AppError::new(ErrorCode::ReservationNotPending).with_detail("reservation_id", id)
            }
            PaymentError::NotPayable(msg) => AppError::invalid_request(msg),
            PaymentError::AlreadyRefunded(id) => {
                AppError::new(ErrorCode::PaymentAlreadyRefunded).with_detail("payment_id", id)
            }
            PaymentError::NotRefundable(id) => {
                AppError::new(ErrorCode::PaymentNotRefundable).with_detail("payment_id", id)
            }
            PaymentError::Gateway(err) => {
                tracing::error!(error = %err, "Payment gateway call failed");
                AppError::upstream("Payment gateway unavailable")
            }
            PaymentError::Storage(err) => {
                tracing::error!(error = %err, "Payment storage failed");
                AppError::database("Payment storage failed")
            }
        }
    }
}

/// Checkout session and refund operations
#[derive(Clone)]
pub struct PaymentService {
    pool: SqlitePool,
    stripe: StripeClient,
    notifier: Notifier,
    currency: String,
    success_url: String,
    cancel_url: String,
}

impl PaymentService {
    pub fn new(
        pool: SqlitePool,
        stripe: StripeClient,
        notifier: Notifier,
        currency: impl Into<String>,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            stripe,
            notifier,
            currency: currency.into(),
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    /// Start a gateway checkout for the caller's own unpaid order.
    pub async fn checkout_order(
        &self,
        user_id: UserId,
        order_id: i64,
    ) -> Result<CheckoutSession, PaymentError> {
        let order = db::orders::find_by_id(&self.pool, order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        if order.payment_status != OrderPaymentStatus::Unpaid {
            return Err(PaymentError::AlreadyPaid(order_id));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(PaymentError::NotPayable(format!(
                "Order {order_id} is cancelled"
            )));
        }

        let description = format!("Order #{order_id}");
        let session = self
            .stripe
            .create_checkout_session(&CheckoutRequest {
                target: PaymentTarget::Order(order_id),
                user_id,
                amount_cents: order.total_cents,
                currency: &self.currency,
                description: &description,
                success_url: &self.success_url,
                cancel_url: &self.cancel_url,
            })
            .await?;

        tracing::info!(order_id, session_id = %session.session_id, "Checkout session created");
        Ok(session)
    }

    /// Start a deposit checkout for the caller's own pending reservation.
    pub async fn checkout_reservation(
        &self,
        user_id: UserId,
        reservation_id: i64,
    ) -> Result<CheckoutSession, PaymentError> {
        let reservation = db::reservations::find_by_id(&self.pool, reservation_id)
            .await?
            .filter(|r| r.user_id == user_id)
            .ok_or(PaymentError::ReservationNotFound(reservation_id))?;

        if reservation.status != ReservationStatus::Pending {
            return Err(PaymentError::ReservationNotPending(reservation_id));
        }
        if reservation.deposit_cents <= 0 {
            return Err(PaymentError::NotPayable(format!(
                "Reservation {reservation_id} requires no deposit"
            )));
        }

        let description = format!("Deposit for reservation #{reservation_id}");
        let session = self
            .stripe
            .create_checkout_session(&CheckoutRequest {
                target: PaymentTarget::Reservation(reservation_id),
                user_id,
                amount_cents: reservation.deposit_cents,
                currency: &self.currency,
                description: &description,
                success_url: &self.success_url,
                cancel_url: &self.cancel_url,
            })
            .await?;

        tracing::info!(reservation_id, session_id = %session.session_id, "Deposit checkout created");
        Ok(session)
    }

    /// Admin refund: gateway first, then local state.
    pub async fn refund(&self, payment_id: i64) -> Result<Payment, PaymentError> {
        let payment = db::payments::find_by_id(&self.pool, payment_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(payment_id))?;

        match payment.status {
            PaymentStatus::Paid => {}
            PaymentStatus::Refunded => return Err(PaymentError::AlreadyRefunded(payment_id)),
            PaymentStatus::Pending | PaymentStatus::Failed => {
                return Err(PaymentError::NotRefundable(payment_id));
            }
        }

        let refund_id = self.stripe.create_refund(&payment.gateway_txn_id).await?;
        self.apply_refund(payment, &refund_id).await
    }

    /// Record a gateway-accepted refund. The owner is notified only if this
    /// call moved the payment; a `charge.refunded` webhook may already have.
    async fn apply_refund(&self, payment: Payment, refund_id: &str) -> Result<Payment, PaymentError> {
        let payment_id = payment.id;
        let now = now_millis();
        let mut tx = self.pool.begin().await?;
        let advanced =
            db::payments::advance_status(&mut *tx, payment_id, PaymentStatus::Refunded, now).await?;
        if let Some(order_id) = payment.order_id {
            db::orders::set_payment_status(&mut *tx, order_id, OrderPaymentStatus::Refunded, now)
                .await?;
        }
        tx.commit().await?;

        if !advanced {
            tracing::info!(
                payment_id,
                refund_id = %refund_id,
                "Payment already marked refunded, skipping notification"
            );
            return Ok(Payment {
                status: PaymentStatus::Refunded,
                ..payment
            });
        }

        tracing::info!(
            payment_id,
            refund_id = %refund_id,
            txn_id = %payment.gateway_txn_id,
            "Payment refunded"
        );

        let actor_name = db::users::find_name(&self.pool, payment.user_id)
            .await
            .ok()
            .flatten();
        self.notifier.notify(
            NotificationEvent {
                domain: EventDomain::Payment,
                action: EventAction::Refunded,
                owner: payment.user_id,
                reference_id: payment.order_id.or(payment.reservation_id).unwrap_or(payment_id),
                related_order_id: payment.order_id,
                actor_name,
                amount: Some(format!(
                    "{} {}",
                    format_cents(payment.amount_cents),
                    payment.currency.to_uppercase()
                )),
                payment_related: true,
            },
            Fanout::Owner,
        );

        Ok(Payment {
            status: PaymentStatus::Refunded,
            updated_at: now,
            ..payment
        })
    }
}
