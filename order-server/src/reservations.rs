//! Table reservations (created pending, confirmed by a paid deposit)

use shared::error::{AppError, ErrorCode};
use shared::models::{CreateReservationRequest, Reservation, ReservationStatus, UserId};
use shared::util::{format_cents, now_millis, snowflake_id};
use sqlx::SqlitePool;

use crate::db;
use crate::error::ServiceResult;
use crate::notify::priority::{EventAction, EventDomain};
use crate::notify::{Fanout, NotificationEvent, Notifier};
use crate::validation::{MAX_NOTE_LEN, MAX_PARTY_SIZE, validate_optional_text, validate_range};

#[derive(Clone)]
pub struct ReservationService {
    pool: SqlitePool,
    notifier: Notifier,
    currency: String,
}

impl ReservationService {
    pub fn new(pool: SqlitePool, notifier: Notifier, currency: impl Into<String>) -> Self {
        Self {
            pool,
            notifier,
            currency: currency.into(),
        }
    }

    pub async fn create(
        &self,
        user_id: UserId,
        req: CreateReservationRequest,
    ) -> ServiceResult<Reservation> {
        let now = now_millis();
        validate_range(req.party_size, "party_size", 1, MAX_PARTY_SIZE)?;
        validate_optional_text(&req.note, "note", MAX_NOTE_LEN)?;
        if req.reserved_for <= now {
            return Err(AppError::validation("reserved_for must be in the future")
                .with_detail("field", "reserved_for")
                .into());
        }
        if req.deposit_cents < 0 {
            return Err(AppError::validation("deposit_cents must not be negative")
                .with_detail("field", "deposit_cents")
                .into());
        }

        let reservation = Reservation {
            id: snowflake_id(),
            user_id,
            party_size: req.party_size,
            reserved_for: req.reserved_for,
            note: req
                .note
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            status: ReservationStatus::Pending,
            deposit_cents: req.deposit_cents,
            created_at: now,
            updated_at: now,
        };

        let actor_name = db::users::find_name(&self.pool, user_id)
            .await?
            .ok_or_else(|| {
                AppError::new(ErrorCode::UserNotFound).with_detail("user_id", user_id.get())
            })?;
        db::reservations::insert(&self.pool, &reservation).await?;

        tracing::info!(
            reservation_id = reservation.id,
            user_id = %user_id,
            party_size = reservation.party_size,
            "Reservation created"
        );

        self.notifier.notify(
            NotificationEvent {
                domain: EventDomain::Reservation,
                action: EventAction::Created,
                owner: user_id,
                reference_id: reservation.id,
                related_order_id: None,
                actor_name: Some(actor_name),
                amount: (reservation.deposit_cents > 0).then(|| {
                    format!(
                        "{} {}",
                        format_cents(reservation.deposit_cents),
                        self.currency.to_uppercase()
                    )
                }),
                payment_related: false,
            },
            Fanout::OwnerAndAdmins,
        );

        Ok(reservation)
    }

    pub async fn list_own(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> ServiceResult<Vec<Reservation>> {
        Ok(db::reservations::list_by_user(&self.pool, user_id, limit, offset).await?)
    }
}
