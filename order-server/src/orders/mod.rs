//! Order transaction manager
//!
//! ```text
//! create_order:  validate ─► BEGIN ─► catalog check ─► resolve location
//!                ─► INSERT order ─► INSERT lines (price read in-statement)
//!                ─► settle total ─► COMMIT ─► notify (detached)
//! update_status: read ─► check transition ─► compare-and-set ─► notify (detached)
//! ```
//!
//! Prices come only from the catalog at creation time and are snapshotted
//! into the lines; later catalog edits never touch an existing order.

pub mod error;
pub mod location;

use shared::models::{
    CreateOrderRequest, Order, OrderCreated, OrderDetail, OrderStatus, UserId,
};
use shared::util::{cents_to_decimal, format_cents, now_millis, snowflake_id};
use sqlx::SqlitePool;

use crate::db::{self, orders::NewOrder};
use crate::notify::priority::{EventAction, EventDomain};
use crate::notify::{Fanout, NotificationEvent, Notifier};
use crate::validation::{
    MAX_LOCATION_LEN, MAX_ORDER_LINES, MAX_QUANTITY, MIN_LOCATION_LEN, MIN_QUANTITY,
    validate_coordinates, validate_range,
};

pub use error::OrderError;

#[derive(Clone)]
pub struct OrderService {
    pool: SqlitePool,
    notifier: Notifier,
    currency: String,
}

impl OrderService {
    pub fn new(pool: SqlitePool, notifier: Notifier, currency: impl Into<String>) -> Self {
        Self {
            pool,
            notifier,
            currency: currency.into(),
        }
    }

    /// Create an order from catalog prices. Nothing is persisted on failure.
    pub async fn create_order(
        &self,
        user_id: UserId,
        req: CreateOrderRequest,
    ) -> Result<OrderCreated, OrderError> {
        validate_create(&req)?;

        let mut tx = self.pool.begin().await?;

        for item in &req.items {
            if db::catalog::find_active(&mut *tx, item.product_id)
                .await?
                .is_none()
            {
                return Err(OrderError::ProductUnavailable(item.product_id));
            }
        }

        let profile = db::users::find_profile(&mut *tx, user_id)
            .await?
            .ok_or(OrderError::UserNotFound(user_id))?;
        let resolved = location::resolve(
            req.location.as_deref(),
            req.latitude,
            req.longitude,
            Some(&profile),
        );

        let order_id = snowflake_id();
        db::orders::insert(
            &mut *tx,
            &NewOrder {
                id: order_id,
                user_id,
                delivery_location: &resolved.text,
                latitude: resolved.latitude,
                longitude: resolved.longitude,
                now: now_millis(),
            },
        )
        .await?;

        for item in &req.items {
            let inserted = db::orders::insert_line_from_catalog(
                &mut *tx,
                snowflake_id(),
                order_id,
                item.product_id,
                item.quantity,
            )
            .await?;
            if !inserted {
                return Err(OrderError::ProductUnavailable(item.product_id));
            }
        }

        let total_cents = db::orders::settle_total(&mut *tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id,
            user_id = %user_id,
            lines = req.items.len(),
            total_cents,
            "Order created"
        );

        self.notifier.notify(
            NotificationEvent {
                domain: EventDomain::Order,
                action: EventAction::Created,
                owner: user_id,
                reference_id: order_id,
                related_order_id: Some(order_id),
                actor_name: Some(profile.name),
                amount: Some(self.display_amount(total_cents)),
                payment_related: false,
            },
            Fanout::OwnerAndAdmins,
        );

        Ok(OrderCreated {
            order_id,
            total: cents_to_decimal(total_cents),
        })
    }

    /// Privileged lifecycle move. Callers must already be back-office.
    pub async fn update_status(
        &self,
        order_id: i64,
        next: OrderStatus,
    ) -> Result<Order, OrderError> {
        let current = db::orders::find_by_id(&self.pool, order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        if !current.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        let now = now_millis();
        let applied =
            db::orders::compare_and_set_status(&self.pool, order_id, current.status, next, now)
                .await?;
        if !applied {
            tracing::warn!(order_id, from = %current.status, to = %next, "Concurrent status change");
            return Err(OrderError::Conflict(order_id));
        }

        tracing::info!(order_id, from = %current.status, to = %next, "Order status changed");

        let actor_name = db::users::find_name(&self.pool, current.user_id)
            .await
            .ok()
            .flatten();
        self.notifier.notify(
            NotificationEvent {
                domain: EventDomain::Order,
                action: next.into(),
                owner: current.user_id,
                reference_id: order_id,
                related_order_id: Some(order_id),
                actor_name,
                amount: None,
                payment_related: false,
            },
            Fanout::OwnerAndAdmins,
        );

        Ok(Order {
            status: next,
            updated_at: now,
            ..current
        })
    }

    /// Order with lines. Non-owners outside the back office see `NotFound`.
    pub async fn get_detail(
        &self,
        order_id: i64,
        requester: UserId,
        back_office: bool,
    ) -> Result<OrderDetail, OrderError> {
        let order = db::orders::find_by_id(&self.pool, order_id)
            .await?
            .filter(|o| back_office || o.user_id == requester)
            .ok_or(OrderError::NotFound(order_id))?;
        let lines = db::orders::find_lines(&self.pool, order_id).await?;
        Ok(OrderDetail::new(order, lines))
    }

    pub async fn list_own(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, OrderError> {
        Ok(db::orders::list_by_user(&self.pool, user_id, limit, offset).await?)
    }

    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, OrderError> {
        Ok(db::orders::list_all(&self.pool, status, limit, offset).await?)
    }

    fn display_amount(&self, cents: i64) -> String {
        format!("{} {}", format_cents(cents), self.currency.to_uppercase())
    }
}

/// Input checks, all before touching storage
fn validate_create(req: &CreateOrderRequest) -> Result<(), OrderError> {
    if req.items.is_empty() {
        return Err(OrderError::Empty);
    }
    if req.items.len() > MAX_ORDER_LINES {
        return Err(OrderError::InvalidInput(
            shared::error::AppError::validation(format!(
                "An order can have at most {MAX_ORDER_LINES} lines"
            ))
            .with_detail("field", "items"),
        ));
    }
    for (i, item) in req.items.iter().enumerate() {
        validate_range(
            item.quantity,
            &format!("items[{i}].quantity"),
            MIN_QUANTITY,
            MAX_QUANTITY,
        )
        .map_err(OrderError::InvalidInput)?;
    }
    if let Some(text) = &req.location {
        let len = text.trim().chars().count();
        if !(MIN_LOCATION_LEN..=MAX_LOCATION_LEN).contains(&len) {
            return Err(OrderError::InvalidInput(
                shared::error::AppError::validation(format!(
                    "location must be {MIN_LOCATION_LEN}-{MAX_LOCATION_LEN} characters"
                ))
                .with_detail("field", "location"),
            ));
        }
    }
    validate_coordinates(req.latitude, req.longitude).map_err(OrderError::InvalidInput)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::orders::fixtures::{count, seed_product, seed_user, set_price};
    use crate::db::test_pool;
    use crate::live::ConnectionRegistry;
    use crate::notify::NoopGenerator;
    use shared::models::{NotificationPriority, OrderItemInput};
    use std::sync::Arc;
    use std::time::Duration;

    async fn setup() -> (SqlitePool, OrderService, Notifier) {
        let pool = test_pool().await;
        seed_user(&pool, 1, "Ana", Some("Calle Mayor 1, Madrid")).await;
        seed_product(&pool, 10, "Burger", 1000, true).await;
        seed_product(&pool, 20, "Fries", 500, true).await;
        seed_product(&pool, 30, "Seasonal", 800, false).await;
        let notifier = Notifier::new(
            pool.clone(),
            ConnectionRegistry::new(),
            Arc::new(NoopGenerator),
            Duration::from_millis(100),
        );
        let service = OrderService::new(pool.clone(), notifier.clone(), "eur");
        (pool, service, notifier)
    }

    fn uid() -> UserId {
        UserId::new(1).unwrap()
    }

    fn request(items: &[(i64, i64)]) -> CreateOrderRequest {
        CreateOrderRequest {
            items: items
                .iter()
                .map(|&(product_id, quantity)| OrderItemInput {
                    product_id,
                    quantity,
                })
                .collect(),
            location: Some("Calle Luna 5".into()),
            latitude: None,
            longitude: None,
        }
    }

    #[tokio::test]
    async fn total_is_computed_from_catalog() {
        let (pool, service, _) = setup().await;
        let created = service
            .create_order(uid(), request(&[(10, 2), (20, 3)]))
            .await
            .unwrap();
        assert_eq!(created.total.to_string(), "35.00");

        let detail = service.get_detail(created.order_id, uid(), false).await.unwrap();
        assert_eq!(detail.order.status, OrderStatus::Received);
        assert_eq!(detail.order.total_cents, 3500);
        assert_eq!(detail.lines.len(), 2);
        assert_eq!(detail.order.delivery_location, "Calle Luna 5");
        assert_eq!(count(&pool, "order_lines").await, 2);
    }

    #[tokio::test]
    async fn later_price_change_does_not_touch_order() {
        let (pool, service, _) = setup().await;
        let created = service.create_order(uid(), request(&[(10, 2)])).await.unwrap();

        set_price(&pool, 10, 5000).await;

        let detail = service.get_detail(created.order_id, uid(), false).await.unwrap();
        assert_eq!(detail.order.total_cents, 2000);
        let sum: i64 = detail.lines.iter().map(|l| l.line_total_cents()).sum();
        assert_eq!(sum, detail.order.total_cents);
    }

    #[tokio::test]
    async fn inactive_product_persists_nothing() {
        let (pool, service, _) = setup().await;
        let err = service
            .create_order(uid(), request(&[(10, 1), (30, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ProductUnavailable(30)));

        let err = service
            .create_order(uid(), request(&[(999, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ProductUnavailable(999)));

        assert_eq!(count(&pool, "orders").await, 0);
        assert_eq!(count(&pool, "order_lines").await, 0);
    }

    #[tokio::test]
    async fn empty_items_rejected_before_storage() {
        let (pool, service, _) = setup().await;
        pool.close().await;

        let err = service.create_order(uid(), request(&[])).await.unwrap_err();
        assert!(matches!(err, OrderError::Empty));
        let err = service.create_order(uid(), request(&[(10, 0)])).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidInput(_)));
        let err = service.create_order(uid(), request(&[(10, 101)])).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn placeholder_location_uses_profile_address() {
        let (_, service, _) = setup().await;
        let mut req = request(&[(10, 1)]);
        req.location = Some("Detecting location...".into());

        let created = service.create_order(uid(), req).await.unwrap();
        let detail = service.get_detail(created.order_id, uid(), false).await.unwrap();
        assert_eq!(detail.order.delivery_location, "Calle Mayor 1, Madrid");
        assert!(detail.order.latitude.is_some());
    }

    #[tokio::test]
    async fn creation_notifies_owner_and_admins() {
        let (pool, service, notifier) = setup().await;
        service.create_order(uid(), request(&[(10, 1)])).await.unwrap();
        notifier.flush().await;

        let own = db::notifications::list(&pool, Some(uid()), false, 10, 0).await.unwrap();
        let admin = db::notifications::list(&pool, None, false, 10, 0).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(admin.len(), 1);
        assert_eq!(own[0].priority, NotificationPriority::Medium);
        assert!(admin[0].message.contains("Ana"));
    }

    #[tokio::test]
    async fn lifecycle_moves_forward_only() {
        let (_, service, _) = setup().await;
        let id = service.create_order(uid(), request(&[(10, 1)])).await.unwrap().order_id;

        for next in [OrderStatus::Preparing, OrderStatus::EnRoute, OrderStatus::Delivered] {
            let order = service.update_status(id, next).await.unwrap();
            assert_eq!(order.status, next);
        }

        let err = service.update_status(id, OrderStatus::Preparing).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Preparing
            }
        ));
        let err = service.update_status(id, OrderStatus::Cancelled).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn same_state_and_unknown_order_rejected() {
        let (_, service, _) = setup().await;
        let id = service.create_order(uid(), request(&[(10, 1)])).await.unwrap().order_id;

        let err = service.update_status(id, OrderStatus::Received).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
        let err = service.update_status(12345, OrderStatus::Preparing).await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound(12345)));
    }

    #[tokio::test]
    async fn cancellation_is_high_priority_for_both_audiences() {
        let (pool, service, notifier) = setup().await;
        let id = service.create_order(uid(), request(&[(10, 1)])).await.unwrap().order_id;
        service.update_status(id, OrderStatus::Cancelled).await.unwrap();
        notifier.flush().await;

        let own = db::notifications::list(&pool, Some(uid()), false, 10, 0).await.unwrap();
        let admin = db::notifications::list(&pool, None, false, 10, 0).await.unwrap();
        assert_eq!(own[0].priority, NotificationPriority::High);
        assert_eq!(admin[0].priority, NotificationPriority::High);
        assert_eq!(own[0].title, "Order cancelled");
        assert_ne!(own[0].message, admin[0].message);
    }

    #[tokio::test]
    async fn other_users_cannot_read_order() {
        let (pool, service, _) = setup().await;
        seed_user(&pool, 2, "Luis", None).await;
        let id = service.create_order(uid(), request(&[(10, 1)])).await.unwrap().order_id;

        let stranger = UserId::new(2).unwrap();
        assert!(matches!(
            service.get_detail(id, stranger, false).await,
            Err(OrderError::NotFound(_))
        ));
        assert!(service.get_detail(id, stranger, true).await.is_ok());
    }
}
