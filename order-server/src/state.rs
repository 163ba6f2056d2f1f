//! Application state shared by every handler

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::JwtService;
use crate::config::{BoxError, Config};
use crate::db::DbService;
use crate::live::ConnectionRegistry;
use crate::notify::{Notifier, build_generator};
use crate::orders::OrderService;
use crate::payments::{PaymentService, Reconciler, StripeClient};
use crate::reservations::ReservationService;

/// Shared application state. Cheap to clone; every field is a handle.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub jwt: JwtService,
    pub registry: ConnectionRegistry,
    pub notifier: Notifier,
    pub orders: OrderService,
    pub reservations: ReservationService,
    pub payments: PaymentService,
    pub reconciler: Reconciler,
}

impl AppState {
    /// Connect storage (migrations included) and wire the services.
    pub async fn new(config: Config) -> Result<Self, BoxError> {
        let db = DbService::connect(&config.database_url).await?;
        Ok(Self::with_pool(config, db.pool))
    }

    /// Wire the services over an existing pool.
    pub fn with_pool(config: Config, pool: SqlitePool) -> Self {
        let registry = ConnectionRegistry::new();
        let generator = build_generator(config.content_generator.as_ref());
        let generator_timeout = config
            .content_generator
            .as_ref()
            .map(|c| c.timeout)
            .unwrap_or(std::time::Duration::from_secs(4));
        let notifier = Notifier::new(pool.clone(), registry.clone(), generator, generator_timeout);

        let stripe = StripeClient::new(&config.stripe_secret_key, &config.stripe_api_base);
        let orders = OrderService::new(pool.clone(), notifier.clone(), &config.currency);
        let reservations =
            ReservationService::new(pool.clone(), notifier.clone(), &config.currency);
        let payments = PaymentService::new(
            pool.clone(),
            stripe,
            notifier.clone(),
            &config.currency,
            &config.checkout_success_url,
            &config.checkout_cancel_url,
        );
        let reconciler = Reconciler::new(
            pool.clone(),
            notifier.clone(),
            &config.stripe_webhook_secret,
            &config.currency,
            config.webhook_timeout,
        );

        Self {
            jwt: JwtService::new(&config.jwt_secret),
            config: Arc::new(config),
            pool,
            registry,
            notifier,
            orders,
            reservations,
            payments,
            reconciler,
        }
    }

    /// Close live sessions and drain pending notification tasks.
    pub async fn shutdown(&self) {
        self.registry.shutdown();
        self.notifier.shutdown().await;
        self.pool.close().await;
    }
}
