//! Server configuration
//!
//! Loaded once from the environment (`.env` is read by `main` via dotenvy).

use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Optional external content generator (OpenAI-compatible chat endpoint)
#[derive(Debug, Clone)]
pub struct ContentGeneratorConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL
    pub database_url: String,
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    pub log_level: String,
    /// Daily rolling log files go here when set
    pub log_dir: Option<String>,
    /// HS256 secret for access tokens
    pub jwt_secret: String,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    /// ISO currency code, lowercase
    pub currency: String,
    /// Upper bound on webhook verification + storage
    pub webhook_timeout: Duration,
    pub request_timeout: Duration,
    pub content_generator: Option<ContentGeneratorConfig>,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_millis(name: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = env_or("ENVIRONMENT", "development");

        let content_generator = std::env::var("CONTENT_GENERATOR_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|url| ContentGeneratorConfig {
                url,
                api_key: std::env::var("CONTENT_GENERATOR_API_KEY")
                    .ok()
                    .filter(|s| !s.is_empty()),
                model: env_or("CONTENT_GENERATOR_MODEL", "gpt-4o-mini"),
                timeout: env_millis("CONTENT_GENERATOR_TIMEOUT_MS", 4000),
            });

        Ok(Self {
            database_url: env_or("DATABASE_URL", "sqlite:data/orders.db"),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            log_level: env_or("LOG_LEVEL", "info"),
            log_dir: std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            stripe_secret_key: Self::require_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: Self::require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            stripe_api_base: env_or("STRIPE_API_BASE", "https://api.stripe.com"),
            checkout_success_url: env_or(
                "CHECKOUT_SUCCESS_URL",
                "http://localhost:3000/checkout/success",
            ),
            checkout_cancel_url: env_or(
                "CHECKOUT_CANCEL_URL",
                "http://localhost:3000/checkout/cancel",
            ),
            currency: env_or("CURRENCY", "eur").to_lowercase(),
            webhook_timeout: env_millis("WEBHOOK_TIMEOUT_MS", 10_000),
            request_timeout: env_millis("REQUEST_TIMEOUT_MS", 30_000),
            content_generator,
            environment,
        })
    }

    /// Configuration for tests: in-memory database, fixed secrets
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            http_port: 0,
            environment: "test".into(),
            log_level: "debug".into(),
            log_dir: None,
            jwt_secret: "test-jwt-secret".into(),
            stripe_secret_key: "sk_test".into(),
            stripe_webhook_secret: "whsec_test".into(),
            stripe_api_base: "http://127.0.0.1:9".into(),
            checkout_success_url: "http://localhost/success".into(),
            checkout_cancel_url: "http://localhost/cancel".into(),
            currency: "eur".into(),
            webhook_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            content_generator: None,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
