//! Notification text: external generator with deterministic templates
//!
//! The generator only ever supplies title, message and (optionally) the
//! visual type. Anything unusable falls back to [`template`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::models::NotificationType;
use thiserror::Error;

use super::priority::{EventAction, EventDomain};
use crate::config::ContentGeneratorConfig;

pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_MESSAGE_LEN: usize = 500;

/// Who a copy of the notification is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Owner,
    Admin,
}

/// What the text has to describe
#[derive(Debug, Clone, Serialize)]
pub struct ContentContext {
    pub domain: EventDomain,
    pub action: EventAction,
    pub audience: Audience,
    /// Order or reservation id
    pub reference_id: i64,
    /// Display name of the user the event is about
    pub actor_name: Option<String>,
    /// Formatted amount, e.g. `35.00 EUR`
    pub amount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("content generator disabled")]
    Disabled,

    #[error("content generator request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("content generator returned unusable output: {0}")]
    Unusable(String),

    #[error("content generator timed out")]
    Timeout,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, ctx: &ContentContext) -> Result<Content, GeneratorError>;
}

/// Used when no generator is configured
pub struct NoopGenerator;

#[async_trait]
impl ContentGenerator for NoopGenerator {
    async fn generate(&self, _ctx: &ContentContext) -> Result<Content, GeneratorError> {
        Err(GeneratorError::Disabled)
    }
}

/// OpenAI-compatible chat completion endpoint
pub struct HttpContentGenerator {
    client: reqwest::Client,
    config: ContentGeneratorConfig,
}

#[derive(Deserialize)]
struct RawContent {
    title: Option<String>,
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

const SYSTEM_PROMPT: &str = "You write short notifications for a food ordering app. \
Reply with a JSON object only: {\"title\": string (max 60 chars), \"message\": string (max 200 chars), \
\"type\": one of \"success\", \"info\", \"warning\", \"error\"}. \
Never invent amounts, ids or times that are not in the event.";

impl HttpContentGenerator {
    pub fn new(config: ContentGeneratorConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate(&self, ctx: &ContentContext) -> Result<Content, GeneratorError> {
        let event = serde_json::to_string(ctx)
            .map_err(|e| GeneratorError::Unusable(e.to_string()))?;
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": 0.4,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": event },
            ],
        });

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let resp: serde_json::Value = request.send().await?.error_for_status()?.json().await?;

        let text = resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| GeneratorError::Unusable("missing choices[0].message.content".into()))?;
        parse_generated(text)
    }
}

/// Validate generator output. Type is optional; title and message are not.
pub fn parse_generated(text: &str) -> Result<Content, GeneratorError> {
    let raw: RawContent =
        serde_json::from_str(text.trim()).map_err(|e| GeneratorError::Unusable(e.to_string()))?;

    let title = raw.title.map(|t| t.trim().to_string()).unwrap_or_default();
    let message = raw.message.map(|m| m.trim().to_string()).unwrap_or_default();
    if title.is_empty() || message.is_empty() {
        return Err(GeneratorError::Unusable("empty title or message".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN || message.chars().count() > MAX_MESSAGE_LEN {
        return Err(GeneratorError::Unusable("title or message too long".into()));
    }

    Ok(Content {
        title,
        message,
        notification_type: raw
            .kind
            .as_deref()
            .and_then(NotificationType::parse)
            .unwrap_or_default(),
    })
}

/// Build the configured generator, or the no-op one
pub fn build_generator(config: Option<&ContentGeneratorConfig>) -> Arc<dyn ContentGenerator> {
    match config {
        Some(cfg) => match HttpContentGenerator::new(cfg.clone()) {
            Ok(generator) => {
                tracing::info!(url = %cfg.url, model = %cfg.model, "Content generator enabled");
                Arc::new(generator)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Content generator disabled");
                Arc::new(NoopGenerator)
            }
        },
        None => Arc::new(NoopGenerator),
    }
}

/// Ask the generator under `timeout`; any failure yields the template.
pub async fn generate_or_fallback(
    generator: &dyn ContentGenerator,
    ctx: &ContentContext,
    timeout: Duration,
) -> Content {
    let result = match tokio::time::timeout(timeout, generator.generate(ctx)).await {
        Ok(r) => r,
        Err(_) => Err(GeneratorError::Timeout),
    };
    match result {
        Ok(content) => content,
        Err(GeneratorError::Disabled) => template(ctx),
        Err(e) => {
            tracing::debug!(error = %e, domain = ?ctx.domain, action = ?ctx.action, "Using template content");
            template(ctx)
        }
    }
}

/// Deterministic text for every (domain × action × audience)
pub fn template(ctx: &ContentContext) -> Content {
    use Audience::*;
    use EventAction::*;
    use EventDomain::*;
    use NotificationType as T;

    let id = ctx.reference_id;
    let who = ctx.actor_name.as_deref().unwrap_or("A customer");
    let amount = ctx
        .amount
        .as_deref()
        .map(|a| format!(" ({a})"))
        .unwrap_or_default();

    let (title, message, kind) = match (ctx.domain, ctx.action, ctx.audience) {
        (Order, Created, Owner) => (
            "Order received".to_string(),
            format!("We received your order #{id}{amount}."),
            T::Success,
        ),
        (Order, Created, Admin) => (
            "New order".to_string(),
            format!("{who} placed order #{id}{amount}."),
            T::Info,
        ),
        (Order, Preparing, Owner) => (
            "Order in the kitchen".to_string(),
            format!("Your order #{id} is being prepared."),
            T::Info,
        ),
        (Order, EnRoute, Owner) => (
            "Order on its way".to_string(),
            format!("Your order #{id} is on its way."),
            T::Info,
        ),
        (Order, Delivered, Owner) => (
            "Order delivered".to_string(),
            format!("Your order #{id} has been delivered. Enjoy!"),
            T::Success,
        ),
        (Order, Cancelled, Owner) => (
            "Order cancelled".to_string(),
            format!("Your order #{id} has been cancelled."),
            T::Warning,
        ),
        (Order, action, Admin) => (
            "Order updated".to_string(),
            format!("Order #{id} for {who} is now {}.", action_label(action)),
            if action == Cancelled { T::Warning } else { T::Info },
        ),
        (Payment, Succeeded | Completed, Owner) => (
            "Payment received".to_string(),
            format!("Thanks! Payment for #{id}{amount} was successful."),
            T::Success,
        ),
        (Payment, Succeeded | Completed, Admin) => (
            "Payment received".to_string(),
            format!("{who} paid #{id}{amount}."),
            T::Success,
        ),
        (Payment, Failed, Owner) => (
            "Payment failed".to_string(),
            format!("Payment for #{id} did not go through. Please try again."),
            T::Error,
        ),
        (Payment, Failed, Admin) => (
            "Payment failed".to_string(),
            format!("Payment by {who} for #{id} failed."),
            T::Error,
        ),
        (Payment, Refunded, Owner) => (
            "Refund issued".to_string(),
            format!("Your payment for #{id}{amount} has been refunded."),
            T::Info,
        ),
        (Payment, Refunded, Admin) => (
            "Refund issued".to_string(),
            format!("Payment by {who} for #{id}{amount} was refunded."),
            T::Info,
        ),
        (Reservation, Confirmed, Owner) => (
            "Reservation confirmed".to_string(),
            format!("Your reservation #{id} is confirmed."),
            T::Success,
        ),
        (Reservation, Created, Owner) => (
            "Reservation requested".to_string(),
            format!("We received your reservation #{id}."),
            T::Info,
        ),
        (Reservation, action, Admin) => (
            "Reservation update".to_string(),
            format!("Reservation #{id} for {who} is {}.", action_label(action)),
            T::Info,
        ),
        (domain, action, Admin) => (
            "Update".to_string(),
            format!(
                "{} #{id} for {who} is {}.",
                domain_label(domain),
                action_label(action)
            ),
            T::Info,
        ),
        (domain, action, Owner) => (
            "Update".to_string(),
            format!(
                "Your {} #{id} is {}.",
                domain_label(domain),
                action_label(action)
            ),
            T::Info,
        ),
    };

    Content {
        title,
        message,
        notification_type: kind,
    }
}

fn domain_label(domain: EventDomain) -> &'static str {
    match domain {
        EventDomain::Order => "order",
        EventDomain::Payment => "payment",
        EventDomain::Reservation => "reservation",
    }
}

fn action_label(action: EventAction) -> &'static str {
    match action {
        EventAction::Created => "new",
        EventAction::Preparing => "being prepared",
        EventAction::EnRoute => "on its way",
        EventAction::Delivered => "delivered",
        EventAction::Cancelled => "cancelled",
        EventAction::Confirmed => "confirmed",
        EventAction::Completed => "completed",
        EventAction::Succeeded => "paid",
        EventAction::Failed => "failed",
        EventAction::Refunded => "refunded",
    }
}
