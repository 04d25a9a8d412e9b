//! Error types for the webhook delivery engine.
//!
//! Only batch-catastrophic conditions surface as `WebhookError` from the
//! public operations; per-delivery problems (bad URL, missing secret,
//! transport failures, non-2xx responses) are recorded on the delivery row
//! and the subscriber's health counters instead of propagating.

use thiserror::Error;

/// Webhook engine error variants.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Subscriber not found")]
    SubscriberNotFound,

    #[error("Subscriber has no signing secret configured")]
    MissingSecret,

    #[error("Invalid delivery URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to serialize event payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
