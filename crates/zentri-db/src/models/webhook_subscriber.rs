//! Webhook subscriber model.
//!
//! A subscriber is a tenant-registered HTTP endpoint with a shared signing
//! secret and a set of subscribed event types. Delivery health bookkeeping
//! (consecutive failures, auto-disable) lives on this row; registration and
//! re-enablement are management operations handled elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered webhook endpoint.
#[derive(Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookSubscriber {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub url: String,
    /// Shared HMAC signing secret. Redacted from Debug output and never
    /// serialized.
    #[serde(skip_serializing, default)]
    pub secret: String,
    pub event_types: Vec<String>,
    pub active: bool,
    pub consecutive_failures: i32,
    pub last_error: Option<String>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for WebhookSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSubscriber")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("url", &self.url)
            .field("secret", &"<redacted>")
            .field("event_types", &self.event_types)
            .field("active", &self.active)
            .field("consecutive_failures", &self.consecutive_failures)
            .field("last_error", &self.last_error)
            .field("last_triggered_at", &self.last_triggered_at)
            .finish_non_exhaustive()
    }
}

/// Input for creating a subscriber row.
#[derive(Debug, Clone)]
pub struct CreateWebhookSubscriber {
    pub tenant_id: Uuid,
    pub url: String,
    pub secret: String,
    pub event_types: Vec<String>,
}

impl WebhookSubscriber {
    /// Insert a new subscriber.
    pub async fn create(
        pool: &sqlx::PgPool,
        input: CreateWebhookSubscriber,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO webhook_subscribers (tenant_id, url, secret, event_types)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(input.tenant_id)
        .bind(input.url)
        .bind(input.secret)
        .bind(input.event_types)
        .fetch_one(pool)
        .await
    }

    /// Fetch a subscriber by id.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM webhook_subscribers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All active subscribers of a tenant whose subscribed event types
    /// include `event_type`.
    pub async fn find_active_by_event_type(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_subscribers
            WHERE tenant_id = $1
              AND active
              AND $2 = ANY(event_types)
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id)
        .bind(event_type)
        .fetch_all(pool)
        .await
    }

    /// Atomically increment the consecutive-failure counter and record the
    /// error. Returns the post-increment value so callers can evaluate the
    /// disable threshold against a fresh read.
    pub async fn record_failure(
        pool: &sqlx::PgPool,
        id: Uuid,
        error: &str,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE webhook_subscribers
            SET consecutive_failures = consecutive_failures + 1,
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING consecutive_failures
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_one(pool)
        .await
    }

    /// Reset the failure counter, clear the last error, and stamp the last
    /// successful trigger time.
    pub async fn record_success(pool: &sqlx::PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_subscribers
            SET consecutive_failures = 0,
                last_error = NULL,
                last_triggered_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Deactivate a subscriber. One-way from this subsystem's point of view;
    /// re-enabling is an external management action.
    pub async fn disable(pool: &sqlx::PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_subscribers
            SET active = FALSE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
