//! Webhook delivery model.
//!
//! One row per (subscriber, event) notification. The row carries the full
//! retry state machine: `pending` and `retrying` rows are claimable by the
//! sweeper, `delivered` and `failed` are terminal and never re-entered.
//!
//! `next_retry_due` doubles as the claim lease: while an attempt is in
//! flight the claiming statement has pushed it into the future, so a
//! concurrent sweep does not see the row as due. Every post-attempt write
//! restores the at-rest rule that `next_retry_due` is non-null exactly for
//! `retrying` rows. A worker that dies mid-attempt leaves the row claimed
//! until the lease expires, after which the next sweep picks it up again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Delivery lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created, never attempted.
    Pending,
    /// Failed at least once, scheduled for another attempt.
    Retrying,
    /// Terminal success.
    Delivered,
    /// Terminal failure: attempt ceiling reached or short-circuited.
    Failed,
}

impl DeliveryStatus {
    /// Database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retrying => "retrying",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    /// Parse from the database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "retrying" => Some(Self::Retrying),
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

/// One subscriber's notification record for one event.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub subscriber_id: Uuid,
    pub event_type: String,
    pub event_id: Uuid,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_due: Option<DateTime<Utc>>,
    pub last_status_code: Option<i16>,
    pub last_response_body: Option<String>,
    pub last_latency_ms: Option<i32>,
    pub last_error: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookDelivery {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == DeliveryStatus::Pending.as_str()
    }

    #[must_use]
    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered.as_str()
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == DeliveryStatus::Failed.as_str()
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        DeliveryStatus::parse(&self.status).is_some_and(|s| s.is_terminal())
    }
}

/// Input for creating a delivery row at fan-out time.
#[derive(Debug, Clone)]
pub struct CreateWebhookDelivery {
    pub tenant_id: Uuid,
    pub subscriber_id: Uuid,
    pub event_type: String,
    pub event_id: Uuid,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
    /// Initial due time. Fan-out stamps `now + lease` so the row is born
    /// claimed while its immediate first attempt runs.
    pub next_retry_due: Option<DateTime<Utc>>,
}

impl WebhookDelivery {
    /// Insert a delivery row for a (subscriber, event) pair.
    ///
    /// Returns `None` when a row for the pair already exists; re-queuing the
    /// same event is a no-op.
    pub async fn create(
        pool: &sqlx::PgPool,
        input: CreateWebhookDelivery,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO webhook_deliveries (
                tenant_id, subscriber_id, event_type, event_id,
                payload, max_attempts, next_retry_due
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (subscriber_id, event_type, event_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(input.tenant_id)
        .bind(input.subscriber_id)
        .bind(input.event_type)
        .bind(input.event_id)
        .bind(input.payload)
        .bind(input.max_attempts)
        .bind(input.next_retry_due)
        .fetch_optional(pool)
        .await
    }

    /// Fetch a delivery by id.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM webhook_deliveries WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Recent deliveries for one subscriber, newest first. Backs support
    /// tooling; delivery rows are never deleted by this subsystem.
    pub async fn list_for_subscriber(
        pool: &sqlx::PgPool,
        subscriber_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE subscriber_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(subscriber_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Atomically claim up to `batch` due deliveries.
    ///
    /// A row is due when it is `pending` with no due time (left behind by a
    /// cancelled fan-out) or `pending`/`retrying` with `next_retry_due` in
    /// the past. Claiming advances `next_retry_due` by `lease_secs`, and the
    /// `FOR UPDATE SKIP LOCKED` inner select keeps two concurrent sweeps
    /// from claiming the same row.
    pub async fn claim_due(
        pool: &sqlx::PgPool,
        batch: i64,
        lease_secs: f64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE webhook_deliveries
            SET next_retry_due = NOW() + make_interval(secs => $2),
                updated_at = NOW()
            WHERE id IN (
                SELECT id FROM webhook_deliveries
                WHERE status IN ('pending', 'retrying')
                  AND (next_retry_due IS NULL OR next_retry_due <= NOW())
                ORDER BY next_retry_due ASC NULLS FIRST
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(batch)
        .bind(lease_secs)
        .fetch_all(pool)
        .await
    }

    /// Record a successful attempt: terminal `delivered`.
    pub async fn mark_delivered(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
        attempts: i32,
        status_code: i16,
        response_body: Option<&str>,
        latency_ms: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = 'delivered',
                attempts = $3,
                next_retry_due = NULL,
                last_status_code = $4,
                last_response_body = $5,
                last_latency_ms = $6,
                last_error = NULL,
                delivered_at = NOW(),
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(attempts)
        .bind(status_code)
        .bind(response_body)
        .bind(latency_ms)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt with another retry scheduled.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_retrying(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
        attempts: i32,
        error: &str,
        status_code: Option<i16>,
        response_body: Option<&str>,
        latency_ms: Option<i32>,
        next_retry_due: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = 'retrying',
                attempts = $3,
                last_error = $4,
                last_status_code = $5,
                last_response_body = $6,
                last_latency_ms = $7,
                next_retry_due = $8,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(attempts)
        .bind(error)
        .bind(status_code)
        .bind(response_body)
        .bind(latency_ms)
        .bind(next_retry_due)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a terminal failure: ceiling reached or short-circuited.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_failed(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
        attempts: i32,
        error: &str,
        status_code: Option<i16>,
        response_body: Option<&str>,
        latency_ms: Option<i32>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = 'failed',
                attempts = $3,
                last_error = $4,
                last_status_code = $5,
                last_response_body = $6,
                last_latency_ms = $7,
                next_retry_due = NULL,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(attempts)
        .bind(error)
        .bind(status_code)
        .bind(response_body)
        .bind(latency_ms)
        .execute(pool)
        .await?;
        Ok(())
    }
}
