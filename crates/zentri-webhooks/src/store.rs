//! Persistence seam for the delivery engine.
//!
//! The engine is generic over [`WebhookStore`] so the executor, health
//! tracker, and sweeper can be driven against an in-memory fake in tests.
//! [`PgWebhookStore`] is the production implementation, delegating to the
//! zentri-db models; there is no hidden global handle, the store is
//! constructed once and injected.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use zentri_db::models::{CreateWebhookDelivery, WebhookDelivery, WebhookSubscriber};

use crate::error::WebhookError;

/// Response metadata recorded with a delivery attempt.
#[derive(Debug, Clone, Default)]
pub struct AttemptRecord {
    pub status_code: Option<i16>,
    pub response_body: Option<String>,
    pub latency_ms: Option<i32>,
}

/// Read/write operations the engine needs from the relational store.
pub trait WebhookStore: Clone + Send + Sync + 'static {
    /// Active subscribers of `tenant_id` subscribed to `event_type`.
    async fn find_active_subscribers(
        &self,
        tenant_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscriber>, WebhookError>;

    async fn find_subscriber(&self, id: Uuid)
        -> Result<Option<WebhookSubscriber>, WebhookError>;

    /// Insert a delivery row; `None` when the (subscriber, event) pair is
    /// already queued.
    async fn create_delivery(
        &self,
        input: CreateWebhookDelivery,
    ) -> Result<Option<WebhookDelivery>, WebhookError>;

    /// Atomically claim up to `batch` due deliveries, leasing each claimed
    /// row for `lease` so concurrent sweeps cannot double-attempt it.
    async fn claim_due_deliveries(
        &self,
        batch: i64,
        lease: Duration,
    ) -> Result<Vec<WebhookDelivery>, WebhookError>;

    async fn mark_delivered(
        &self,
        delivery: &WebhookDelivery,
        attempts: i32,
        record: &AttemptRecord,
    ) -> Result<(), WebhookError>;

    async fn mark_retrying(
        &self,
        delivery: &WebhookDelivery,
        attempts: i32,
        error: &str,
        record: &AttemptRecord,
        next_retry_due: DateTime<Utc>,
    ) -> Result<(), WebhookError>;

    async fn mark_failed(
        &self,
        delivery: &WebhookDelivery,
        attempts: i32,
        error: &str,
        record: &AttemptRecord,
    ) -> Result<(), WebhookError>;

    /// Atomic increment of the subscriber's consecutive-failure counter;
    /// returns the post-increment value.
    async fn record_subscriber_failure(
        &self,
        id: Uuid,
        error: &str,
    ) -> Result<i32, WebhookError>;

    async fn record_subscriber_success(&self, id: Uuid) -> Result<(), WebhookError>;

    async fn disable_subscriber(&self, id: Uuid) -> Result<(), WebhookError>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgWebhookStore {
    pool: PgPool,
}

impl PgWebhookStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl WebhookStore for PgWebhookStore {
    async fn find_active_subscribers(
        &self,
        tenant_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscriber>, WebhookError> {
        Ok(WebhookSubscriber::find_active_by_event_type(&self.pool, tenant_id, event_type).await?)
    }

    async fn find_subscriber(
        &self,
        id: Uuid,
    ) -> Result<Option<WebhookSubscriber>, WebhookError> {
        Ok(WebhookSubscriber::find_by_id(&self.pool, id).await?)
    }

    async fn create_delivery(
        &self,
        input: CreateWebhookDelivery,
    ) -> Result<Option<WebhookDelivery>, WebhookError> {
        Ok(WebhookDelivery::create(&self.pool, input).await?)
    }

    async fn claim_due_deliveries(
        &self,
        batch: i64,
        lease: Duration,
    ) -> Result<Vec<WebhookDelivery>, WebhookError> {
        let lease_secs = lease.num_milliseconds() as f64 / 1000.0;
        Ok(WebhookDelivery::claim_due(&self.pool, batch, lease_secs).await?)
    }

    async fn mark_delivered(
        &self,
        delivery: &WebhookDelivery,
        attempts: i32,
        record: &AttemptRecord,
    ) -> Result<(), WebhookError> {
        WebhookDelivery::mark_delivered(
            &self.pool,
            delivery.tenant_id,
            delivery.id,
            attempts,
            record.status_code.unwrap_or_default(),
            record.response_body.as_deref(),
            record.latency_ms.unwrap_or_default(),
        )
        .await?;
        Ok(())
    }

    async fn mark_retrying(
        &self,
        delivery: &WebhookDelivery,
        attempts: i32,
        error: &str,
        record: &AttemptRecord,
        next_retry_due: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        WebhookDelivery::mark_retrying(
            &self.pool,
            delivery.tenant_id,
            delivery.id,
            attempts,
            error,
            record.status_code,
            record.response_body.as_deref(),
            record.latency_ms,
            next_retry_due,
        )
        .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        delivery: &WebhookDelivery,
        attempts: i32,
        error: &str,
        record: &AttemptRecord,
    ) -> Result<(), WebhookError> {
        WebhookDelivery::mark_failed(
            &self.pool,
            delivery.tenant_id,
            delivery.id,
            attempts,
            error,
            record.status_code,
            record.response_body.as_deref(),
            record.latency_ms,
        )
        .await?;
        Ok(())
    }

    async fn record_subscriber_failure(
        &self,
        id: Uuid,
        error: &str,
    ) -> Result<i32, WebhookError> {
        Ok(WebhookSubscriber::record_failure(&self.pool, id, error).await?)
    }

    async fn record_subscriber_success(&self, id: Uuid) -> Result<(), WebhookError> {
        Ok(WebhookSubscriber::record_success(&self.pool, id).await?)
    }

    async fn disable_subscriber(&self, id: Uuid) -> Result<(), WebhookError> {
        Ok(WebhookSubscriber::disable(&self.pool, id).await?)
    }
}
