//! Event fan-out and the immediate first-attempt pass.

use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};

use zentri_db::models::CreateWebhookDelivery;

use crate::error::WebhookError;
use crate::service::executor::AttemptOutcome;
use crate::service::{DomainEvent, QueueOutcome, WebhookService};
use crate::store::WebhookStore;

impl<S: WebhookStore> WebhookService<S> {
    /// Fan a domain event out to all matching active subscribers and attempt
    /// each new delivery immediately, concurrently.
    ///
    /// Returns the fan-out size and the first-attempt outcomes; deliveries
    /// that became `retrying` count toward neither `delivered` nor `failed`.
    /// One subscriber's failure never prevents the others from being
    /// attempted.
    ///
    /// # Errors
    ///
    /// Only catastrophic store failures propagate; callers may treat them as
    /// "unknown outcome, safe to re-queue" since delivery rows are
    /// idempotent per (subscriber, event) pair.
    pub async fn queue(&self, event: DomainEvent) -> Result<QueueOutcome, WebhookError> {
        let subscribers = self
            .store()
            .find_active_subscribers(event.tenant_id, &event.event_type)
            .await?;

        if subscribers.is_empty() {
            tracing::debug!(
                target: "webhook_delivery",
                tenant_id = %event.tenant_id,
                event_type = %event.event_type,
                "No active subscribers match event type"
            );
            return Ok(QueueOutcome::default());
        }

        tracing::info!(
            target: "webhook_delivery",
            tenant_id = %event.tenant_id,
            event_type = %event.event_type,
            entity_id = %event.entity_id,
            subscriber_count = subscribers.len(),
            "Fanning out event to subscribers"
        );

        // Materialize every row before attempting any of them. Rows are born
        // claimed (due = now + lease) so a concurrent sweep cannot
        // double-attempt a delivery whose first attempt is still in flight.
        let lease = Duration::milliseconds(self.config().claim_lease.as_millis() as i64);
        let mut pending = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            let input = CreateWebhookDelivery {
                tenant_id: event.tenant_id,
                subscriber_id: subscriber.id,
                event_type: event.event_type.clone(),
                event_id: event.entity_id,
                payload: event.payload.clone(),
                max_attempts: self.config().max_attempts,
                next_retry_due: Some(Utc::now() + lease),
            };
            match self.store().create_delivery(input).await {
                Ok(Some(delivery)) => pending.push((delivery, subscriber)),
                Ok(None) => {
                    tracing::debug!(
                        target: "webhook_delivery",
                        subscriber_id = %subscriber.id,
                        event_id = %event.entity_id,
                        "Delivery already queued for this event"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        target: "webhook_delivery",
                        subscriber_id = %subscriber.id,
                        event_id = %event.entity_id,
                        error = %e,
                        "Failed to create delivery row"
                    );
                }
            }
        }

        let queued = pending.len();
        let outcomes: Vec<AttemptOutcome> = stream::iter(pending)
            .map(|(delivery, subscriber)| {
                let executor = self.executor().clone();
                async move { executor.execute(&delivery, &subscriber).await.outcome }
            })
            .buffer_unordered(self.config().delivery_concurrency)
            .collect()
            .await;

        Ok(QueueOutcome {
            queued,
            delivered: outcomes
                .iter()
                .filter(|o| **o == AttemptOutcome::Delivered)
                .count(),
            failed: outcomes
                .iter()
                .filter(|o| **o == AttemptOutcome::Failed)
                .count(),
        })
    }
}
