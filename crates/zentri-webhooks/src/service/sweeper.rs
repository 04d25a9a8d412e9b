//! Periodic retry sweep over due deliveries.

use chrono::Duration;
use futures::stream::{self, StreamExt};

use zentri_db::models::WebhookDelivery;

use crate::error::WebhookError;
use crate::service::executor::AttemptOutcome;
use crate::service::{SweepOutcome, WebhookService};
use crate::store::{AttemptRecord, WebhookStore};

impl<S: WebhookStore> WebhookService<S> {
    /// Claim and re-attempt due deliveries, up to the configured batch.
    ///
    /// Idempotent with no due work. Deliveries whose subscriber is gone or
    /// disabled are short-circuited to `failed` without a network call.
    /// Every claimed row reaches a recorded outcome; one delivery's failure
    /// never aborts the sweep.
    ///
    /// # Errors
    ///
    /// Only a catastrophic store failure during the claim propagates.
    pub async fn sweep(&self) -> Result<SweepOutcome, WebhookError> {
        let lease = Duration::milliseconds(self.config().claim_lease.as_millis() as i64);
        let due = self
            .store()
            .claim_due_deliveries(self.config().sweep_batch_size, lease)
            .await?;

        if due.is_empty() {
            return Ok(SweepOutcome::default());
        }

        tracing::info!(
            target: "webhook_delivery",
            batch = due.len(),
            "Sweeping due deliveries"
        );

        let outcomes: Vec<AttemptOutcome> = stream::iter(due)
            .map(|delivery| {
                let service = self.clone();
                async move { service.process_due(delivery).await }
            })
            .buffer_unordered(self.config().delivery_concurrency)
            .collect()
            .await;

        Ok(SweepOutcome {
            processed: outcomes.len(),
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

    /// Re-attempt one claimed delivery.
    async fn process_due(&self, delivery: WebhookDelivery) -> AttemptOutcome {
        let subscriber = match self.store().find_subscriber(delivery.subscriber_id).await {
            Ok(Some(subscriber)) => subscriber,
            Ok(None) => {
                return self
                    .short_circuit(&delivery, "subscriber not found")
                    .await;
            }
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    delivery_id = %delivery.id,
                    subscriber_id = %delivery.subscriber_id,
                    error = %e,
                    "Failed to load subscriber for retry"
                );
                // Still claimed; the row resurfaces once the lease expires.
                return AttemptOutcome::Retrying;
            }
        };

        if !subscriber.active {
            return self.short_circuit(&delivery, "subscriber disabled").await;
        }

        self.executor().execute(&delivery, &subscriber).await.outcome
    }

    /// Fail a delivery without a network call and without consuming an
    /// attempt.
    async fn short_circuit(&self, delivery: &WebhookDelivery, reason: &str) -> AttemptOutcome {
        tracing::info!(
            target: "webhook_delivery",
            delivery_id = %delivery.id,
            subscriber_id = %delivery.subscriber_id,
            reason,
            "Short-circuiting delivery"
        );

        if let Err(e) = self
            .store()
            .mark_failed(delivery, delivery.attempts, reason, &AttemptRecord::default())
            .await
        {
            tracing::error!(
                target: "webhook_delivery",
                delivery_id = %delivery.id,
                error = %e,
                "Failed to short-circuit delivery"
            );
        }
        AttemptOutcome::Failed
    }
}
