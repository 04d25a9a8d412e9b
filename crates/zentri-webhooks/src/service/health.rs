//! Per-subscriber delivery health tracking and auto-disable.

use zentri_db::models::WebhookSubscriber;

use crate::store::WebhookStore;

/// Observes every delivery outcome and disables subscribers whose
/// consecutive-failure count reaches the configured threshold.
///
/// Health bookkeeping is best-effort: a store error here is logged and the
/// delivery outcome stands. The threshold is always evaluated against the
/// freshly incremented counter returned by the store, never a stale read.
#[derive(Clone)]
pub struct HealthTracker<S: WebhookStore> {
    store: S,
    disable_threshold: i32,
}

impl<S: WebhookStore> HealthTracker<S> {
    pub fn new(store: S, disable_threshold: i32) -> Self {
        Self {
            store,
            disable_threshold,
        }
    }

    /// Reset the failure counter, clear the last error, and stamp the last
    /// successful trigger time.
    pub async fn record_success(&self, subscriber: &WebhookSubscriber) {
        if let Err(e) = self.store.record_subscriber_success(subscriber.id).await {
            tracing::error!(
                target: "webhook_delivery",
                subscriber_id = %subscriber.id,
                error = %e,
                "Failed to reset subscriber failure counter"
            );
        }
    }

    /// Increment the failure counter; disable the subscriber when the
    /// post-increment value reaches the threshold.
    pub async fn record_failure(&self, subscriber: &WebhookSubscriber, error: &str) {
        let failures = match self
            .store
            .record_subscriber_failure(subscriber.id, error)
            .await
        {
            Ok(failures) => failures,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    subscriber_id = %subscriber.id,
                    error = %e,
                    "Failed to increment subscriber failure counter"
                );
                return;
            }
        };

        if failures >= self.disable_threshold {
            tracing::warn!(
                target: "webhook_delivery",
                subscriber_id = %subscriber.id,
                tenant_id = %subscriber.tenant_id,
                consecutive_failures = failures,
                threshold = self.disable_threshold,
                "Auto-disabling subscriber after consecutive failures"
            );

            if let Err(e) = self.store.disable_subscriber(subscriber.id).await {
                tracing::error!(
                    target: "webhook_delivery",
                    subscriber_id = %subscriber.id,
                    error = %e,
                    "Failed to auto-disable subscriber"
                );
            }
        }
    }
}
