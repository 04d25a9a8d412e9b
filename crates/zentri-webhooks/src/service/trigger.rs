//! Single-shot diagnostic ping for one subscriber.

use chrono::{Duration, Utc};
use uuid::Uuid;

use zentri_db::models::CreateWebhookDelivery;

use crate::error::WebhookError;
use crate::service::executor::AttemptOutcome;
use crate::service::{TestOutcome, WebhookService};
use crate::store::WebhookStore;

/// Event type of synthesized diagnostic deliveries.
pub const TEST_EVENT_TYPE: &str = "test.ping";

impl<S: WebhookStore> WebhookService<S> {
    /// Send a one-off `test.ping` to a single subscriber, bypassing fan-out.
    ///
    /// The synthesized delivery has `max_attempts = 1`, so it is never
    /// retried regardless of outcome, and it does not affect the fan-out
    /// accounting of real events.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::SubscriberNotFound` for an unknown id;
    /// otherwise only store failures propagate.
    pub async fn test_subscriber(&self, subscriber_id: Uuid) -> Result<TestOutcome, WebhookError> {
        let subscriber = self
            .store()
            .find_subscriber(subscriber_id)
            .await?
            .ok_or(WebhookError::SubscriberNotFound)?;

        let lease = Duration::milliseconds(self.config().claim_lease.as_millis() as i64);
        let input = CreateWebhookDelivery {
            tenant_id: subscriber.tenant_id,
            subscriber_id: subscriber.id,
            event_type: TEST_EVENT_TYPE.to_string(),
            event_id: Uuid::new_v4(),
            payload: serde_json::json!({
                "message": "Test delivery from zentri",
                "subscriber_id": subscriber.id,
            }),
            max_attempts: 1,
            next_retry_due: Some(Utc::now() + lease),
        };

        let delivery = self
            .store()
            .create_delivery(input)
            .await?
            .ok_or_else(|| WebhookError::Internal("Test delivery collided".to_string()))?;

        tracing::info!(
            target: "webhook_delivery",
            subscriber_id = %subscriber.id,
            delivery_id = %delivery.id,
            "Sending test ping"
        );

        let result = self.executor().execute(&delivery, &subscriber).await;

        Ok(TestOutcome {
            success: result.outcome == AttemptOutcome::Delivered,
            status_code: result.status_code,
            error: result.error,
        })
    }
}
