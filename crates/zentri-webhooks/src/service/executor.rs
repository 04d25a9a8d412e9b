//! Single-attempt delivery execution and outcome recording.

use std::time::Instant;

use chrono::Utc;
use reqwest::Client;

use zentri_db::models::{WebhookDelivery, WebhookSubscriber};

use crate::backoff;
use crate::config::WebhookConfig;
use crate::error::WebhookError;
use crate::service::health::HealthTracker;
use crate::signing::{self, EventEnvelope};
use crate::store::{AttemptRecord, WebhookStore};
use crate::validation;

/// Retained response body is truncated to this many characters.
const MAX_RESPONSE_BODY_CHARS: usize = 1000;

/// Classification of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Terminal success.
    Delivered,
    /// Failed, another attempt is scheduled.
    Retrying,
    /// Terminal failure.
    Failed,
}

/// Full result of one delivery attempt.
#[derive(Debug, Clone)]
pub struct AttemptResult {
    pub outcome: AttemptOutcome,
    pub status_code: Option<i16>,
    pub error: Option<String>,
}

/// Performs one HTTP attempt for one (delivery, subscriber) pair and
/// persists the outcome on the delivery row and the subscriber's health
/// counters.
#[derive(Clone)]
pub struct DeliveryExecutor<S: WebhookStore> {
    store: S,
    health: HealthTracker<S>,
    http_client: Client,
    config: WebhookConfig,
}

impl<S: WebhookStore> DeliveryExecutor<S> {
    /// Build an executor with a shared HTTP client carrying an explicit
    /// per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(store: S, config: WebhookConfig) -> Result<Self, WebhookError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let health = HealthTracker::new(store.clone(), config.disable_threshold);

        Ok(Self {
            store,
            health,
            http_client,
            config,
        })
    }

    /// Execute one signed POST to the subscriber's URL and record the result.
    ///
    /// Attempt-level problems never escape: configuration errors (bad URL,
    /// missing secret), transport failures, and non-2xx responses are all
    /// recorded as failed attempts so the surrounding batch keeps going.
    pub async fn execute(
        &self,
        delivery: &WebhookDelivery,
        subscriber: &WebhookSubscriber,
    ) -> AttemptResult {
        let envelope = EventEnvelope {
            event: delivery.event_type.clone(),
            event_id: delivery.event_id,
            timestamp: Utc::now(),
            data: delivery.payload.clone(),
        };

        // Configuration errors fail this attempt without a network call.
        if let Err(e) = validation::validate_delivery_url(&subscriber.url) {
            return self
                .record_failure(delivery, subscriber, &e.to_string(), AttemptRecord::default())
                .await;
        }

        let signed = match signing::sign_envelope(&subscriber.secret, &envelope) {
            Ok(signed) => signed,
            Err(e) => {
                return self
                    .record_failure(delivery, subscriber, &e.to_string(), AttemptRecord::default())
                    .await;
            }
        };

        let start = Instant::now();
        let result = self
            .http_client
            .post(&subscriber.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", format!("sha256={}", signed.signature))
            .header("X-Webhook-Event", delivery.event_type.as_str())
            .header("X-Webhook-Delivery", delivery.id.to_string())
            .body(signed.body)
            .send()
            .await;
        let latency_ms = start.elapsed().as_millis() as i32;

        match result {
            Ok(response) => {
                let status_code = response.status().as_u16() as i16;
                let body: String = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(MAX_RESPONSE_BODY_CHARS)
                    .collect();
                let record = AttemptRecord {
                    status_code: Some(status_code),
                    response_body: Some(body),
                    latency_ms: Some(latency_ms),
                };

                if (200..300).contains(&status_code) {
                    self.record_success(delivery, subscriber, record).await
                } else {
                    self.record_failure(
                        delivery,
                        subscriber,
                        &format!("HTTP {status_code}"),
                        record,
                    )
                    .await
                }
            }
            Err(e) => {
                let error_msg = if e.is_timeout() {
                    format!(
                        "Request timed out after {}s",
                        self.config.request_timeout.as_secs()
                    )
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };
                let record = AttemptRecord {
                    latency_ms: Some(latency_ms),
                    ..AttemptRecord::default()
                };
                self.record_failure(delivery, subscriber, &error_msg, record)
                    .await
            }
        }
    }

    async fn record_success(
        &self,
        delivery: &WebhookDelivery,
        subscriber: &WebhookSubscriber,
        record: AttemptRecord,
    ) -> AttemptResult {
        let attempts = delivery.attempts + 1;

        tracing::info!(
            target: "webhook_delivery",
            delivery_id = %delivery.id,
            subscriber_id = %subscriber.id,
            tenant_id = %delivery.tenant_id,
            event_type = %delivery.event_type,
            status_code = record.status_code.unwrap_or_default(),
            latency_ms = record.latency_ms.unwrap_or_default(),
            attempts,
            "Webhook delivered"
        );

        if let Err(e) = self.store.mark_delivered(delivery, attempts, &record).await {
            tracing::error!(
                target: "webhook_delivery",
                delivery_id = %delivery.id,
                error = %e,
                "Failed to record delivery success"
            );
        }

        self.health.record_success(subscriber).await;

        AttemptResult {
            outcome: AttemptOutcome::Delivered,
            status_code: record.status_code,
            error: None,
        }
    }

    async fn record_failure(
        &self,
        delivery: &WebhookDelivery,
        subscriber: &WebhookSubscriber,
        error: &str,
        record: AttemptRecord,
    ) -> AttemptResult {
        let attempts = delivery.attempts + 1;
        let next_due =
            backoff::next_retry_at(attempts, delivery.max_attempts, self.config.retry_jitter);

        tracing::warn!(
            target: "webhook_delivery",
            delivery_id = %delivery.id,
            subscriber_id = %subscriber.id,
            tenant_id = %delivery.tenant_id,
            event_type = %delivery.event_type,
            error = %error,
            attempts,
            has_next_retry = next_due.is_some(),
            "Webhook delivery failed"
        );

        let outcome = match next_due {
            Some(due) => {
                if let Err(e) = self
                    .store
                    .mark_retrying(delivery, attempts, error, &record, due)
                    .await
                {
                    tracing::error!(
                        target: "webhook_delivery",
                        delivery_id = %delivery.id,
                        error = %e,
                        "Failed to schedule delivery retry"
                    );
                }
                AttemptOutcome::Retrying
            }
            None => {
                if let Err(e) = self.store.mark_failed(delivery, attempts, error, &record).await {
                    tracing::error!(
                        target: "webhook_delivery",
                        delivery_id = %delivery.id,
                        error = %e,
                        "Failed to record terminal delivery failure"
                    );
                }
                AttemptOutcome::Failed
            }
        };

        self.health.record_failure(subscriber, error).await;

        AttemptResult {
            outcome,
            status_code: record.status_code,
            error: Some(error.to_string()),
        }
    }
}
