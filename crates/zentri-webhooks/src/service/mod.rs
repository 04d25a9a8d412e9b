//! Public operations of the delivery subsystem.
//!
//! [`WebhookService`] is the facade the business application calls:
//! [`WebhookService::queue`] fans a domain event out to matching subscribers
//! and attempts each delivery immediately, [`WebhookService::sweep`] retries
//! due deliveries, and [`WebhookService::test_subscriber`] sends a one-off
//! diagnostic ping. Each operation is stateless between invocations; all
//! state lives in the persisted subscriber and delivery rows.

mod executor;
mod health;
mod queuer;
mod sweeper;
mod trigger;

pub use executor::{AttemptOutcome, AttemptResult, DeliveryExecutor};
pub use health::HealthTracker;
pub use trigger::TEST_EVENT_TYPE;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::error::WebhookError;
use crate::store::WebhookStore;

/// A domain event to notify subscribers about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub tenant_id: Uuid,
    pub event_type: String,
    /// Identifies the event occurrence; re-queuing the same identifier for
    /// the same subscriber and event type is a no-op.
    pub entity_id: Uuid,
    pub payload: serde_json::Value,
}

/// Aggregate result of the immediate fan-out pass.
///
/// `queued` is the total fan-out size; deliveries that became `retrying`
/// count toward neither `delivered` nor `failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueOutcome {
    pub queued: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Aggregate result of one retry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub processed: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Result of a single diagnostic ping.
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub success: bool,
    pub status_code: Option<i16>,
    pub error: Option<String>,
}

/// Facade over the fan-out, delivery, retry, and health components.
#[derive(Clone)]
pub struct WebhookService<S: WebhookStore> {
    store: S,
    executor: DeliveryExecutor<S>,
    config: WebhookConfig,
}

impl<S: WebhookStore> WebhookService<S> {
    /// Build a service around an injected store.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(store: S, config: WebhookConfig) -> Result<Self, WebhookError> {
        let executor = DeliveryExecutor::new(store.clone(), config.clone())?;
        Ok(Self {
            store,
            executor,
            config,
        })
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn executor(&self) -> &DeliveryExecutor<S> {
        &self.executor
    }

    pub(crate) fn config(&self) -> &WebhookConfig {
        &self.config
    }
}
