//! Common test utilities for zentri-webhooks integration tests.
//!
//! Provides an in-memory `WebhookStore` fake, wiremock responders, and test
//! fixtures for exercising the delivery engine without a real database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

use zentri_db::models::{
    CreateWebhookDelivery, DeliveryStatus, WebhookDelivery, WebhookSubscriber,
};
use zentri_webhooks::store::{AttemptRecord, WebhookStore};
use zentri_webhooks::{DomainEvent, WebhookConfig, WebhookError, WebhookService};

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Standard test tenant IDs
pub const TENANT_A: Uuid = Uuid::from_bytes([
    0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11,
]);

pub const TENANT_B: Uuid = Uuid::from_bytes([
    0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22,
]);

/// Standard test secrets
pub const SECRET_1: &str = "whsec_test_secret_key_12345";
pub const SECRET_2: &str = "whsec_another_secret_67890";

// ---------------------------------------------------------------------------
// MemoryWebhookStore - WebhookStore fake over a Mutex'd map
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreInner {
    subscribers: HashMap<Uuid, WebhookSubscriber>,
    deliveries: HashMap<Uuid, WebhookDelivery>,
}

/// In-memory store with the same claim/uniqueness semantics as the
/// PostgreSQL implementation. Claiming happens under one lock, so it is
/// atomic with respect to concurrent sweeps.
#[derive(Clone, Default)]
pub struct MemoryWebhookStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a subscriber row directly.
    pub fn insert_subscriber(&self, subscriber: WebhookSubscriber) {
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .insert(subscriber.id, subscriber);
    }

    /// Insert a delivery row directly.
    pub fn insert_delivery(&self, delivery: WebhookDelivery) {
        self.inner
            .lock()
            .unwrap()
            .deliveries
            .insert(delivery.id, delivery);
    }

    /// Snapshot of one subscriber.
    pub fn subscriber(&self, id: Uuid) -> Option<WebhookSubscriber> {
        self.inner.lock().unwrap().subscribers.get(&id).cloned()
    }

    /// Snapshot of all delivery rows.
    pub fn deliveries(&self) -> Vec<WebhookDelivery> {
        self.inner
            .lock()
            .unwrap()
            .deliveries
            .values()
            .cloned()
            .collect()
    }

    /// Snapshot of one delivery row.
    pub fn delivery(&self, id: Uuid) -> Option<WebhookDelivery> {
        self.inner.lock().unwrap().deliveries.get(&id).cloned()
    }

    /// Overwrite a subscriber's failure counter, as if prior deliveries had
    /// already failed.
    pub fn set_consecutive_failures(&self, id: Uuid, failures: i32) {
        if let Some(sub) = self.inner.lock().unwrap().subscribers.get_mut(&id) {
            sub.consecutive_failures = failures;
        }
    }

    /// Deactivate a subscriber, as an external management action would.
    pub fn disable(&self, id: Uuid) {
        if let Some(sub) = self.inner.lock().unwrap().subscribers.get_mut(&id) {
            sub.active = false;
        }
    }

    /// Make every non-terminal delivery due now.
    pub fn rewind_due(&self) {
        let past = Utc::now() - Duration::seconds(1);
        for delivery in self.inner.lock().unwrap().deliveries.values_mut() {
            if !delivery.is_terminal() {
                delivery.next_retry_due = Some(past);
            }
        }
    }
}

impl WebhookStore for MemoryWebhookStore {
    async fn find_active_subscribers(
        &self,
        tenant_id: Uuid,
        event_type: &str,
    ) -> Result<Vec<WebhookSubscriber>, WebhookError> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<_> = inner
            .subscribers
            .values()
            .filter(|s| {
                s.tenant_id == tenant_id
                    && s.active
                    && s.event_types.iter().any(|e| e == event_type)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|s| s.created_at);
        Ok(matches)
    }

    async fn find_subscriber(
        &self,
        id: Uuid,
    ) -> Result<Option<WebhookSubscriber>, WebhookError> {
        Ok(self.inner.lock().unwrap().subscribers.get(&id).cloned())
    }

    async fn create_delivery(
        &self,
        input: CreateWebhookDelivery,
    ) -> Result<Option<WebhookDelivery>, WebhookError> {
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner.deliveries.values().any(|d| {
            d.subscriber_id == input.subscriber_id
                && d.event_type == input.event_type
                && d.event_id == input.event_id
        });
        if duplicate {
            return Ok(None);
        }

        let now = Utc::now();
        let delivery = WebhookDelivery {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            subscriber_id: input.subscriber_id,
            event_type: input.event_type,
            event_id: input.event_id,
            payload: input.payload,
            status: DeliveryStatus::Pending.as_str().to_string(),
            attempts: 0,
            max_attempts: input.max_attempts,
            next_retry_due: input.next_retry_due,
            last_status_code: None,
            last_response_body: None,
            last_latency_ms: None,
            last_error: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.deliveries.insert(delivery.id, delivery.clone());
        Ok(Some(delivery))
    }

    async fn claim_due_deliveries(
        &self,
        batch: i64,
        lease: Duration,
    ) -> Result<Vec<WebhookDelivery>, WebhookError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();

        let mut due_ids: Vec<(Option<DateTime<Utc>>, Uuid)> = inner
            .deliveries
            .values()
            .filter(|d| {
                !d.is_terminal() && d.next_retry_due.map_or(true, |due| due <= now)
            })
            .map(|d| (d.next_retry_due, d.id))
            .collect();
        // NULLS FIRST, then oldest due
        due_ids.sort_by_key(|(due, _)| *due);
        due_ids.truncate(batch as usize);

        let mut claimed = Vec::with_capacity(due_ids.len());
        for (_, id) in due_ids {
            if let Some(delivery) = inner.deliveries.get_mut(&id) {
                delivery.next_retry_due = Some(now + lease);
                delivery.updated_at = now;
                claimed.push(delivery.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_delivered(
        &self,
        delivery: &WebhookDelivery,
        attempts: i32,
        record: &AttemptRecord,
    ) -> Result<(), WebhookError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner.deliveries.get_mut(&delivery.id) {
            row.status = DeliveryStatus::Delivered.as_str().to_string();
            row.attempts = attempts;
            row.next_retry_due = None;
            row.last_status_code = record.status_code;
            row.last_response_body = record.response_body.clone();
            row.last_latency_ms = record.latency_ms;
            row.last_error = None;
            row.delivered_at = Some(Utc::now());
            row.updated_at = Utc::now();
        }
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
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner.deliveries.get_mut(&delivery.id) {
            row.status = DeliveryStatus::Retrying.as_str().to_string();
            row.attempts = attempts;
            row.last_error = Some(error.to_string());
            row.last_status_code = record.status_code;
            row.last_response_body = record.response_body.clone();
            row.last_latency_ms = record.latency_ms;
            row.next_retry_due = Some(next_retry_due);
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        delivery: &WebhookDelivery,
        attempts: i32,
        error: &str,
        record: &AttemptRecord,
    ) -> Result<(), WebhookError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner.deliveries.get_mut(&delivery.id) {
            row.status = DeliveryStatus::Failed.as_str().to_string();
            row.attempts = attempts;
            row.last_error = Some(error.to_string());
            row.last_status_code = record.status_code;
            row.last_response_body = record.response_body.clone();
            row.last_latency_ms = record.latency_ms;
            row.next_retry_due = None;
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_subscriber_failure(
        &self,
        id: Uuid,
        error: &str,
    ) -> Result<i32, WebhookError> {
        let mut inner = self.inner.lock().unwrap();
        let sub = inner
            .subscribers
            .get_mut(&id)
            .ok_or(WebhookError::SubscriberNotFound)?;
        sub.consecutive_failures += 1;
        sub.last_error = Some(error.to_string());
        sub.updated_at = Utc::now();
        Ok(sub.consecutive_failures)
    }

    async fn record_subscriber_success(&self, id: Uuid) -> Result<(), WebhookError> {
        let mut inner = self.inner.lock().unwrap();
        let sub = inner
            .subscribers
            .get_mut(&id)
            .ok_or(WebhookError::SubscriberNotFound)?;
        sub.consecutive_failures = 0;
        sub.last_error = None;
        sub.last_triggered_at = Some(Utc::now());
        sub.updated_at = Utc::now();
        Ok(())
    }

    async fn disable_subscriber(&self, id: Uuid) -> Result<(), WebhookError> {
        let mut inner = self.inner.lock().unwrap();
        let sub = inner
            .subscribers
            .get_mut(&id)
            .ok_or(WebhookError::SubscriberNotFound)?;
        sub.active = false;
        sub.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Build and insert a subscriber for `tenant_id` pointing at `url`.
pub fn add_subscriber(
    store: &MemoryWebhookStore,
    tenant_id: Uuid,
    url: &str,
    event_types: &[&str],
) -> WebhookSubscriber {
    add_subscriber_with_secret(store, tenant_id, url, event_types, SECRET_1)
}

pub fn add_subscriber_with_secret(
    store: &MemoryWebhookStore,
    tenant_id: Uuid,
    url: &str,
    event_types: &[&str],
    secret: &str,
) -> WebhookSubscriber {
    let now = Utc::now();
    let subscriber = WebhookSubscriber {
        id: Uuid::new_v4(),
        tenant_id,
        url: url.to_string(),
        secret: secret.to_string(),
        event_types: event_types.iter().map(|e| (*e).to_string()).collect(),
        active: true,
        consecutive_failures: 0,
        last_error: None,
        last_triggered_at: None,
        created_at: now,
        updated_at: now,
    };
    store.insert_subscriber(subscriber.clone());
    subscriber
}

/// A `user.created` event for `tenant_id` with a fresh entity id.
pub fn user_created_event(tenant_id: Uuid) -> DomainEvent {
    DomainEvent {
        tenant_id,
        event_type: "user.created".to_string(),
        entity_id: Uuid::new_v4(),
        payload: serde_json::json!({
            "user_id": Uuid::new_v4().to_string(),
            "email": "test@example.com",
        }),
    }
}

/// Engine configuration suitable for tests: short timeout, defaults
/// otherwise.
pub fn test_config() -> WebhookConfig {
    WebhookConfig::default().with_request_timeout(std::time::Duration::from_secs(2))
}

/// A service over the given store with the test configuration.
pub fn service(store: &MemoryWebhookStore) -> WebhookService<MemoryWebhookStore> {
    WebhookService::new(store.clone(), test_config()).expect("failed to build service")
}

pub fn service_with(
    store: &MemoryWebhookStore,
    config: WebhookConfig,
) -> WebhookService<MemoryWebhookStore> {
    WebhookService::new(store.clone(), config).expect("failed to build service")
}

// ---------------------------------------------------------------------------
// CapturedRequest - for inspecting webhook requests
// ---------------------------------------------------------------------------

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl CapturedRequest {
    /// Parse the body as JSON.
    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder - captures requests and returns a fixed status
// ---------------------------------------------------------------------------

/// A wiremock responder that captures incoming requests.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    response_code: u16,
}

impl CaptureResponder {
    /// Capture requests and return 200 OK.
    pub fn new() -> Self {
        Self::with_status(200)
    }

    /// Capture requests and return a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: status,
        }
    }

    /// All captured requests.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of captured requests.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for CaptureResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let captured = CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
        };
        self.requests.lock().unwrap().push(captured);
        ResponseTemplate::new(self.response_code)
    }
}

// ---------------------------------------------------------------------------
// CountingResponder - counts requests
// ---------------------------------------------------------------------------

/// A wiremock responder that counts incoming requests.
#[derive(Clone)]
pub struct CountingResponder {
    count: Arc<AtomicU32>,
    response_code: u16,
}

impl CountingResponder {
    /// Count requests and return 200 OK.
    pub fn new() -> Self {
        Self::with_status(200)
    }

    /// Count requests and return a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            response_code: status,
        }
    }

    /// Current request count.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Default for CountingResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl Respond for CountingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.count.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(self.response_code)
    }
}

// ---------------------------------------------------------------------------
// FailingResponder - fails N times then succeeds
// ---------------------------------------------------------------------------

/// A wiremock responder that fails a specified number of times before
/// succeeding.
#[derive(Clone)]
pub struct FailingResponder {
    attempt_count: Arc<AtomicU32>,
    failures_before_success: u32,
    failure_code: u16,
}

impl FailingResponder {
    /// Fail `n` times with 500, then return 200.
    pub fn fail_times(n: u32) -> Self {
        Self {
            attempt_count: Arc::new(AtomicU32::new(0)),
            failures_before_success: n,
            failure_code: 500,
        }
    }

    /// Current attempt count.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::SeqCst)
    }
}

impl Respond for FailingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.attempt_count.fetch_add(1, Ordering::SeqCst);
        if n < self.failures_before_success {
            ResponseTemplate::new(self.failure_code)
        } else {
            ResponseTemplate::new(200)
        }
    }
}
