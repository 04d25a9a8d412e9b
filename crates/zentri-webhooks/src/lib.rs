//! Webhook fan-out and delivery engine for the zentri platform.
//!
//! At-least-once delivery of domain events to tenant-registered HTTP
//! endpoints: fan-out to matching subscribers, HMAC-SHA256 payload signing,
//! bounded exponential-backoff retries, and per-subscriber health tracking
//! with automatic disablement of chronically failing endpoints. Receivers
//! must deduplicate on the delivery identifier.

#![allow(async_fn_in_trait)]

pub mod backoff;
pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod signing;
pub mod store;
pub mod validation;
pub mod worker;

pub use config::WebhookConfig;
pub use error::WebhookError;
pub use service::{DomainEvent, QueueOutcome, SweepOutcome, TestOutcome, WebhookService};
pub use signing::EventEnvelope;
pub use store::{PgWebhookStore, WebhookStore};
pub use worker::WebhookWorker;
