//! Database models for the webhook subsystem.

pub mod webhook_delivery;
pub mod webhook_subscriber;

pub use webhook_delivery::{CreateWebhookDelivery, DeliveryStatus, WebhookDelivery};
pub use webhook_subscriber::{CreateWebhookSubscriber, WebhookSubscriber};
