//! Background sweep worker.
//!
//! Drives [`WebhookService::sweep`] on a fixed interval for deployments
//! without an external scheduler. Sweeps are idempotent, so running the
//! worker alongside scheduler-invoked sweeps is safe: the claim lease keeps
//! them from double-attempting the same delivery.

use std::time::Duration;

use tokio::sync::watch;

use crate::service::WebhookService;
use crate::store::WebhookStore;

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic retry sweeper with graceful shutdown.
pub struct WebhookWorker<S: WebhookStore> {
    service: WebhookService<S>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<S: WebhookStore> WebhookWorker<S> {
    /// Build a worker around a service. Send `true` on the returned channel
    /// to stop the loop.
    pub fn new(
        service: WebhookService<S>,
        interval: Duration,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (
            Self {
                service,
                interval,
                shutdown: shutdown_rx,
            },
            shutdown_tx,
        )
    }

    /// Run until the shutdown signal fires.
    ///
    /// Sweep errors are logged and the loop continues; a transient store
    /// outage resolves itself on a later tick. An attempt in flight when the
    /// process dies is safe: its delivery row resurfaces after the claim
    /// lease expires.
    pub async fn run(mut self) {
        tracing::info!(
            target: "webhook_delivery",
            interval_secs = self.interval.as_secs(),
            "Webhook sweep worker started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.service.sweep().await {
                        Ok(outcome) if outcome.processed > 0 => {
                            tracing::info!(
                                target: "webhook_delivery",
                                processed = outcome.processed,
                                delivered = outcome.delivered,
                                failed = outcome.failed,
                                "Retry sweep completed"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(
                                target: "webhook_delivery",
                                error = %e,
                                "Retry sweep failed"
                            );
                        }
                    }
                }
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        tracing::info!(
                            target: "webhook_delivery",
                            "Webhook sweep worker shutting down"
                        );
                        break;
                    }
                }
            }
        }
    }
}
