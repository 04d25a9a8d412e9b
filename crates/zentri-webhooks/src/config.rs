//! Engine configuration.
//!
//! Defaults are production values; `from_env` overrides them from the
//! environment and builder methods override per instance. Unparseable
//! environment values fall back to the default with a warning rather than
//! failing delivery startup.

use std::env;
use std::time::Duration;

/// Attempt ceiling per delivery (initial attempt + 4 retries).
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Consecutive failures before a subscriber is auto-disabled.
pub const DEFAULT_DISABLE_THRESHOLD: i32 = 10;

/// Due rows claimed per sweep.
pub const DEFAULT_SWEEP_BATCH_SIZE: i64 = 50;

/// Concurrent in-flight deliveries per queue/sweep invocation.
pub const DEFAULT_DELIVERY_CONCURRENCY: usize = 10;

/// Per-attempt HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a claimed row stays invisible to other sweeps.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(60);

/// User agent sent with every delivery.
pub const DEFAULT_USER_AGENT: &str = "zentri-webhooks/1.0";

/// Tunables for the delivery engine.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Explicit per-attempt HTTP timeout; one unresponsive receiver must not
    /// exhaust a sweep's time budget.
    pub request_timeout: Duration,
    pub user_agent: String,
    pub max_attempts: i32,
    pub disable_threshold: i32,
    pub sweep_batch_size: i64,
    pub delivery_concurrency: usize,
    pub claim_lease: Duration,
    /// Spread retry due times by ±20% to avoid synchronized retries against
    /// a recovering receiver. Off by default; the schedule is contractual.
    pub retry_jitter: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            disable_threshold: DEFAULT_DISABLE_THRESHOLD,
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            delivery_concurrency: DEFAULT_DELIVERY_CONCURRENCY,
            claim_lease: DEFAULT_CLAIM_LEASE,
            retry_jitter: false,
        }
    }
}

impl WebhookConfig {
    /// Load configuration from `WEBHOOK_*` environment variables, falling
    /// back to defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            request_timeout: env_secs("WEBHOOK_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            user_agent: env::var("WEBHOOK_USER_AGENT").unwrap_or(defaults.user_agent),
            max_attempts: env_parse("WEBHOOK_MAX_ATTEMPTS", defaults.max_attempts),
            disable_threshold: env_parse("WEBHOOK_DISABLE_THRESHOLD", defaults.disable_threshold),
            sweep_batch_size: env_parse("WEBHOOK_SWEEP_BATCH_SIZE", defaults.sweep_batch_size),
            delivery_concurrency: env_parse(
                "WEBHOOK_DELIVERY_CONCURRENCY",
                defaults.delivery_concurrency,
            ),
            claim_lease: env_secs("WEBHOOK_CLAIM_LEASE_SECS", defaults.claim_lease),
            retry_jitter: env_parse("WEBHOOK_RETRY_JITTER", defaults.retry_jitter),
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max: i32) -> Self {
        self.max_attempts = max;
        self
    }

    #[must_use]
    pub fn with_disable_threshold(mut self, threshold: i32) -> Self {
        self.disable_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_sweep_batch_size(mut self, batch: i64) -> Self {
        self.sweep_batch_size = batch;
        self
    }

    #[must_use]
    pub fn with_delivery_concurrency(mut self, concurrency: usize) -> Self {
        self.delivery_concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    #[must_use]
    pub fn with_retry_jitter(mut self, jitter: bool) -> Self {
        self.retry_jitter = jitter;
        self
    }
}

fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "Unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(name, default.as_secs()))
}
