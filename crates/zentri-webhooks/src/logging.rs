//! Structured JSON logging setup using tracing.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber with JSON output.
///
/// `RUST_LOG` takes precedence over `default_filter`. Installing twice is a
/// no-op so tests and embedding applications can both call this safely.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .flatten_event(true);

    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init();
}
