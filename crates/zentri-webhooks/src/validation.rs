//! Delivery URL validation.
//!
//! Endpoint registration is managed elsewhere, so the executor re-checks the
//! URL just before each attempt: a URL that no longer parses, lacks a host,
//! or carries a non-HTTP scheme is a configuration failure of that attempt
//! rather than a transport error.

use crate::error::WebhookError;

/// Validate a subscriber's delivery URL.
pub fn validate_delivery_url(raw: &str) -> Result<(), WebhookError> {
    let parsed =
        url::Url::parse(raw).map_err(|e| WebhookError::InvalidUrl(format!("{raw}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(WebhookError::InvalidUrl(format!(
                "unsupported scheme: {scheme}"
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(WebhookError::InvalidUrl("URL must have a host".to_string()));
    }

    Ok(())
}
