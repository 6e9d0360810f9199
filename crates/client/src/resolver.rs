//! Bored-instance resolution.
//!
//! Before an upload, the client asks the service API for a "bored"
//! (idle) worker instance and submits the assembly directly to that
//! host. Resolution is a single attempt; there is no retry and no
//! fallback host.

use serde::Deserialize;

/// Response document from `GET /instances/bored`.
#[derive(Debug, Deserialize)]
struct BoredInstance {
    /// Worker host to submit to, scheme-less.
    #[serde(default)]
    api2_host: Option<String>,
    /// Error code when no instance can be named.
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Errors from instance resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The HTTP request failed or the body was not the expected JSON.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with an error document.
    #[error("Instance resolution failed: {0}")]
    Service(String),

    /// The document carried neither a host nor an error.
    #[error("Instance document names no worker host")]
    MissingHost,
}

/// Ask the service for an idle worker host.
///
/// Returns the host string from `api2_host`, e.g. `worker-3.example.com`.
pub async fn resolve_bored_instance(
    http: &reqwest::Client,
    service_url: &str,
) -> Result<String, ResolveError> {
    let url = format!("{}/instances/bored", service_url.trim_end_matches('/'));
    let instance: BoredInstance = http.get(&url).send().await?.json().await?;

    if let Some(code) = instance.error {
        let detail = match instance.message {
            Some(message) => format!("{code}: {message}"),
            None => code,
        };
        tracing::warn!(service_url = %service_url, error = %detail, "No bored instance available");
        return Err(ResolveError::Service(detail));
    }

    instance.api2_host.ok_or(ResolveError::MissingHost)
}
