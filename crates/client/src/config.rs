//! Client configuration and upload parameter construction.

use std::time::Duration;

/// Tunable parameters for the status poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Minimum wait between consecutive status requests.
    pub interval: Duration,
    /// Bound on each individual HTTP request, connect included.
    pub request_timeout: Duration,
    /// How many consecutive `ASSEMBLY_NOT_FOUND` responses to tolerate
    /// before giving up on the assembly ever becoming visible.
    pub not_found_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2500),
            request_timeout: Duration::from_millis(8000),
            not_found_attempts: 15,
        }
    }
}

/// Where the assembly service lives and how to poll it.
///
/// `service` is a full base URL including its scheme; worker hosts
/// returned by instance resolution are scheme-less and inherit the
/// scheme configured here.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the service API, e.g. `https://api.example.com`.
    pub service: String,
    pub poll: PollConfig,
}

impl ClientConfig {
    /// Configuration for a service URL with default poll tuning.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            poll: PollConfig::default(),
        }
    }

    /// Scheme of the configured service URL, `https` when none is given.
    pub fn scheme(&self) -> &str {
        self.service
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .unwrap_or("https")
    }
}

/// Authentication and template selection for assembly submission.
#[derive(Debug, Clone)]
pub struct UploadParams {
    /// API auth key, sent as `auth.key` inside the `params` field.
    pub auth_key: String,
    /// Server-side template to instantiate, if any.
    pub template_id: Option<String>,
    /// Pre-computed request signature, sent as its own form field.
    pub signature: Option<String>,
}

impl UploadParams {
    /// Parameters carrying only an auth key.
    pub fn new(auth_key: impl Into<String>) -> Self {
        Self {
            auth_key: auth_key.into(),
            template_id: None,
            signature: None,
        }
    }

    /// Serialize the `params` form field the service expects.
    pub fn params_json(&self) -> String {
        let mut params = serde_json::json!({
            "auth": { "key": self.auth_key },
        });
        if let Some(template_id) = &self.template_id {
            params["template_id"] = serde_json::Value::String(template_id.clone());
        }
        params.to_string()
    }
}
