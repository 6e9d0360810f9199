//! REST wrapper for the assembly service endpoints.
//!
//! Covers the two calls made against a worker instance: the status poll
//! (`GET {assembly_url}?seq=`) and the multipart submission
//! (`POST {assembly_url}?redirect=false`), using [`reqwest`].

use std::time::Duration;

use assemblyline_core::status::{parse_status, AssemblyStatus};

/// One file to include in an assembly submission.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Form field name, e.g. `file_0`.
    pub field: String,
    /// File name reported to the service.
    pub name: String,
    /// File contents.
    pub data: Vec<u8>,
}

/// Errors from the assembly REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body was not a parseable status document.
    #[error("Malformed status document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The service rejected a submission with a non-2xx status code.
    #[error("Assembly service error ({status}): {body}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// HTTP client for assembly endpoints.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct AssemblyApi {
    client: reqwest::Client,
}

impl AssemblyApi {
    /// Build a client whose requests are bounded by `request_timeout`.
    pub fn new(request_timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// The underlying HTTP client, for calls outside this wrapper.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch one status snapshot for an assembly.
    ///
    /// `seq` is the caller's sequence cursor; the service responds with
    /// results produced after that point.
    pub async fn fetch_status(
        &self,
        assembly_url: &str,
        seq: u64,
    ) -> Result<AssemblyStatus, ApiError> {
        let response = self
            .client
            .get(assembly_url)
            .query(&[("seq", seq)])
            .send()
            .await?;

        // Status documents carry the service's verdict in the body even
        // on non-2xx responses, so the HTTP status is not checked here.
        let text = response.text().await?;
        Ok(parse_status(&text)?)
    }

    /// Submit an assembly as a multipart form post.
    ///
    /// The form carries the `params` JSON text field first, then the
    /// optional `signature`, caller fields, and file parts.
    pub async fn submit_assembly(
        &self,
        assembly_url: &str,
        params_json: String,
        signature: Option<String>,
        fields: Vec<(String, String)>,
        files: Vec<UploadFile>,
    ) -> Result<(), ApiError> {
        let mut form = reqwest::multipart::Form::new().text("params", params_json);
        if let Some(signature) = signature {
            form = form.text("signature", signature);
        }
        for (name, value) in fields {
            form = form.text(name, value);
        }
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.data).file_name(file.name);
            form = form.part(file.field, part);
        }

        let response = self
            .client
            .post(assembly_url)
            .query(&[("redirect", "false")])
            .multipart(form)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, discarding the
    /// body on success and capturing it in the error otherwise.
    async fn ensure_success(response: reqwest::Response) -> Result<(), ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Service {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
