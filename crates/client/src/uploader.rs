//! Upload orchestration: resolve a worker, submit the form, watch the
//! assembly.
//!
//! The submission POST and the status poll run concurrently. The id is
//! generated client-side, so polling can begin before the service has
//! accepted the upload; the service answers `ASSEMBLY_NOT_FOUND` until
//! the worker registers the id, and reports upload byte counts while
//! the POST is still in flight.

use assemblyline_core::ids::new_assembly_id;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, AssemblyApi, UploadFile};
use crate::config::{ClientConfig, UploadParams};
use crate::events::{AssemblyEvent, WatchError};
use crate::poller::{spawn_loop, AssemblyWatch, EVENT_CHANNEL_CAPACITY};
use crate::resolver::{resolve_bored_instance, ResolveError};

/// Errors surfaced before an upload starts being tracked.
///
/// Failures after this point are delivered as the watch's terminal
/// [`AssemblyEvent::Failed`] event instead.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] ApiError),

    /// No worker instance could be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Submits uploads to the assembly service and watches the resulting
/// assemblies.
pub struct Uploader {
    api: AssemblyApi,
    config: ClientConfig,
    params: UploadParams,
}

impl Uploader {
    pub fn new(config: ClientConfig, params: UploadParams) -> Result<Self, UploadError> {
        let api = AssemblyApi::new(config.poll.request_timeout)?;
        Ok(Self {
            api,
            config,
            params,
        })
    }

    /// Submit `files` and `fields` as a new assembly and watch it.
    ///
    /// Resolves a bored instance, then starts the multipart POST and
    /// the status poll loop concurrently. A submission failure cancels
    /// polling and is delivered as the terminal `Failed` event.
    pub async fn upload(
        &self,
        files: Vec<UploadFile>,
        fields: Vec<(String, String)>,
    ) -> Result<AssemblyWatch, UploadError> {
        let assembly_id = new_assembly_id();
        let host = resolve_bored_instance(self.api.http(), &self.config.service).await?;
        let assembly_url = format!(
            "{}://{}/assemblies/{}",
            self.config.scheme(),
            host,
            assembly_id
        );

        tracing::info!(assembly_url = %assembly_url, "Submitting assembly");

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let submit_api = self.api.clone();
        let submit_url = assembly_url.clone();
        let params_json = self.params.params_json();
        let signature = self.params.signature.clone();
        let submit_tx = event_tx.clone();
        let submit_cancel = cancel.clone();
        tokio::spawn(async move {
            let submit =
                submit_api.submit_assembly(&submit_url, params_json, signature, fields, files);
            tokio::select! {
                _ = submit_cancel.cancelled() => {}
                result = submit => {
                    if let Err(e) = result {
                        tracing::warn!(assembly_url = %submit_url, error = %e, "Assembly submission failed");
                        // Cancel first so the poll loop cannot race in a
                        // second terminal event.
                        submit_cancel.cancel();
                        let _ = submit_tx
                            .send(AssemblyEvent::Failed {
                                error: WatchError::Submit(e),
                            })
                            .await;
                    }
                }
            }
        });

        let task = spawn_loop(
            self.api.clone(),
            self.config.poll.clone(),
            assembly_url,
            event_tx,
            cancel.clone(),
        );

        Ok(AssemblyWatch {
            events: event_rx,
            cancel,
            task,
        })
    }
}
