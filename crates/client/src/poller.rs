//! Assembly status poll loop and watch handle.
//!
//! [`AssemblyPoller::start`] spawns one polling task per assembly. Each
//! iteration waits the configured interval, fetches a status snapshot,
//! folds its results into the accumulated listing, and classifies it.
//! In-progress snapshots advance the sequence cursor and emit
//! [`AssemblyEvent::Progress`]; terminal snapshots emit exactly one
//! [`AssemblyEvent::Completed`] or [`AssemblyEvent::Failed`] and end the
//! task. There is never more than one status request in flight.

use assemblyline_core::results::ResultAccumulator;
use assemblyline_core::status::{AssemblyStatus, Disposition};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::AssemblyApi;
use crate::config::PollConfig;
use crate::events::{AssemblyEvent, WatchError};

/// Event channel capacity per watched assembly.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Spawns poll loops for assemblies that are already submitted (or are
/// being submitted concurrently).
pub struct AssemblyPoller {
    api: AssemblyApi,
    config: PollConfig,
}

impl AssemblyPoller {
    pub fn new(api: AssemblyApi, config: PollConfig) -> Self {
        Self { api, config }
    }

    /// Start watching the assembly at `assembly_url`.
    ///
    /// The returned watch yields progress events and exactly one
    /// terminal event, unless cancelled first.
    pub fn start(&self, assembly_url: String) -> AssemblyWatch {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task = spawn_loop(
            self.api.clone(),
            self.config.clone(),
            assembly_url,
            event_tx,
            cancel.clone(),
        );

        AssemblyWatch {
            events: event_rx,
            cancel,
            task,
        }
    }
}

/// Handle to one watched assembly.
///
/// Dropping the watch closes the event channel; the poll loop notices
/// on its next send and stops.
pub struct AssemblyWatch {
    pub(crate) events: mpsc::Receiver<AssemblyEvent>,
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

impl AssemblyWatch {
    /// Next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<AssemblyEvent> {
        self.events.recv().await
    }

    /// Stop polling. The stream ends without a terminal event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the poll task to exit. Buffered events are
    /// discarded.
    pub async fn shutdown(self) {
        let Self {
            events,
            cancel,
            task,
        } = self;
        cancel.cancel();
        // A loop parked on a full event channel cannot see the token;
        // closing the channel fails that send and unparks it.
        drop(events);
        let _ = task.await;
    }

    /// Drain progress events and return the terminal result.
    ///
    /// `Err(WatchError::Cancelled)` when the stream ends without a
    /// terminal event.
    pub async fn into_outcome(mut self) -> Result<AssemblyStatus, WatchError> {
        while let Some(event) = self.events.recv().await {
            match event {
                AssemblyEvent::Progress { .. } => continue,
                AssemblyEvent::Completed { status } => return Ok(status),
                AssemblyEvent::Failed { error } => return Err(error),
            }
        }
        Err(WatchError::Cancelled)
    }
}

/// Spawn the poll loop on its own task.
pub(crate) fn spawn_loop(
    api: AssemblyApi,
    config: PollConfig,
    assembly_url: String,
    event_tx: mpsc::Sender<AssemblyEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        poll_loop(api, config, assembly_url, event_tx, cancel).await;
    })
}

/// Poll until a terminal snapshot, a fatal error, cancellation, or a
/// dropped receiver.
async fn poll_loop(
    api: AssemblyApi,
    config: PollConfig,
    assembly_url: String,
    event_tx: mpsc::Sender<AssemblyEvent>,
    cancel: CancellationToken,
) {
    let mut seq: u64 = 0;
    let mut accumulated = ResultAccumulator::new();
    let mut not_found_streak: u32 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(assembly_url = %assembly_url, "Poll cancelled");
                return;
            }
            _ = tokio::time::sleep(config.interval) => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(assembly_url = %assembly_url, "Poll cancelled");
                return;
            }
            result = api.fetch_status(&assembly_url, seq) => result,
        };

        // A response that raced cancellation is dropped unhandled.
        if cancel.is_cancelled() {
            tracing::debug!(assembly_url = %assembly_url, "Poll cancelled, response dropped");
            return;
        }

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(assembly_url = %assembly_url, error = %e, "Status check failed");
                let _ = event_tx
                    .send(AssemblyEvent::Failed { error: e.into() })
                    .await;
                return;
            }
        };

        // Results arrive as deltas. Fold them in before classifying so a
        // terminal snapshot's own entries are never lost.
        accumulated.absorb(&status);

        match status.disposition() {
            Disposition::Completed => {
                let mut status = status;
                accumulated.overlay(&mut status);
                tracing::info!(assembly_url = %assembly_url, "Assembly completed");
                let _ = event_tx.send(AssemblyEvent::Completed { status }).await;
                return;
            }
            Disposition::Aborted => {
                let message = status.message_or_empty().to_string();
                tracing::info!(assembly_url = %assembly_url, message = %message, "Assembly aborted");
                let _ = event_tx
                    .send(AssemblyEvent::Failed {
                        error: WatchError::Aborted(message),
                    })
                    .await;
                return;
            }
            Disposition::NotFoundYet => {
                not_found_streak += 1;
                if not_found_streak >= config.not_found_attempts {
                    tracing::warn!(
                        assembly_url = %assembly_url,
                        attempts = not_found_streak,
                        "Assembly never became visible",
                    );
                    let _ = event_tx
                        .send(AssemblyEvent::Failed {
                            error: WatchError::NotFoundExhausted {
                                attempts: not_found_streak,
                            },
                        })
                        .await;
                    return;
                }
                // The cursor stays put so nothing is skipped once the
                // assembly appears.
                tracing::debug!(
                    assembly_url = %assembly_url,
                    streak = not_found_streak,
                    "Assembly not visible yet",
                );
            }
            Disposition::Failed => {
                let message = status.message_or_empty().to_string();
                tracing::warn!(assembly_url = %assembly_url, message = %message, "Assembly failed");
                let _ = event_tx
                    .send(AssemblyEvent::Failed {
                        error: WatchError::StatusCheck(message),
                    })
                    .await;
                return;
            }
            Disposition::InProgress => {
                not_found_streak = 0;
                if let Some(last_seq) = status.last_seq {
                    seq = last_seq;
                }
                let mut status = status;
                accumulated.overlay(&mut status);
                let event = AssemblyEvent::Progress {
                    bytes_received: status.bytes_received,
                    bytes_expected: status.bytes_expected,
                    status,
                };
                if event_tx.send(event).await.is_err() {
                    // Receiver dropped; nobody is watching.
                    return;
                }
            }
        }
    }
}
