//! Events reported to assembly observers.
//!
//! A watched assembly yields zero or more `Progress` events followed by
//! exactly one terminal event, `Completed` or `Failed`. Cancelling the
//! watch ends the stream without a terminal event.

use assemblyline_core::status::AssemblyStatus;

use crate::api::ApiError;

/// One notification from a watched assembly.
#[derive(Debug)]
pub enum AssemblyEvent {
    /// A new snapshot arrived while the assembly is uploading or
    /// executing.
    Progress {
        /// Upload bytes the service has received so far.
        bytes_received: u64,
        /// Total upload bytes the service expects.
        bytes_expected: u64,
        /// Snapshot with `results` replaced by the full accumulated
        /// listing.
        status: AssemblyStatus,
    },

    /// The assembly finished; `status.results` holds every result
    /// produced over its lifetime.
    Completed { status: AssemblyStatus },

    /// The assembly failed, was aborted, or could no longer be tracked.
    Failed { error: WatchError },
}

/// Why a watched assembly did not complete.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// A status request failed at the transport level or returned an
    /// unparseable body. Any such failure is fatal to the watch.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The assembly was aborted server-side.
    #[error("Assembly aborted: {0}")]
    Aborted(String),

    /// The service reported an error code or an unrecognized state.
    #[error("Failed to check assembly ({0})")]
    StatusCheck(String),

    /// Consecutive `ASSEMBLY_NOT_FOUND` responses used up the configured
    /// attempt budget.
    #[error("Assembly not found after {attempts} status checks")]
    NotFoundExhausted { attempts: u32 },

    /// The submission POST failed, so polling was stopped.
    #[error("Failed to submit assembly: {0}")]
    Submit(#[source] ApiError),

    /// The watch was cancelled before a terminal event arrived.
    #[error("Watch cancelled before the assembly reached a terminal state")]
    Cancelled,
}
