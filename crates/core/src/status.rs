//! Assembly status wire format and snapshot classification.
//!
//! The assembly service reports job state as a JSON document with an `ok`
//! state token on the happy path and an `error` token otherwise. This
//! module deserializes those documents into [`AssemblyStatus`] and
//! classifies each snapshot into the [`Disposition`] a poll loop acts on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `error` token reported while the assembly is not yet visible on the
/// instance that will execute it. Transient; polling should continue.
pub const ERROR_ASSEMBLY_NOT_FOUND: &str = "ASSEMBLY_NOT_FOUND";

/// Known values of the `ok` state token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssemblyState {
    /// All steps finished; results are final.
    #[serde(rename = "ASSEMBLY_COMPLETED")]
    Completed,

    /// Processing steps are running.
    #[serde(rename = "ASSEMBLY_EXECUTING")]
    Executing,

    /// Input files are still being received.
    #[serde(rename = "ASSEMBLY_UPLOADING")]
    Uploading,

    /// The assembly was cancelled server-side.
    #[serde(rename = "REQUEST_ABORTED")]
    Aborted,

    /// Any state token this client does not know.
    #[serde(other)]
    Unknown,
}

/// Per-step result listings, keyed by step name.
pub type ResultMap = HashMap<String, Vec<serde_json::Value>>;

/// One status snapshot of an assembly.
///
/// Absent fields deserialize to `None` or zero. `results` holds only the
/// entries delivered since the sequence cursor sent with the request, so a
/// single snapshot is rarely the complete picture; see
/// [`ResultAccumulator`](crate::results::ResultAccumulator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyStatus {
    /// State token while the assembly is healthy.
    #[serde(default)]
    pub ok: Option<AssemblyState>,

    /// Error token when something went wrong.
    #[serde(default)]
    pub error: Option<String>,

    /// Human-readable detail accompanying `ok` or `error`.
    #[serde(default)]
    pub message: Option<String>,

    /// Sequence cursor to send with the next status request.
    #[serde(default)]
    pub last_seq: Option<u64>,

    /// Upload bytes the service has received so far.
    #[serde(default)]
    pub bytes_received: u64,

    /// Total upload bytes the service expects.
    #[serde(default)]
    pub bytes_expected: u64,

    /// Step results delivered in this snapshot.
    #[serde(default)]
    pub results: ResultMap,
}

/// What a poll loop should do with one status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Terminal success.
    Completed,
    /// Terminal cancellation.
    Aborted,
    /// The executing instance does not know the assembly yet; poll again
    /// without advancing the sequence cursor.
    NotFoundYet,
    /// Terminal failure (error token or unrecognized state).
    Failed,
    /// Still executing or uploading; advance the cursor and poll again.
    InProgress,
}

impl AssemblyStatus {
    /// Classify this snapshot.
    ///
    /// A terminal `ok` token decides the outcome even when an `error`
    /// field is also present. Otherwise any error except
    /// [`ERROR_ASSEMBLY_NOT_FOUND`] is fatal, as is an `ok` token outside
    /// the two in-progress states.
    pub fn disposition(&self) -> Disposition {
        match self.ok {
            Some(AssemblyState::Completed) => return Disposition::Completed,
            Some(AssemblyState::Aborted) => return Disposition::Aborted,
            _ => {}
        }
        if self.error.is_some() || !self.is_in_progress() {
            if self.error.as_deref() == Some(ERROR_ASSEMBLY_NOT_FOUND) {
                Disposition::NotFoundYet
            } else {
                Disposition::Failed
            }
        } else {
            Disposition::InProgress
        }
    }

    /// Whether the assembly is in one of the two in-progress states.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self.ok,
            Some(AssemblyState::Executing) | Some(AssemblyState::Uploading)
        )
    }

    /// Detail message, or the empty string when the service sent none.
    pub fn message_or_empty(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/// Parse a status response body into a typed snapshot.
///
/// Returns `Err` for malformed JSON. Unknown `ok` tokens parse to
/// [`AssemblyState::Unknown`] rather than failing.
pub fn parse_status(text: &str) -> Result<AssemblyStatus, serde_json::Error> {
    serde_json::from_str(text)
}
