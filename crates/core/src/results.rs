//! Append-only accumulation of per-step assembly results.
//!
//! Each status snapshot carries only the result entries produced since
//! the caller's sequence cursor. [`ResultAccumulator`] folds those
//! deltas into the complete per-step listing so a snapshot handed to
//! observers always shows everything produced so far.

use crate::status::{AssemblyStatus, ResultMap};

/// Accumulated per-step results across the lifetime of one assembly.
///
/// Entries are appended in arrival order and never deduplicated; the
/// service may legitimately deliver identical entries (e.g. a step run
/// twice against the same input) and both are kept.
#[derive(Debug, Clone, Default)]
pub struct ResultAccumulator {
    steps: ResultMap,
}

impl ResultAccumulator {
    /// Start with no results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one snapshot's result deltas into the accumulated listing.
    ///
    /// Steps absent from the snapshot keep whatever was accumulated for
    /// them earlier.
    pub fn absorb(&mut self, snapshot: &AssemblyStatus) {
        for (step, entries) in &snapshot.results {
            self.steps
                .entry(step.clone())
                .or_default()
                .extend(entries.iter().cloned());
        }
    }

    /// Replace a snapshot's delta results with the full accumulated
    /// listing, making it self-contained for observers.
    pub fn overlay(&self, snapshot: &mut AssemblyStatus) {
        snapshot.results = self.steps.clone();
    }

    /// The accumulated listing, keyed by step name.
    pub fn steps(&self) -> &ResultMap {
        &self.steps
    }
}
