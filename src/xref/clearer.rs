//! Clearing xref notes.

use tracing::debug;

use crate::storage::{CommitId, NotesStore, StorageResult, UnbindOutcome};

/// What clearing one commit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Removed,
    /// the commit had no note; not an error
    Absent,
}

/// Removes notes from commits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteClearer;

impl NoteClearer {
    pub fn new() -> Self {
        Self
    }

    pub fn clear<S: NotesStore + ?Sized>(
        &self,
        store: &mut S,
        commit: CommitId,
    ) -> StorageResult<ClearOutcome> {
        match store.unbind(commit)? {
            UnbindOutcome::Removed => {
                debug!(commit = %commit, "removing note");
                Ok(ClearOutcome::Removed)
            }
            UnbindOutcome::Absent => {
                debug!(commit = %commit, "object has no note");
                Ok(ClearOutcome::Absent)
            }
        }
    }
}
