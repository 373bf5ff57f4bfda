//! Storage layer error types
//!
//! All errors that can occur while reading commits or updating notes are
//! defined here. We use `thiserror` for ergonomic error definition.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::CommitId;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// the commit was not found
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// a revision argument could not be resolved
    #[error("bad revision '{0}'")]
    BadRevision(String),

    /// the commit already carries a note in this notes ref
    #[error("note for object {commit} already exists in {notes_ref}")]
    NoteExists { commit: CommitId, notes_ref: String },

    /// the notes ref was updated by someone else while a pass was staging
    #[error("concurrent modification: {notes_ref} was updated by another writer")]
    ConcurrentModification { notes_ref: String },

    /// repo is not initialized
    #[error("not a git repository: {0}")]
    NotInitialized(PathBuf),

    /// repo is empty (no commits)
    #[error("repository is empty: no commits found")]
    EmptyRepository,

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error is a conflict
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::NoteExists { .. } | StorageError::ConcurrentModification { .. }
        )
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
