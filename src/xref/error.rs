//! Xref error types.

use thiserror::Error;

use crate::storage::{InvalidNameError, StorageError};

/// Result type for xref passes.
pub type XrefResult<T> = Result<T, XrefError>;

/// Invalid pass configuration, detected before any traversal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// no notes ref was given and no preset supplies one
    #[error("insufficient arguments: a notes ref is required")]
    MissingNotesRef,

    /// record mode without a trailer prefix
    #[error("insufficient arguments: a trailer prefix is required unless clearing")]
    MissingTrailerPrefix,

    /// an empty string was given where a prefix is needed
    #[error("trailer prefix cannot be empty")]
    EmptyTrailerPrefix,

    /// the notes ref name is not a valid ref
    #[error("invalid notes ref '{name}': {reason}")]
    InvalidNotesRef {
        name: String,
        reason: InvalidNameError,
    },

    /// record-only options combined with clear mode
    #[error("--{0} cannot be combined with --clear")]
    ConflictsWithClear(&'static str),
}

/// Errors that abort an xref pass.
#[derive(Debug, Error)]
pub enum XrefError {
    /// Storage layer error (revision walk, object lookup, notes store).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The revision walk could not be prepared; nothing was done.
    #[error("revision walk setup failed: {0}")]
    WalkSetup(#[source] StorageError),

    /// Writing the note for a source commit failed.
    #[error("failed to write note for {source_commit}: {cause}")]
    NoteWrite {
        source_commit: String,
        #[source]
        cause: StorageError,
    },
}

impl XrefError {
    /// check if the pass failed because a note already existed
    pub fn is_conflict(&self) -> bool {
        match self {
            XrefError::Storage(e) => e.is_conflict(),
            XrefError::NoteWrite { cause, .. } => cause.is_conflict(),
            _ => false,
        }
    }

    /// check if the pass failed before touching history or notes
    pub fn is_setup_failure(&self) -> bool {
        matches!(self, XrefError::Config(_) | XrefError::WalkSetup(_))
    }
}
