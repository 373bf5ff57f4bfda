//! storage layer for gitxref
//!
//! this module is the only place that touches git2. The xref layer sees
//! commits as [`CommitInfo`], walks history through [`RevisionWalk`] and
//! persists notes through the [`NotesStore`] trait.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     GitRepository                           │
//! │          (shared handle, read/write lock per pass)          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               │                             │
//!               ▼                             ▼
//!        ┌─────────────┐               ┌─────────────┐
//!        │   commit    │               │    notes    │
//!        │ (revwalks)  │               │ (notes ref) │
//!        └─────────────┘               └─────────────┘
//!  ```
//!
//! # Usage
//!
//! ```ignore
//! use gitxref::storage::{GitRepository, GitNotesStore, NotesRef, NotesStore, RevisionWalk, WalkOrder};
//!
//! let repo = GitRepository::discover(".")?;
//! repo.with_repo_mut(|git| {
//!     let mut store = GitNotesStore::open(git, NotesRef::new("xref")?)?;
//!     for commit in RevisionWalk::new(git, &["main"], WalkOrder::Time)? {
//!         let commit = commit?;
//!         let blob = store.put(commit.message.as_bytes())?;
//!         store.bind(commit.id, blob, Default::default())?;
//!     }
//!     store.finalize("annotate main")
//! })?;
//! ```

mod commit;
mod error;
mod notes;
mod repository;
mod types;

pub use commit::{get_commit, lookup_commit, CommitBuilder, CommitInfo, RevisionWalk, WalkOrder};
pub use error::{StorageError, StorageResult};
pub use notes::{BindOutcome, ConflictPolicy, GitNotesStore, NotesStore, UnbindOutcome};
pub use repository::GitRepository;
pub use types::{BlobId, CommitId, GitSignature, InvalidNameError, NotesRef};

#[cfg(test)]
pub(crate) use commit::tests as test_support;
