//!   Core Git repository wrapper.
//!
//!  This wraps `git2::Repository` behind a lock. A pass that writes notes
//!  holds the write lock for its whole duration, so two passes driven
//!  through the same handle never interleave their notes updates.

use std::path::Path;
use std::sync::Arc;

use git2::Repository;
use parking_lot::RwLock;

use crate::storage::error::{StorageError, StorageResult};

/// The main Git repository wrapper.
///
/// Clones share one underlying repository. `git2::Repository` is not `Sync`,
/// so the handle and its clones stay on the thread that opened it.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<RwLock<Repository>>,
}

impl GitRepository {
    /// Open an existing repository at exactly `path`.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;
        Ok(Self::from_git2(repo))
    }

    /// Find the repository containing `path`, searching parent directories.
    pub fn discover(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::discover(path).map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;
        Ok(Self::from_git2(repo))
    }

    fn from_git2(repo: Repository) -> Self {
        Self {
            inner: Arc::new(RwLock::new(repo)),
        }
    }

    /// Execute a function with write access to the repository.
    pub fn with_repo_mut<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Repository) -> Result<T, E>,
    {
        let repo = self.inner.write();
        f(&repo)
    }
}
