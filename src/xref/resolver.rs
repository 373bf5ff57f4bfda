//! Trailer value → source commit resolution.

use std::fmt;

use git2::Repository;

use crate::storage::{lookup_commit, CommitId, StorageResult};

/// hex digits in a full SHA-1 object id
const HEX_LEN: usize = 40;

/// Why a trailer line did not yield a source commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// the value does not start with a full hex object id
    Malformed(String),
    /// the id names no object in the repository
    Missing(CommitId),
    /// the id names an object that is not a commit
    NotACommit(CommitId),
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unresolved::Malformed(value) => write!(f, "malformed object id '{}'", value),
            Unresolved::Missing(id) => write!(f, "object {} not found", id),
            Unresolved::NotACommit(id) => write!(f, "object {} is not a commit", id),
        }
    }
}

/// Resolves trailer lines carrying a configured prefix into commits.
#[derive(Debug, Clone)]
pub struct TrailerResolver {
    prefix: String,
}

impl TrailerResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// the value part of `line`, if it carries the prefix
    pub fn value_of<'l>(&self, line: &'l str) -> Option<&'l str> {
        line.strip_prefix(self.prefix.as_str())
    }

    /// Parse the object id at the start of `value`.
    ///
    /// Trailing text after the id (e.g. the closing `)` of a cherry-pick
    /// line) is ignored.
    pub fn parse_id(value: &str) -> Result<CommitId, Unresolved> {
        let malformed = || Unresolved::Malformed(value.to_string());
        let hex = value.get(..HEX_LEN).ok_or_else(malformed)?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed());
        }
        CommitId::from_hex(hex).map_err(|_| malformed())
    }

    /// Resolve a trailer value to a commit that exists in `repo`.
    ///
    /// The outer `Result` carries repository failures, which abort the pass;
    /// the inner one carries per-trailer failures, which only skip a commit.
    pub fn resolve(
        &self,
        repo: &Repository,
        value: &str,
    ) -> StorageResult<Result<CommitId, Unresolved>> {
        let id = match Self::parse_id(value) {
            Ok(id) => id,
            Err(unresolved) => return Ok(Err(unresolved)),
        };

        if lookup_commit(repo, id)?.is_some() {
            return Ok(Ok(id));
        }

        let exists = repo.find_object(id.raw(), None).is_ok();
        Ok(Err(if exists {
            Unresolved::NotACommit(id)
        } else {
            Unresolved::Missing(id)
        }))
    }
}
