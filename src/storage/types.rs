//! core type-safe wrappers around git primitives for the storage layer.

use std::fmt;

use git2::Oid;
use serde::{Serialize, Serializer};

/// This makes sure we don't accidentally pass a blob ID where a commit ID
/// is expected. The inner Oid is only accessible within the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse CommitId from a full hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(CommitId)
    }

    /// full lowercase hex form
    pub fn to_hex(&self) -> String {
        self.0.to_string()
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CommitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Git blob identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(pub(crate) Oid);

impl BlobId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated notes reference, always fully qualified (`refs/notes/...`).
///
/// Short names are expanded the way `git notes --ref` does: `xref` and
/// `notes/xref` both become `refs/notes/xref`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotesRef(String);

impl NotesRef {
    /// namespace every notes ref lives under
    pub const PREFIX: &'static str = "refs/notes/";

    /// create a new NotesRef, expanding short names
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        let full = if name.starts_with(Self::PREFIX) {
            name
        } else if let Some(rest) = name.strip_prefix("notes/") {
            format!("{}{}", Self::PREFIX, rest)
        } else {
            format!("{}{}", Self::PREFIX, name)
        };
        Self::validate(&full)?;
        Ok(Self(full))
    }

    fn validate(full: &str) -> Result<(), InvalidNameError> {
        let short = &full[Self::PREFIX.len()..];
        if short.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if short.contains("..")
            || short.ends_with('/')
            || short.starts_with('/')
            || short.ends_with(".lock")
        {
            return Err(InvalidNameError::InvalidPath(full.to_string()));
        }
        for (i, c) in short.chars().enumerate() {
            if c.is_ascii_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\') {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }
        // remaining refname rules: `@{`, dot-leading components, trailing `.`
        if !git2::Reference::is_valid_name(full) {
            return Err(InvalidNameError::InvalidPath(full.to_string()));
        }
        Ok(())
    }

    /// get the full ref path (e.g., "refs/notes/xref-cherry-picks")
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// name below `refs/notes/`
    pub fn short(&self) -> &str {
        &self.0[Self::PREFIX.len()..]
    }
}

impl fmt::Display for NotesRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NotesRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// git signature (author/committer info)
#[derive(Debug, Clone)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    /// create a new signature
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// fallback signature when the repository has no user configured
    pub fn gitxref() -> Self {
        Self::new("gitxref", "gitxref@localhost")
    }

    /// the repository's configured identity, or the gitxref fallback
    pub(crate) fn from_repo(repo: &git2::Repository) -> Self {
        match repo.signature() {
            Ok(sig) => Self::new(
                sig.name().unwrap_or("gitxref"),
                sig.email().unwrap_or("gitxref@localhost"),
            ),
            Err(_) => Self::gitxref(),
        }
    }

    /// convert to git2::Signature
    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

/// error type for invalid names (notes refs, revisions)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    InvalidCharacter { char: char, position: usize },
    InvalidPath(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
            Self::InvalidPath(path) => write!(f, "invalid path: '{}'", path),
        }
    }
}

impl std::error::Error for InvalidNameError {}
