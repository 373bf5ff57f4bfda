//! Notes storage.
//!
//! A notes ref points at a commit whose tree maps annotated object ids
//! (entry names, optionally split into fan-out directories) to note blobs.
//! [`GitNotesStore`] loads that mapping once, stages binds and unbinds in
//! memory and writes a single notes commit on [`NotesStore::finalize`].
//! Nothing becomes visible in the ref before that.
//!
//! The written tree is flat. Top-level entries that are not notes are
//! carried over unchanged; non-note files inside fan-out directories are not.

use std::collections::BTreeMap;

use git2::{FileMode, ObjectType, Oid, Repository, TreeWalkMode, TreeWalkResult};
use tracing::debug;

use crate::storage::commit::CommitBuilder;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, CommitId, GitSignature, NotesRef};

/// What to do when binding a note to a commit that already has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// refuse with [`StorageError::NoteExists`]
    #[default]
    Fail,
    /// drop the existing note
    Replace,
    /// keep the existing note and append lines it does not contain yet
    Merge,
}

/// Result of a successful bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Added,
    Replaced,
    Merged,
    /// merging produced the note that was already there
    Unchanged,
}

/// Result of an unbind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnbindOutcome {
    Removed,
    Absent,
}

/// A persistent commit → note map with one atomic update per session.
pub trait NotesStore {
    /// the ref this store reads and writes
    fn notes_ref(&self) -> &NotesRef;

    /// read the note bound to `commit`, including staged changes
    fn get(&self, commit: CommitId) -> StorageResult<Option<String>>;

    /// store note content, returning its blob id
    fn put(&mut self, content: &[u8]) -> StorageResult<BlobId>;

    /// bind a stored blob to `commit`
    fn bind(
        &mut self,
        commit: CommitId,
        blob: BlobId,
        policy: ConflictPolicy,
    ) -> StorageResult<BindOutcome>;

    /// remove the note bound to `commit`, if any
    fn unbind(&mut self, commit: CommitId) -> StorageResult<UnbindOutcome>;

    /// commit all staged changes as one update of the notes ref.
    ///
    /// Returns the new notes commit, or `None` if nothing changed.
    fn finalize(&mut self, message: &str) -> StorageResult<Option<CommitId>>;
}

/// [`NotesStore`] backed by a notes ref in a git repository.
pub struct GitNotesStore<'repo> {
    repo: &'repo Repository,
    notes_ref: NotesRef,
    /// notes commit the staged changes are based on
    base: Option<Oid>,
    /// annotated object → note blob
    entries: BTreeMap<Oid, Oid>,
    /// top-level tree entries that are not notes
    others: Vec<OtherEntry>,
    dirty: bool,
    signature: GitSignature,
}

impl<'repo> GitNotesStore<'repo> {
    /// open the notes ref; a missing ref is an empty store
    pub fn open(repo: &'repo Repository, notes_ref: NotesRef) -> StorageResult<Self> {
        let base = match repo.refname_to_id(notes_ref.as_str()) {
            Ok(oid) => Some(oid),
            Err(e) if e.code() == git2::ErrorCode::NotFound => None,
            Err(e) => return Err(StorageError::Git(e)),
        };

        let (entries, others) = match base {
            Some(oid) => load_notes_tree(&repo.find_commit(oid)?.tree()?)?,
            None => (BTreeMap::new(), Vec::new()),
        };

        debug!(notes_ref = %notes_ref, notes = entries.len(), others = others.len(), "opened notes ref");

        Ok(Self {
            repo,
            notes_ref,
            base,
            entries,
            others,
            dirty: false,
            signature: GitSignature::from_repo(repo),
        })
    }

    /// number of notes, including staged changes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// whether there are staged changes not yet finalized
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn write_tree(&self) -> StorageResult<Oid> {
        let mut builder = self.repo.treebuilder(None)?;
        for other in &self.others {
            builder.insert(other.name.clone(), other.id, other.mode)?;
        }
        for (annotated, blob) in &self.entries {
            builder.insert(annotated.to_string(), *blob, FileMode::Blob.into())?;
        }
        Ok(builder.write()?)
    }

    /// move the notes ref from `base` to `new`, refusing if it moved meanwhile
    fn update_ref(&self, new: CommitId, message: &str) -> StorageResult<()> {
        let log_message = format!("notes: {}", message);
        let result = match self.base {
            Some(current) => self.repo.reference_matching(
                self.notes_ref.as_str(),
                new.raw(),
                true,
                current,
                &log_message,
            ),
            None => self
                .repo
                .reference(self.notes_ref.as_str(), new.raw(), false, &log_message),
        };

        result.map(|_| ()).map_err(|e| match e.code() {
            git2::ErrorCode::Modified | git2::ErrorCode::Exists => {
                StorageError::ConcurrentModification {
                    notes_ref: self.notes_ref.to_string(),
                }
            }
            _ => StorageError::Git(e),
        })
    }
}

/// tree entry kept verbatim across rewrites of the notes tree
#[derive(Debug, Clone)]
struct OtherEntry {
    name: Vec<u8>,
    id: Oid,
    mode: i32,
}

/// split a notes tree into notes and the top-level entries that are not notes
///
/// a note is a blob whose path, slashes removed, is a full 40-digit hex id;
/// two-digit hex directories are fan-out and walked into
fn load_notes_tree(tree: &git2::Tree<'_>) -> StorageResult<(BTreeMap<Oid, Oid>, Vec<OtherEntry>)> {
    let mut entries = BTreeMap::new();
    let mut others = Vec::new();

    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        let name = entry.name_bytes();
        let hex = name.iter().all(u8::is_ascii_hexdigit);

        match entry.kind() {
            Some(ObjectType::Tree) if hex && name.len() == 2 => return TreeWalkResult::Ok,
            Some(ObjectType::Blob) if hex => {
                let mut path: Vec<u8> = root.bytes().filter(|b| *b != b'/').collect();
                path.extend_from_slice(name);
                let annotated = std::str::from_utf8(&path).ok().and_then(|p| Oid::from_str(p).ok());
                if let (40, Some(annotated)) = (path.len(), annotated) {
                    entries.insert(annotated, entry.id());
                    return TreeWalkResult::Ok;
                }
            }
            _ => {}
        }

        if root.is_empty() {
            others.push(OtherEntry {
                name: name.to_vec(),
                id: entry.id(),
                mode: entry.filemode(),
            });
        }
        TreeWalkResult::Skip
    })?;

    Ok((entries, others))
}

/// existing lines first, then new lines that are not already present
///
/// works on raw bytes: a note is not required to be UTF-8
fn merge_note_lines(existing: &[u8], incoming: &[u8]) -> Vec<u8> {
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    let mut seen: Vec<&[u8]> = Vec::new();
    let lines = existing.split(|b| *b == b'\n').chain(incoming.split(|b| *b == b'\n'));
    for line in lines {
        if line.is_empty() || seen.contains(&line) {
            continue;
        }
        seen.push(line);
        merged.extend_from_slice(line);
        merged.push(b'\n');
    }
    merged
}

impl NotesStore for GitNotesStore<'_> {
    fn notes_ref(&self) -> &NotesRef {
        &self.notes_ref
    }

    fn get(&self, commit: CommitId) -> StorageResult<Option<String>> {
        match self.entries.get(&commit.raw()) {
            Some(blob) => {
                let blob = self.repo.find_blob(*blob)?;
                Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
            }
            None => Ok(None),
        }
    }

    fn put(&mut self, content: &[u8]) -> StorageResult<BlobId> {
        Ok(BlobId::new(self.repo.blob(content)?))
    }

    fn bind(
        &mut self,
        commit: CommitId,
        blob: BlobId,
        policy: ConflictPolicy,
    ) -> StorageResult<BindOutcome> {
        let existing = match self.entries.get(&commit.raw()) {
            None => {
                self.entries.insert(commit.raw(), blob.raw());
                self.dirty = true;
                return Ok(BindOutcome::Added);
            }
            Some(existing) => *existing,
        };

        match policy {
            ConflictPolicy::Fail => Err(StorageError::NoteExists {
                commit,
                notes_ref: self.notes_ref.to_string(),
            }),
            ConflictPolicy::Replace => {
                if existing != blob.raw() {
                    self.entries.insert(commit.raw(), blob.raw());
                    self.dirty = true;
                }
                Ok(BindOutcome::Replaced)
            }
            ConflictPolicy::Merge => {
                let current = self.repo.find_blob(existing)?;
                let incoming = self.repo.find_blob(blob.raw())?;
                let merged_blob = self
                    .repo
                    .blob(&merge_note_lines(current.content(), incoming.content()))?;
                if merged_blob == existing {
                    return Ok(BindOutcome::Unchanged);
                }
                self.entries.insert(commit.raw(), merged_blob);
                self.dirty = true;
                Ok(BindOutcome::Merged)
            }
        }
    }

    fn unbind(&mut self, commit: CommitId) -> StorageResult<UnbindOutcome> {
        match self.entries.remove(&commit.raw()) {
            Some(_) => {
                self.dirty = true;
                Ok(UnbindOutcome::Removed)
            }
            None => Ok(UnbindOutcome::Absent),
        }
    }

    fn finalize(&mut self, message: &str) -> StorageResult<Option<CommitId>> {
        if !self.is_dirty() {
            debug!(notes_ref = %self.notes_ref, "no note changes to commit");
            return Ok(None);
        }

        let tree = self.write_tree()?;
        let mut builder = CommitBuilder::new(self.repo)
            .tree(tree)
            .message(message)
            .signature(self.signature.clone());
        if let Some(base) = self.base {
            builder = builder.parent(CommitId::new(base));
        }
        let commit = builder.commit()?;

        self.update_ref(commit, message)?;
        self.base = Some(commit.raw());
        self.dirty = false;

        debug!(notes_ref = %self.notes_ref, commit = %commit.short(), notes = self.len(), "committed notes");
        Ok(Some(commit))
    }
}
