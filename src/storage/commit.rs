//!  Commit lookup, creation and history traversal
//!
//! - commits are only read here for their identity and message
//! - the one commit this crate ever creates is the notes commit
//! - revision walks turn user revision arguments into an ordered commit stream
//!
//! this module wraps `git2::Revwalk` so the rest of the crate never deals
//! with raw oids

use git2::{ObjectType, Repository, RevparseMode, Revwalk, Sort};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{CommitId, GitSignature};

/// a commit as the xref layer sees it: identity and message
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub message: String,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        Self {
            id: CommitId::new(commit.id()),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
        }
    }
}

/// builder for creating commits with a fluent interface
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<git2::Oid>,
    parents: Vec<CommitId>,
    message: String,
    signature: GitSignature,
}

impl<'a> CommitBuilder<'a> {
    /// create a new CommitBuilder
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            signature: GitSignature::gitxref(),
        }
    }

    /// set the tree for this commit
    pub(crate) fn tree(mut self, tree_id: git2::Oid) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the author/committer signature
    pub fn signature(mut self, signature: GitSignature) -> Self {
        self.signature = signature;
        self
    }

    /// create the commit and return its ID; no ref is moved
    ///
    /// without an explicit tree the empty tree is used
    pub fn commit(self) -> StorageResult<CommitId> {
        let tree_id = match self.tree_id {
            Some(id) => id,
            None => self.repo.treebuilder(None)?.write()?,
        };

        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature.to_git2_signature()?;

        let parent_commits: Vec<git2::Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;

        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self.repo.commit(
            None,
            &sig,
            &sig,
            &self.message,
            &tree,
            &parent_refs,
        )?;

        Ok(CommitId::new(oid))
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: CommitId) -> StorageResult<CommitInfo> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::CommitNotFound(id.to_string()))?;

    Ok(CommitInfo::from_git2(&commit))
}

/// look up an object by id and return it as a commit only if it is one
///
/// tags are not peeled: a tag naming a commit is not itself a commit
pub fn lookup_commit(repo: &Repository, id: CommitId) -> StorageResult<Option<CommitInfo>> {
    let object = match repo.find_object(id.raw(), None) {
        Ok(object) => object,
        Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::Git(e)),
    };

    if object.kind() != Some(ObjectType::Commit) {
        return Ok(None);
    }

    let commit = object
        .into_commit()
        .map_err(|_| StorageError::Internal("commit object did not downcast".to_string()))?;
    Ok(Some(CommitInfo::from_git2(&commit)))
}

/// order in which a revision walk emits commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalkOrder {
    /// newest first by commit time
    #[default]
    Time,
    /// parents never before their children, ties broken by time
    Topological,
    /// oldest first
    Reverse,
}

impl WalkOrder {
    fn sorting(self) -> Sort {
        match self {
            WalkOrder::Time => Sort::TIME,
            WalkOrder::Topological => Sort::TOPOLOGICAL | Sort::TIME,
            WalkOrder::Reverse => Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE,
        }
    }
}

/// iterate over the commits selected by a set of revision arguments
///
/// accepts anything `git rev-parse` does plus the usual walk syntax:
/// `rev`, `^rev` (exclude), `a..b` and `a...b`. With no arguments the walk
/// starts at HEAD.
pub struct RevisionWalk<'repo> {
    repo: &'repo Repository,
    revwalk: Revwalk<'repo>,
}

impl<'repo> RevisionWalk<'repo> {
    /// prepare a walk; fails before yielding anything if a revision is bad
    pub fn new<S: AsRef<str>>(
        repo: &'repo Repository,
        revisions: &[S],
        order: WalkOrder,
    ) -> StorageResult<Self> {
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(order.sorting())?;

        if revisions.is_empty() {
            // an unborn HEAD makes push_head fail with a generic error
            match repo.head() {
                Ok(_) => revwalk.push_head()?,
                Err(e)
                    if matches!(
                        e.code(),
                        git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
                    ) =>
                {
                    return Err(StorageError::EmptyRepository)
                }
                Err(e) => return Err(StorageError::Git(e)),
            }
        }

        for spec in revisions {
            push_revision(repo, &mut revwalk, spec.as_ref())?;
        }

        Ok(Self { repo, revwalk })
    }

    /// only follow first parents (linear history through merges)
    pub fn first_parent_only(mut self) -> StorageResult<Self> {
        self.revwalk.simplify_first_parent()?;
        Ok(self)
    }
}

fn push_revision(repo: &Repository, revwalk: &mut Revwalk<'_>, spec: &str) -> StorageResult<()> {
    let bad = || StorageError::BadRevision(spec.to_string());

    if let Some(excluded) = spec.strip_prefix('^') {
        let commit = repo
            .revparse_single(excluded)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| bad())?;
        revwalk.hide(commit.id())?;
        return Ok(());
    }

    let revspec = repo.revparse(spec).map_err(|_| bad())?;
    let peel = |obj: Option<&git2::Object<'_>>| -> StorageResult<git2::Oid> {
        let obj = obj.ok_or_else(bad)?;
        Ok(obj.peel_to_commit().map_err(|_| bad())?.id())
    };

    let mode = revspec.mode();
    if mode.contains(RevparseMode::MERGE_BASE) {
        let from = peel(revspec.from())?;
        let to = peel(revspec.to())?;
        revwalk.push(from)?;
        revwalk.push(to)?;
        if let Ok(base) = repo.merge_base(from, to) {
            revwalk.hide(base)?;
        }
    } else if mode.contains(RevparseMode::RANGE) {
        revwalk.hide(peel(revspec.from())?)?;
        revwalk.push(peel(revspec.to())?)?;
    } else {
        revwalk.push(peel(revspec.from())?)?;
    }

    Ok(())
}

impl<'repo> Iterator for RevisionWalk<'repo> {
    type Item = StorageResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.revwalk.next()? {
            Ok(oid) => match self.repo.find_commit(oid) {
                Ok(commit) => Some(Ok(CommitInfo::from_git2(&commit))),
                Err(e) => Some(Err(StorageError::Git(e))),
            },
            Err(e) => Some(Err(StorageError::Git(e))),
        }
    }
}
