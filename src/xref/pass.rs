//! One record or clear pass over a revision range.
//!
//! ```text
//! Idle ──▶ Traversing ──▶ Recording ──▶ Finalizing ──▶ Committed
//!                   └───▶ Clearing ─────────────────────▲
//! ```
//!
//! Recording only accumulates into a [`ReverseIndex`]; notes are written once
//! the walk is complete, one per source, and the notes ref is updated by a
//! single commit at the end. Clearing unbinds notes as commits are visited.
//! Any error aborts the pass before the notes ref is touched.

use std::fmt;

use git2::Repository;
use serde::Serialize;
use tracing::{debug, info, info_span};
use ulid::Ulid;

use crate::storage::{
    BindOutcome, CommitId, CommitInfo, GitNotesStore, GitRepository, NotesStore, RevisionWalk,
};
use crate::trailer::{TrailerBlock, TrailerParser};
use crate::xref::clearer::{ClearOutcome, NoteClearer};
use crate::xref::config::{PassMode, XrefConfig};
use crate::xref::error::{XrefError, XrefResult};
use crate::xref::index::ReverseIndex;
use crate::xref::recorder::{ChainMode, RecordOutcome, Recorder};
use crate::xref::resolver::TrailerResolver;
use crate::xref::writer::NoteWriter;

/// Message of the notes commit written by every pass.
pub const NOTES_COMMIT_MESSAGE: &str = "Notes updated by 'gitxref'";

/// Lifecycle of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassPhase {
    Idle,
    Traversing,
    Recording,
    Clearing,
    Finalizing,
    Committed,
}

impl fmt::Display for PassPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassPhase::Idle => "idle",
            PassPhase::Traversing => "traversing",
            PassPhase::Recording => "recording",
            PassPhase::Clearing => "clearing",
            PassPhase::Finalizing => "finalizing",
            PassPhase::Committed => "committed",
        };
        f.write_str(name)
    }
}

/// Counters and result of a completed pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass_id: String,
    pub mode: &'static str,
    pub notes_ref: String,
    pub phase: PassPhase,
    pub commits_visited: usize,
    pub edges_recorded: usize,
    pub duplicate_edges: usize,
    pub chained_edges: usize,
    pub unresolved: usize,
    pub self_references: usize,
    pub notes_written: usize,
    pub notes_merged: usize,
    pub notes_removed: usize,
    pub notes_absent: usize,
    /// the notes commit, `None` if nothing changed
    pub notes_commit: Option<CommitId>,
}

impl PassReport {
    fn new(pass_id: Ulid, config: &XrefConfig) -> Self {
        Self {
            pass_id: pass_id.to_string(),
            mode: config.mode.name(),
            notes_ref: config.notes_ref.to_string(),
            phase: PassPhase::Idle,
            commits_visited: 0,
            edges_recorded: 0,
            duplicate_edges: 0,
            chained_edges: 0,
            unresolved: 0,
            self_references: 0,
            notes_written: 0,
            notes_merged: 0,
            notes_removed: 0,
            notes_absent: 0,
            notes_commit: None,
        }
    }

    fn advance(&mut self, phase: PassPhase) {
        debug!(from = %self.phase, to = %phase, "pass phase");
        self.phase = phase;
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            "clear" => write!(
                f,
                "{}: {} commits, {} notes removed, {} without notes",
                self.notes_ref, self.commits_visited, self.notes_removed, self.notes_absent
            ),
            _ => write!(
                f,
                "{}: {} commits, {} edges, {} notes written",
                self.notes_ref,
                self.commits_visited,
                self.edges_recorded + self.chained_edges,
                self.notes_written + self.notes_merged
            ),
        }
    }
}

/// Drives a pass according to an [`XrefConfig`].
pub struct XrefPass<P = TrailerBlock> {
    config: XrefConfig,
    parser: P,
}

impl XrefPass<TrailerBlock> {
    pub fn new(config: XrefConfig) -> Self {
        Self {
            config,
            parser: TrailerBlock::new(),
        }
    }
}

impl<P: TrailerParser> XrefPass<P> {
    /// use a different trailer parser
    pub fn with_parser<Q: TrailerParser>(self, parser: Q) -> XrefPass<Q> {
        XrefPass {
            config: self.config,
            parser,
        }
    }

    /// Run the pass against the notes ref named in the configuration.
    ///
    /// Holds the repository's write lock for the whole pass.
    pub fn run(&self, repo: &GitRepository) -> XrefResult<PassReport> {
        repo.with_repo_mut(|git| -> XrefResult<PassReport> {
            let mut store = GitNotesStore::open(git, self.config.notes_ref.clone())?;
            self.run_with_store(git, &mut store)
        })
    }

    /// Run the pass against an already opened store.
    pub fn run_with_store<S: NotesStore + ?Sized>(
        &self,
        repo: &Repository,
        store: &mut S,
    ) -> XrefResult<PassReport> {
        let pass_id = Ulid::new();
        let span = info_span!("xref_pass", pass_id = %pass_id, mode = self.config.mode.name());
        let _guard = span.enter();

        let mut report = PassReport::new(pass_id, &self.config);

        let mut walk = RevisionWalk::new(repo, &self.config.revisions, self.config.order)
            .map_err(XrefError::WalkSetup)?;
        if self.config.first_parent {
            walk = walk.first_parent_only().map_err(XrefError::WalkSetup)?;
        }
        report.advance(PassPhase::Traversing);

        match &self.config.mode {
            PassMode::Record { prefix, tag, chain } => {
                report.advance(PassPhase::Recording);
                let index = self.record(repo, walk, prefix, *chain, &mut report)?;

                report.advance(PassPhase::Finalizing);
                let writer = NoteWriter::new(prefix.clone(), tag.clone())
                    .conflict_policy(self.config.conflict);
                self.write_notes(store, &writer, &index, &mut report)?;
            }
            PassMode::Clear => {
                report.advance(PassPhase::Clearing);
                self.clear(store, walk, &mut report)?;
            }
        }

        report.notes_commit = store.finalize(NOTES_COMMIT_MESSAGE)?;
        report.advance(PassPhase::Committed);

        info!(
            commits = report.commits_visited,
            notes_commit = ?report.notes_commit.map(|c| c.short()),
            "pass complete"
        );
        Ok(report)
    }

    fn record(
        &self,
        repo: &Repository,
        walk: RevisionWalk<'_>,
        prefix: &str,
        chain: ChainMode,
        report: &mut PassReport,
    ) -> XrefResult<ReverseIndex> {
        let recorder = Recorder::new(repo, TrailerResolver::new(prefix), &self.parser).chain_mode(chain);
        let mut index = ReverseIndex::new();

        for commit in walk {
            let commit = commit?;
            report.commits_visited += 1;

            let outcome = recorder.record(&mut index, &commit)?;
            self.report_record(&commit, &outcome);
            match outcome {
                RecordOutcome::Recorded { added, chained, .. } => {
                    if added {
                        report.edges_recorded += 1;
                    } else {
                        report.duplicate_edges += 1;
                    }
                    report.chained_edges += chained;
                }
                RecordOutcome::NoMatch => {}
                RecordOutcome::Unresolved(_) => report.unresolved += 1,
                RecordOutcome::SelfReference => report.self_references += 1,
            }
        }

        debug!(sources = index.len(), edges = index.edge_count(), "traversal complete");
        Ok(index)
    }

    fn report_record(&self, commit: &CommitInfo, outcome: &RecordOutcome) {
        if !self.config.verbose {
            return;
        }
        match outcome {
            RecordOutcome::Recorded { source, added: true, .. } => {
                info!("Recording {} -> {}", source, commit.id)
            }
            RecordOutcome::Recorded { source, added: false, .. } => {
                info!("Already recorded {} -> {}", source, commit.id)
            }
            RecordOutcome::Unresolved(reason) => {
                info!("Skipping {}: {}", commit.id, reason)
            }
            RecordOutcome::SelfReference => {
                info!("Skipping {}: references itself", commit.id)
            }
            RecordOutcome::NoMatch => {}
        }
    }

    fn write_notes<S: NotesStore + ?Sized>(
        &self,
        store: &mut S,
        writer: &NoteWriter,
        index: &ReverseIndex,
        report: &mut PassReport,
    ) -> XrefResult<()> {
        for (source, destinations) in index {
            let outcome = writer
                .write(store, source, destinations)
                .map_err(|cause| XrefError::NoteWrite {
                    source_commit: source.to_hex(),
                    cause,
                })?;

            if self.config.verbose {
                for destination in destinations {
                    info!("Adding note {} -> {}", source, destination);
                }
            }
            match outcome {
                BindOutcome::Added | BindOutcome::Replaced => report.notes_written += 1,
                BindOutcome::Merged => report.notes_merged += 1,
                BindOutcome::Unchanged => {}
            }
        }
        Ok(())
    }

    fn clear<S: NotesStore + ?Sized>(
        &self,
        store: &mut S,
        walk: RevisionWalk<'_>,
        report: &mut PassReport,
    ) -> XrefResult<()> {
        let clearer = NoteClearer::new();

        for commit in walk {
            let commit = commit?;
            report.commits_visited += 1;

            match clearer.clear(store, commit.id)? {
                ClearOutcome::Removed => {
                    report.notes_removed += 1;
                    if self.config.verbose {
                        info!("Removing note for object {}", commit.id);
                    }
                }
                ClearOutcome::Absent => {
                    report.notes_absent += 1;
                    if self.config.verbose {
                        info!("Object {} has no note", commit.id);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::{commit_on_head, setup_repo};
    use crate::storage::{
        BlobId, CommitBuilder, ConflictPolicy, NotesRef, StorageError, StorageResult, UnbindOutcome,
        WalkOrder,
    };
    use crate::xref::config::{Preset, CHERRY_PICKED_TO_TAG};

    fn picked(title: &str, from: CommitId) -> String {
        format!("{}\n\n(cherry picked from commit {})\n", title, from)
    }

    fn open(dir: &tempfile::TempDir) -> GitRepository {
        GitRepository::open(dir.path()).unwrap()
    }

    fn note(repo: &Repository, notes_ref: &str, commit: CommitId) -> Option<String> {
        repo.find_note(Some(notes_ref), commit.raw())
            .ok()
            .and_then(|n| n.message().map(str::to_string))
    }

    fn cherry_config() -> XrefConfig {
        XrefConfig::builder().preset(Preset::CherryPicks).build().unwrap()
    }

    #[test]
    fn test_record_pass_round_trip() {
        let (dir, git) = setup_repo();
        let a = commit_on_head(&git, "A");
        let b = commit_on_head(&git, &picked("B", a));
        let c = commit_on_head(&git, &picked("C", a));

        let config = XrefConfig::builder()
            .preset(Preset::CherryPicks)
            .order(WalkOrder::Topological)
            .build()
            .unwrap();
        let report = XrefPass::new(config).run(&open(&dir)).unwrap();

        assert_eq!(report.phase, PassPhase::Committed);
        assert_eq!(report.commits_visited, 3);
        assert_eq!(report.edges_recorded, 2);
        assert_eq!(report.notes_written, 1);
        assert!(report.notes_commit.is_some());

        // the walk is newest first, so C is recorded before B
        let expected = format!(
            "{tag}: {c}\n{tag}: {b}\n",
            tag = CHERRY_PICKED_TO_TAG,
            c = c,
            b = b
        );
        assert_eq!(note(&git, "refs/notes/xref-cherry-picks", a), Some(expected));
        assert_eq!(note(&git, "refs/notes/xref-cherry-picks", b), None);

        let notes_commit = git.find_commit(report.notes_commit.unwrap().raw()).unwrap();
        assert_eq!(notes_commit.message(), Some(NOTES_COMMIT_MESSAGE));
    }

    #[test]
    fn test_record_pass_is_deterministic() {
        let (dir, git) = setup_repo();
        let a = commit_on_head(&git, "A");
        let x = commit_on_head(&git, "X");
        commit_on_head(&git, &picked("B", a));
        commit_on_head(&git, &picked("Y", x));
        commit_on_head(&git, &picked("C", a));

        let config = XrefConfig::builder()
            .preset(Preset::CherryPicks)
            .order(WalkOrder::Topological)
            .build()
            .unwrap();

        XrefPass::new(config.clone()).run(&open(&dir)).unwrap();
        let first: Vec<_> = [a, x].iter().map(|id| note(&git, "refs/notes/xref-cherry-picks", *id)).collect();

        let clear = XrefConfig::clear(CHERRY_PICKS_REF).build().unwrap();
        XrefPass::new(clear).run(&open(&dir)).unwrap();

        XrefPass::new(config).run(&open(&dir)).unwrap();
        let second: Vec<_> = [a, x].iter().map(|id| note(&git, "refs/notes/xref-cherry-picks", *id)).collect();

        assert_eq!(first, second);
        assert!(first.iter().all(Option::is_some));
    }

    const CHERRY_PICKS_REF: &str = "refs/notes/xref-cherry-picks";

    #[test]
    fn test_rerun_without_clear_conflicts() {
        let (dir, git) = setup_repo();
        let a = commit_on_head(&git, "A");
        commit_on_head(&git, &picked("B", a));
        let repo = open(&dir);

        let first = XrefPass::new(cherry_config()).run(&repo).unwrap();
        let err = XrefPass::new(cherry_config()).run(&repo).unwrap_err();
        assert!(err.is_conflict());

        // the failed pass did not move the notes ref
        let tip = git.refname_to_id(CHERRY_PICKS_REF).unwrap();
        assert_eq!(Some(CommitId::from_hex(&tip.to_string()).unwrap()), first.notes_commit);
    }

    #[test]
    fn test_rerun_with_merge_policy_is_unchanged() {
        let (dir, git) = setup_repo();
        let a = commit_on_head(&git, "A");
        commit_on_head(&git, &picked("B", a));
        let repo = open(&dir);

        XrefPass::new(cherry_config()).run(&repo).unwrap();
        let config = XrefConfig::builder()
            .preset(Preset::CherryPicks)
            .conflict(ConflictPolicy::Merge)
            .build()
            .unwrap();
        let report = XrefPass::new(config).run(&repo).unwrap();

        assert_eq!(report.notes_written, 0);
        assert_eq!(report.notes_merged, 0);
        assert_eq!(report.notes_commit, None);
    }

    #[test]
    fn test_clear_pass() {
        let (dir, git) = setup_repo();
        let a = commit_on_head(&git, "A");
        commit_on_head(&git, &picked("B", a));
        let repo = open(&dir);

        XrefPass::new(cherry_config()).run(&repo).unwrap();

        let clear = XrefConfig::clear(CHERRY_PICKS_REF).verbose(true).build().unwrap();
        let report = XrefPass::new(clear.clone()).run(&repo).unwrap();
        assert_eq!(report.mode, "clear");
        assert_eq!(report.notes_removed, 1);
        assert_eq!(report.notes_absent, 1);
        assert!(report.notes_commit.is_some());
        assert_eq!(note(&git, CHERRY_PICKS_REF, a), None);

        let again = XrefPass::new(clear).run(&repo).unwrap();
        assert_eq!(again.notes_removed, 0);
        assert_eq!(again.notes_absent, 2);
        assert_eq!(again.notes_commit, None);
    }

    #[test]
    fn test_unmatched_and_unresolved_commits_are_skipped() {
        let (dir, git) = setup_repo();
        commit_on_head(&git, "A\n\nSigned-off-by: A <a@x>\n");
        commit_on_head(&git, "B\n\n(cherry picked from commit 00000000000000000000000000000000000000aa)\n");

        let report = XrefPass::new(cherry_config()).run(&open(&dir)).unwrap();
        assert_eq!(report.commits_visited, 2);
        assert_eq!(report.edges_recorded, 0);
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.notes_commit, None);
    }

    #[test]
    fn test_bad_revision_fails_before_any_work() {
        let (dir, git) = setup_repo();
        commit_on_head(&git, "A");

        let config = XrefConfig::builder()
            .preset(Preset::CherryPicks)
            .revision("no-such-branch")
            .build()
            .unwrap();
        let err = XrefPass::new(config).run(&open(&dir)).unwrap_err();
        assert!(err.is_setup_failure());
        assert!(git.find_reference(CHERRY_PICKS_REF).is_err());
    }

    #[test]
    fn test_empty_repository_fails_before_any_work() {
        let (dir, git) = setup_repo();

        let err = XrefPass::new(cherry_config()).run(&open(&dir)).unwrap_err();
        assert!(err.is_setup_failure());
        assert!(matches!(err, XrefError::WalkSetup(StorageError::EmptyRepository)));
        assert!(git.find_reference(CHERRY_PICKS_REF).is_err());
    }

    #[test]
    fn test_first_parent_pass_skips_merged_side_branch() {
        let (dir, git) = setup_repo();
        let a = commit_on_head(&git, "A");
        let side = CommitBuilder::new(&git)
            .parent(a)
            .message(picked("side", a))
            .commit()
            .unwrap();
        let main = commit_on_head(&git, "main");
        let merge = CommitBuilder::new(&git)
            .parent(main)
            .parent(side)
            .message("Merge side")
            .commit()
            .unwrap();
        git.set_head_detached(merge.raw()).unwrap();
        let repo = open(&dir);

        let config = XrefConfig::builder()
            .preset(Preset::CherryPicks)
            .first_parent(true)
            .build()
            .unwrap();
        let report = XrefPass::new(config).run(&repo).unwrap();
        assert_eq!(report.commits_visited, 3);
        assert_eq!(report.edges_recorded, 0);
        assert_eq!(note(&git, CHERRY_PICKS_REF, a), None);

        let report = XrefPass::new(cherry_config()).run(&repo).unwrap();
        assert_eq!(report.commits_visited, 4);
        assert_eq!(report.edges_recorded, 1);
        assert!(note(&git, CHERRY_PICKS_REF, a).is_some());
    }

    #[test]
    fn test_merge_into_non_utf8_note() {
        let (dir, git) = setup_repo();
        let a = commit_on_head(&git, "A");
        let b = commit_on_head(&git, &picked("B", a));

        // a note that is valid for git but not UTF-8
        let blob = git.blob(&[0xff, 0xfe, b'\n']).unwrap();
        let mut tree = git.treebuilder(None).unwrap();
        tree.insert(a.to_hex(), blob, git2::FileMode::Blob.into()).unwrap();
        let tree = git.find_tree(tree.write().unwrap()).unwrap();
        let sig = git2::Signature::now("Other", "other@test.com").unwrap();
        git.commit(Some(CHERRY_PICKS_REF), &sig, &sig, "seed", &tree, &[])
            .unwrap();

        let config = XrefConfig::builder()
            .preset(Preset::CherryPicks)
            .conflict(ConflictPolicy::Merge)
            .build()
            .unwrap();
        let report = XrefPass::new(config).run(&open(&dir)).unwrap();
        assert_eq!(report.notes_merged, 1);

        let merged = git.find_note(Some(CHERRY_PICKS_REF), a.raw()).unwrap();
        let expected = format!("\u{fffd}\u{fffd}\n{}: {}\n", CHERRY_PICKED_TO_TAG, b);
        assert_eq!(String::from_utf8_lossy(merged.message_bytes()), expected);
        assert_eq!(&merged.message_bytes()[..2], b"\xff\xfe");
    }

    #[test]
    fn test_untagged_notes_repeat_label() {
        let (dir, git) = setup_repo();
        let a = commit_on_head(&git, "A");
        commit_on_head(&git, &format!("B\n\nBackport-of: {}\n", a));
        commit_on_head(&git, &format!("C\n\nBackport-of: {}\n", a));

        let config = XrefConfig::record("Backport-of: ", "backports").build().unwrap();
        XrefPass::new(config).run(&open(&dir)).unwrap();

        assert_eq!(
            note(&git, "refs/notes/backports", a).as_deref(),
            Some("Backport-of: \nBackport-of: \n")
        );
    }

    #[test]
    fn test_transitive_pass() {
        let (dir, git) = setup_repo();
        let root = commit_on_head(&git, "root");
        let mid = commit_on_head(&git, &picked("mid", root));
        let leaf = commit_on_head(&git, &picked("leaf", mid));

        let config = XrefConfig::builder()
            .preset(Preset::CherryPicks)
            .chain(ChainMode::Transitive)
            .revision(format!("{}..HEAD", mid))
            .build()
            .unwrap();
        let report = XrefPass::new(config).run(&open(&dir)).unwrap();
        assert_eq!(report.commits_visited, 1);
        assert_eq!(report.chained_edges, 2);

        let root_note = note(&git, CHERRY_PICKS_REF, root).unwrap();
        assert!(root_note.contains(&mid.to_hex()));
        assert!(root_note.contains(&leaf.to_hex()));
    }

    /// treats every body line as a trailer
    struct EveryLine;

    impl TrailerParser for EveryLine {
        fn trailers(&self, message: &str) -> Vec<String> {
            message.lines().skip(1).map(str::to_string).collect()
        }
    }

    #[test]
    fn test_custom_trailer_parser() {
        let (dir, git) = setup_repo();
        let a = commit_on_head(&git, "A");
        // prose after the line keeps it out of the default parser's trailer block
        commit_on_head(&git, &format!("B\n\nBackport-of: {}\nand some prose afterwards\n", a));

        let config = XrefConfig::record("Backport-of: ", "backports").build().unwrap();
        let report = XrefPass::new(config.clone()).run(&open(&dir)).unwrap();
        assert_eq!(report.edges_recorded, 0);

        let report = XrefPass::new(config).with_parser(EveryLine).run(&open(&dir)).unwrap();
        assert_eq!(report.edges_recorded, 1);
        assert!(note(&git, "refs/notes/backports", a).is_some());
    }

    /// store that refuses every bind after the first `allowed`
    struct FailingStore {
        allowed: usize,
        bound: Vec<CommitId>,
        finalized: bool,
        notes_ref: NotesRef,
    }

    impl NotesStore for FailingStore {
        fn notes_ref(&self) -> &NotesRef {
            &self.notes_ref
        }

        fn get(&self, _commit: CommitId) -> StorageResult<Option<String>> {
            Ok(None)
        }

        fn put(&mut self, _content: &[u8]) -> StorageResult<BlobId> {
            Ok(BlobId::new(git2::Oid::zero()))
        }

        fn bind(&mut self, commit: CommitId, _blob: BlobId, _policy: ConflictPolicy) -> StorageResult<BindOutcome> {
            if self.bound.len() >= self.allowed {
                return Err(StorageError::NoteExists {
                    commit,
                    notes_ref: self.notes_ref.to_string(),
                });
            }
            self.bound.push(commit);
            Ok(BindOutcome::Added)
        }

        fn unbind(&mut self, _commit: CommitId) -> StorageResult<UnbindOutcome> {
            Ok(UnbindOutcome::Absent)
        }

        fn finalize(&mut self, _message: &str) -> StorageResult<Option<CommitId>> {
            self.finalized = true;
            Ok(None)
        }
    }

    #[test]
    fn test_first_write_failure_aborts_pass() {
        let (_dir, git) = setup_repo();
        let a = commit_on_head(&git, "A");
        let x = commit_on_head(&git, "X");
        commit_on_head(&git, &picked("B", a));
        commit_on_head(&git, &picked("Y", x));

        let mut store = FailingStore {
            allowed: 1,
            bound: Vec::new(),
            finalized: false,
            notes_ref: NotesRef::new("x").unwrap(),
        };
        let err = XrefPass::new(cherry_config())
            .run_with_store(&git, &mut store)
            .unwrap_err();

        assert!(matches!(err, XrefError::NoteWrite { .. }));
        assert_eq!(store.bound.len(), 1);
        assert!(!store.finalized);
    }
}
