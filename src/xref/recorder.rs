//! Recording reference edges from destination commits.

use git2::Repository;
use tracing::debug;

use crate::storage::{lookup_commit, CommitId, CommitInfo, StorageResult};
use crate::trailer::TrailerParser;
use crate::xref::index::ReverseIndex;
use crate::xref::resolver::{TrailerResolver, Unresolved};

/// How far a reference is followed when recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainMode {
    /// only the edge named by the destination's own trailer
    #[default]
    Direct,
    /// also follow the source's own reference upward, so every ancestor in
    /// a chain of references lists all of its descendants
    Transitive,
}

/// What recording one commit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// an edge to `source` was recorded; `added` is false if it already was
    Recorded {
        source: CommitId,
        added: bool,
        /// edges added by following the chain above `source`
        chained: usize,
    },
    /// no trailer carries the prefix
    NoMatch,
    /// the matching trailer did not name a commit
    Unresolved(Unresolved),
    /// the matching trailer names the commit itself
    SelfReference,
}

/// Scans destination commits for the configured trailer and records edges.
pub struct Recorder<'repo, P> {
    repo: &'repo Repository,
    resolver: TrailerResolver,
    parser: P,
    chain: ChainMode,
}

impl<'repo, P: TrailerParser> Recorder<'repo, P> {
    pub fn new(repo: &'repo Repository, resolver: TrailerResolver, parser: P) -> Self {
        Self {
            repo,
            resolver,
            parser,
            chain: ChainMode::Direct,
        }
    }

    pub fn chain_mode(mut self, chain: ChainMode) -> Self {
        self.chain = chain;
        self
    }

    /// Find the source `message` refers to.
    ///
    /// Trailers are scanned last to first and the first one carrying the
    /// prefix wins: the most recently appended trailer describes the latest
    /// event. Earlier matching trailers are never consulted, even if the
    /// winning one fails to resolve.
    fn source_of(&self, message: &str) -> StorageResult<Option<Result<CommitId, Unresolved>>> {
        let trailers = self.parser.trailers(message);
        let value = trailers
            .iter()
            .rev()
            .find_map(|line| self.resolver.value_of(line));

        match value {
            Some(value) => Ok(Some(self.resolver.resolve(self.repo, value)?)),
            None => Ok(None),
        }
    }

    /// Record the edge named by `destination`'s trailers into `index`.
    pub fn record(
        &self,
        index: &mut ReverseIndex,
        destination: &CommitInfo,
    ) -> StorageResult<RecordOutcome> {
        let source = match self.source_of(&destination.message)? {
            None => return Ok(RecordOutcome::NoMatch),
            Some(Err(unresolved)) => {
                debug!(commit = %destination.id.short(), reason = %unresolved, "skipping unresolved trailer");
                return Ok(RecordOutcome::Unresolved(unresolved));
            }
            Some(Ok(source)) => source,
        };

        if source == destination.id {
            debug!(commit = %destination.id.short(), "skipping self reference");
            return Ok(RecordOutcome::SelfReference);
        }

        let added = index.insert(source, destination.id);
        let chained = match self.chain {
            ChainMode::Direct => 0,
            ChainMode::Transitive => self.record_chain(index, source, destination.id)?,
        };

        Ok(RecordOutcome::Recorded {
            source,
            added,
            chained,
        })
    }

    /// Walk from `source` up through its own references, recording each link
    /// and attaching `destination` to every ancestor. Stops at a commit
    /// without a resolvable reference or when the chain loops.
    fn record_chain(
        &self,
        index: &mut ReverseIndex,
        source: CommitId,
        destination: CommitId,
    ) -> StorageResult<usize> {
        let mut visited = vec![destination, source];
        let mut current = source;
        let mut added = 0;

        while let Some(info) = lookup_commit(self.repo, current)? {
            let origin = match self.source_of(&info.message)? {
                Some(Ok(origin)) if !visited.contains(&origin) => origin,
                _ => break,
            };

            added += usize::from(index.insert(origin, current));
            added += usize::from(index.insert(origin, destination));
            visited.push(origin);
            current = origin;
        }

        Ok(added)
    }
}
