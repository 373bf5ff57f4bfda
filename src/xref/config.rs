//! Pass configuration.

use crate::storage::{ConflictPolicy, NotesRef, WalkOrder};
use crate::xref::error::ConfigError;
use crate::xref::recorder::ChainMode;

/// Trailer prefix git appends on `cherry-pick -x`.
pub const CHERRY_PICKED_PREFIX: &str = "(cherry picked from commit ";
/// Notes ref used by the cherry-pick preset.
pub const CHERRY_PICKS_NOTES_REF: &str = "refs/notes/xref-cherry-picks";
/// Tag used by the cherry-pick preset.
pub const CHERRY_PICKED_TO_TAG: &str = "Cherry-picked-to";

/// Named bundles of prefix, notes ref and tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// reverse `(cherry picked from commit ...)` into `Cherry-picked-to:` notes
    CherryPicks,
}

impl Preset {
    fn trailer_prefix(self) -> &'static str {
        match self {
            Preset::CherryPicks => CHERRY_PICKED_PREFIX,
        }
    }

    fn notes_ref(self) -> &'static str {
        match self {
            Preset::CherryPicks => CHERRY_PICKS_NOTES_REF,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Preset::CherryPicks => CHERRY_PICKED_TO_TAG,
        }
    }
}

/// What a pass does with each traversed commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassMode {
    /// collect edges from trailers starting with `prefix` and write notes
    Record {
        prefix: String,
        tag: Option<String>,
        chain: ChainMode,
    },
    /// remove the notes of every traversed commit
    Clear,
}

impl PassMode {
    pub fn name(&self) -> &'static str {
        match self {
            PassMode::Record { .. } => "record",
            PassMode::Clear => "clear",
        }
    }
}

/// Validated configuration of one pass.
#[derive(Debug, Clone)]
pub struct XrefConfig {
    pub mode: PassMode,
    pub notes_ref: NotesRef,
    /// behaviour when a source already has a note
    pub conflict: ConflictPolicy,
    /// report every commit's outcome
    pub verbose: bool,
    /// revision arguments; empty means HEAD
    pub revisions: Vec<String>,
    pub order: WalkOrder,
    /// follow only the first parent of merges
    pub first_parent: bool,
}

impl XrefConfig {
    pub fn builder() -> XrefConfigBuilder {
        XrefConfigBuilder::default()
    }

    /// record-mode configuration for `prefix` into `notes_ref`
    pub fn record(prefix: impl Into<String>, notes_ref: impl Into<String>) -> XrefConfigBuilder {
        Self::builder().trailer_prefix(prefix).notes_ref(notes_ref)
    }

    /// clear-mode configuration for `notes_ref`
    pub fn clear(notes_ref: impl Into<String>) -> XrefConfigBuilder {
        Self::builder().notes_ref(notes_ref).clear(true)
    }
}

/// Collects options, applies a preset and validates the combination.
///
/// Explicit options override the matching part of a preset.
#[derive(Debug, Clone, Default)]
pub struct XrefConfigBuilder {
    preset: Option<Preset>,
    trailer_prefix: Option<String>,
    notes_ref: Option<String>,
    tag: Option<String>,
    clear: bool,
    chain: ChainMode,
    conflict: ConflictPolicy,
    verbose: bool,
    revisions: Vec<String>,
    order: WalkOrder,
    first_parent: bool,
}

impl XrefConfigBuilder {
    pub fn preset(mut self, preset: Preset) -> Self {
        self.preset = Some(preset);
        self
    }

    pub fn trailer_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.trailer_prefix = Some(prefix.into());
        self
    }

    pub fn notes_ref(mut self, notes_ref: impl Into<String>) -> Self {
        self.notes_ref = Some(notes_ref.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn clear(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    pub fn chain(mut self, chain: ChainMode) -> Self {
        self.chain = chain;
        self
    }

    pub fn conflict(mut self, conflict: ConflictPolicy) -> Self {
        self.conflict = conflict;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revisions.push(revision.into());
        self
    }

    pub fn revisions<I, S>(mut self, revisions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.revisions.extend(revisions.into_iter().map(Into::into));
        self
    }

    pub fn order(mut self, order: WalkOrder) -> Self {
        self.order = order;
        self
    }

    pub fn first_parent(mut self, first_parent: bool) -> Self {
        self.first_parent = first_parent;
        self
    }

    pub fn build(self) -> Result<XrefConfig, ConfigError> {
        let preset = self.preset;
        let notes_ref = self
            .notes_ref
            .or_else(|| preset.map(|p| p.notes_ref().to_string()))
            .ok_or(ConfigError::MissingNotesRef)?;
        let notes_ref = NotesRef::new(notes_ref.clone())
            .map_err(|reason| ConfigError::InvalidNotesRef { name: notes_ref, reason })?;

        let mode = if self.clear {
            if self.chain != ChainMode::Direct {
                return Err(ConfigError::ConflictsWithClear("transitive"));
            }
            if self.conflict != ConflictPolicy::Fail {
                return Err(ConfigError::ConflictsWithClear("on-conflict"));
            }
            PassMode::Clear
        } else {
            let prefix = self
                .trailer_prefix
                .or_else(|| preset.map(|p| p.trailer_prefix().to_string()))
                .ok_or(ConfigError::MissingTrailerPrefix)?;
            if prefix.is_empty() {
                return Err(ConfigError::EmptyTrailerPrefix);
            }
            let tag = self
                .tag
                .or_else(|| preset.map(|p| p.tag().to_string()))
                .filter(|t| !t.is_empty());
            PassMode::Record {
                prefix,
                tag,
                chain: self.chain,
            }
        };

        Ok(XrefConfig {
            mode,
            notes_ref,
            conflict: self.conflict,
            verbose: self.verbose,
            revisions: self.revisions,
            order: self.order,
            first_parent: self.first_parent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cherry_pick_preset() {
        let config = XrefConfig::builder()
            .preset(Preset::CherryPicks)
            .build()
            .unwrap();

        assert_eq!(config.notes_ref.as_str(), CHERRY_PICKS_NOTES_REF);
        assert_eq!(
            config.mode,
            PassMode::Record {
                prefix: CHERRY_PICKED_PREFIX.to_string(),
                tag: Some(CHERRY_PICKED_TO_TAG.to_string()),
                chain: ChainMode::Direct,
            }
        );
    }

    #[test]
    fn test_explicit_options_override_preset() {
        let config = XrefConfig::builder()
            .preset(Preset::CherryPicks)
            .notes_ref("backports")
            .tag("Backported-to")
            .build()
            .unwrap();

        assert_eq!(config.notes_ref.as_str(), "refs/notes/backports");
        match config.mode {
            PassMode::Record { prefix, tag, .. } => {
                assert_eq!(prefix, CHERRY_PICKED_PREFIX);
                assert_eq!(tag.as_deref(), Some("Backported-to"));
            }
            PassMode::Clear => panic!("expected record mode"),
        }
    }

    #[test]
    fn test_missing_arguments() {
        let err = XrefConfig::builder().trailer_prefix("X: ").build().unwrap_err();
        assert_eq!(err, ConfigError::MissingNotesRef);

        let err = XrefConfig::builder().notes_ref("x").build().unwrap_err();
        assert_eq!(err, ConfigError::MissingTrailerPrefix);

        let err = XrefConfig::record("", "x").build().unwrap_err();
        assert_eq!(err, ConfigError::EmptyTrailerPrefix);

        let err = XrefConfig::record("X: ", "bad name").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNotesRef { .. }));
    }

    #[test]
    fn test_refname_rules_are_config_errors() {
        for name in ["bad@{x}", "a/.hidden", "trail."] {
            let err = XrefConfig::builder()
                .preset(Preset::CherryPicks)
                .notes_ref(name)
                .build()
                .unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidNotesRef { name: n, .. } if n == name),
                "{name}: {err:?}"
            );
        }
    }

    #[test]
    fn test_clear_needs_only_notes_ref() {
        let config = XrefConfig::clear("x").build().unwrap();
        assert_eq!(config.mode, PassMode::Clear);
        assert_eq!(config.mode.name(), "clear");

        let err = XrefConfig::clear("x").chain(ChainMode::Transitive).build().unwrap_err();
        assert_eq!(err, ConfigError::ConflictsWithClear("transitive"));

        let err = XrefConfig::clear("x").conflict(ConflictPolicy::Replace).build().unwrap_err();
        assert_eq!(err, ConfigError::ConflictsWithClear("on-conflict"));
    }

    #[test]
    fn test_empty_tag_means_untagged() {
        let config = XrefConfig::record("X: ", "x").tag("").build().unwrap();
        assert!(matches!(config.mode, PassMode::Record { tag: None, .. }));
    }
}
