//! Rendering and writing xref notes.

use tracing::debug;

use crate::storage::{BindOutcome, CommitId, ConflictPolicy, NotesStore, StorageResult};

/// Renders the destinations of one source into a note and stores it.
#[derive(Debug, Clone)]
pub struct NoteWriter {
    label: String,
    tag: Option<String>,
    conflict: ConflictPolicy,
}

impl NoteWriter {
    /// `label` is the trailer prefix; `tag` names the per-destination lines.
    pub fn new(label: impl Into<String>, tag: Option<String>) -> Self {
        Self {
            label: label.into(),
            tag: tag.filter(|t| !t.is_empty()),
            conflict: ConflictPolicy::Fail,
        }
    }

    pub fn conflict_policy(mut self, conflict: ConflictPolicy) -> Self {
        self.conflict = conflict;
        self
    }

    /// One newline-terminated line per destination, in order.
    ///
    /// With a tag each line is `<tag>: <destination>`. Without one every line
    /// is the bare label, repeated once per destination; older notes were
    /// written that way and readers count those lines.
    pub fn render(&self, destinations: &[CommitId]) -> String {
        let mut note = String::new();
        for destination in destinations {
            match &self.tag {
                Some(tag) => {
                    note.push_str(tag);
                    note.push_str(": ");
                    note.push_str(&destination.to_hex());
                }
                None => note.push_str(&self.label),
            }
            note.push('\n');
        }
        note
    }

    /// Render the note for `source` and bind it in `store`.
    pub fn write<S: NotesStore + ?Sized>(
        &self,
        store: &mut S,
        source: CommitId,
        destinations: &[CommitId],
    ) -> StorageResult<BindOutcome> {
        for destination in destinations {
            debug!(from = %source, to = %destination, "adding note");
        }

        let note = self.render(destinations);
        let blob = store.put(note.as_bytes())?;
        store.bind(source, blob, self.conflict)
    }
}
