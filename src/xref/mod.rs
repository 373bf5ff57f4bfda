//! Reverse trailer cross-references.
//!
//! A trailer such as `(cherry picked from commit <id>)` points from a
//! destination commit back to its source. This module inverts those
//! pointers: every source gets a note listing the commits that reference it.
//!
//! # Architecture
//!
//! ```text
//!  RevisionWalk ──▶ Recorder ──▶ ReverseIndex ──▶ NoteWriter ──▶ NotesStore
//!       │              │
//!       │        TrailerResolver
//!       │
//!       └────────▶ NoteClearer ───────────────────────────────▶ NotesStore
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use gitxref::storage::GitRepository;
//! use gitxref::xref::{Preset, XrefConfig, XrefPass};
//!
//! let repo = GitRepository::discover(".")?;
//! let config = XrefConfig::builder()
//!     .preset(Preset::CherryPicks)
//!     .revision("v1.0..main")
//!     .build()?;
//! let report = XrefPass::new(config).run(&repo)?;
//! println!("{}", report);
//! ```

mod clearer;
mod config;
mod error;
mod index;
mod pass;
mod recorder;
mod resolver;
mod writer;

pub use clearer::{ClearOutcome, NoteClearer};
pub use config::{
    PassMode, Preset, XrefConfig, XrefConfigBuilder, CHERRY_PICKED_PREFIX, CHERRY_PICKED_TO_TAG,
    CHERRY_PICKS_NOTES_REF,
};
pub use error::{ConfigError, XrefError, XrefResult};
pub use index::{Iter, ReverseIndex};
pub use pass::{PassPhase, PassReport, XrefPass, NOTES_COMMIT_MESSAGE};
pub use recorder::{ChainMode, RecordOutcome, Recorder};
pub use resolver::{TrailerResolver, Unresolved};
pub use writer::NoteWriter;
