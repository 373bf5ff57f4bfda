//! gitxref - reverse trailer cross-references as git notes
//!
//! Commit messages often point back at the commit they came from, e.g.
//! `git cherry-pick -x` appends `(cherry picked from commit <id>)`. This
//! crate walks a revision range, collects those pointers and writes the
//! inverse relation as notes on the referenced commits, so
//! `git log --notes=xref-cherry-picks` on the original shows where it was
//! picked to. History itself is never rewritten.
//!
//! # Example
//!
//! ```no_run
//! use gitxref::storage::GitRepository;
//! use gitxref::xref::{Preset, XrefConfig, XrefPass};
//!
//! let repo = GitRepository::discover(".").unwrap();
//! let config = XrefConfig::builder().preset(Preset::CherryPicks).build().unwrap();
//! let report = XrefPass::new(config).run(&repo).unwrap();
//! println!("{}", report);
//! ```

pub mod storage;
pub mod trailer;
pub mod xref;
