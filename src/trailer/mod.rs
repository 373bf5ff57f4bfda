//! Trailer extraction from commit messages.
//!
//! The xref layer only needs the raw trailer lines of a message, in the order
//! they appear. [`TrailerParser`] is that seam; [`TrailerBlock`] is the
//! default implementation, which recognises the trailing `key: value`
//! paragraph the way `git interpret-trailers` does for the common cases.

mod block;

pub use block::TrailerBlock;

/// Produces the trailer lines of a commit message.
pub trait TrailerParser {
    /// trailer lines, first to last, each `<label><value>` with folded
    /// continuation lines joined by a single space
    fn trailers(&self, message: &str) -> Vec<String>;
}

impl<T: TrailerParser + ?Sized> TrailerParser for &T {
    fn trailers(&self, message: &str) -> Vec<String> {
        (**self).trailers(message)
    }
}
