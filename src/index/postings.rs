//! Postings cursors.

use crate::search::doc_id_set::DocIdSetIterator;

/// What a postings cursor must be able to report beyond doc ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PostingsFlags {
    /// Doc ids only; `freq()` may report 1.
    DocsOnly,
    /// Doc ids and term frequencies.
    Freqs,
    /// Doc ids, frequencies and positions.
    Positions,
}

/// A cursor over the documents containing one term.
///
/// `freq()` and `next_position()` are only valid while positioned on a
/// document; `next_position()` may be called at most `freq()` times per
/// document and returns positions in increasing order.
pub trait PostingsEnum: DocIdSetIterator {
    /// Number of occurrences of the term in the current document.
    fn freq(&self) -> i32;

    /// The next position of the term in the current document.
    fn next_position(&mut self) -> i32;
}
