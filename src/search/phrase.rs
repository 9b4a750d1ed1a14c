//! Positional phrase matching.
//!
//! [`exact::ExactPhraseScorer`] counts exact adjacency matches with a chunked
//! position bitmap; [`sloppy::SloppyPhraseScorer`] allows up to `slop`
//! position moves and weights each match by the similarity's slop factor.

pub mod exact;
pub mod sloppy;

use std::cmp::Ordering;

use crate::index::postings::PostingsEnum;
use crate::index::{DocId, Term};
use crate::search::doc_id_set::NO_MORE_DOCS;

/// Postings of one phrase term together with its place in the phrase.
pub struct PostingsAndFreq {
    /// Positional postings of the term.
    pub postings: Box<dyn PostingsEnum>,
    /// Document frequency of the term in the segment.
    pub doc_freq: i32,
    /// Position of the term within the phrase.
    pub position: i32,
    /// The term.
    pub term: Term,
}

impl PostingsAndFreq {
    pub fn new(postings: Box<dyn PostingsEnum>, doc_freq: i32, position: i32, term: Term) -> Self {
        PostingsAndFreq {
            postings,
            doc_freq,
            position,
            term,
        }
    }

    /// Order for the exact scorer: rarest first, then by phrase position, then by term.
    pub fn rarest_first(a: &PostingsAndFreq, b: &PostingsAndFreq) -> Ordering {
        a.doc_freq
            .cmp(&b.doc_freq)
            .then(a.position.cmp(&b.position))
            .then_with(|| a.term.cmp(&b.term))
    }
}

/// Cursor state of one phrase term inside a sloppy phrase scorer.
pub(crate) struct PhrasePositions {
    postings: Box<dyn PostingsEnum>,
    /// Current document.
    pub doc: DocId,
    /// Current position minus `offset`.
    pub position: i32,
    count: i32,
    /// Position of the term within the phrase.
    pub offset: i32,
    /// Index of the term within the phrase's term list.
    pub ord: usize,
    pub term: Term,
    /// Repeat group, when the term occurs more than once in the phrase.
    pub rpt_group: Option<usize>,
    /// Index within the repeat group, ordered by offset.
    pub rpt_ind: usize,
}

impl PhrasePositions {
    pub fn new(postings: Box<dyn PostingsEnum>, offset: i32, ord: usize, term: Term) -> Self {
        PhrasePositions {
            postings,
            doc: -1,
            position: 0,
            count: 0,
            offset,
            ord,
            term,
            rpt_group: None,
            rpt_ind: 0,
        }
    }

    /// Advance to the first doc `>= target`; false once exhausted.
    pub fn skip_to(&mut self, target: DocId) -> bool {
        self.doc = self.postings.advance(target);
        self.doc != NO_MORE_DOCS
    }

    /// Reset position state for the current doc and read the first position.
    pub fn first_position(&mut self) {
        self.count = self.postings.freq();
        self.next_position();
    }

    /// Read the next position of the current doc; false when none are left.
    pub fn next_position(&mut self) -> bool {
        if self.count > 0 {
            self.count -= 1;
            self.position = self.postings.next_position() - self.offset;
            true
        } else {
            false
        }
    }

    /// Position in the document, undoing the phrase offset.
    pub fn text_position(&self) -> i32 {
        self.position + self.offset
    }

    pub fn cost(&self) -> i64 {
        self.postings.cost()
    }
}
