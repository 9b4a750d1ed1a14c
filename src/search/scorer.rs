//! Scorers: document cursors that also produce a score.

use crate::error::Result;
use crate::index::DocId;
use crate::index::postings::PostingsEnum;
use crate::search::collector::Collector;
use crate::search::doc_id_set::{DocIdSetIterator, NO_MORE_DOCS};
use crate::search::similarity::SimScorer;

/// A [`DocIdSetIterator`] that scores the document it is positioned on.
///
/// `score` and `freq` are only meaningful while positioned on a real
/// document, i.e. not before the first move and not after exhaustion.
pub trait Scorer: DocIdSetIterator {
    /// Score of the current document.
    fn score(&self) -> f32;

    /// Number of matching occurrences (or clauses) in the current document.
    fn freq(&self) -> i32;
}

impl<T: Scorer + ?Sized> Scorer for Box<T> {
    fn score(&self) -> f32 {
        (**self).score()
    }

    fn freq(&self) -> i32 {
        (**self).freq()
    }
}

/// Scores the postings of a single term.
pub struct TermScorer {
    postings: Box<dyn PostingsEnum>,
    doc_scorer: Box<dyn SimScorer>,
}

impl TermScorer {
    pub fn new(postings: Box<dyn PostingsEnum>, doc_scorer: Box<dyn SimScorer>) -> Self {
        TermScorer {
            postings,
            doc_scorer,
        }
    }
}

impl std::fmt::Debug for TermScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermScorer")
            .field("doc", &self.postings.doc_id())
            .field("doc_scorer", &self.doc_scorer)
            .finish()
    }
}

impl DocIdSetIterator for TermScorer {
    fn doc_id(&self) -> DocId {
        self.postings.doc_id()
    }

    fn next_doc(&mut self) -> DocId {
        self.postings.next_doc()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        self.postings.advance(target)
    }

    fn cost(&self) -> i64 {
        self.postings.cost()
    }
}

impl Scorer for TermScorer {
    fn score(&self) -> f32 {
        self.doc_scorer
            .score(self.postings.doc_id(), self.postings.freq() as f32)
    }

    fn freq(&self) -> i32 {
        self.postings.freq()
    }
}

/// Gives every document of a cursor the same score.
pub struct ConstantScorer {
    iter: Box<dyn DocIdSetIterator>,
    score: f32,
}

impl ConstantScorer {
    pub fn new(iter: Box<dyn DocIdSetIterator>, score: f32) -> Self {
        ConstantScorer { iter, score }
    }
}

impl DocIdSetIterator for ConstantScorer {
    fn doc_id(&self) -> DocId {
        self.iter.doc_id()
    }

    fn next_doc(&mut self) -> DocId {
        self.iter.next_doc()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        self.iter.advance(target)
    }

    fn cost(&self) -> i64 {
        self.iter.cost()
    }
}

impl Scorer for ConstantScorer {
    fn score(&self) -> f32 {
        self.score
    }

    fn freq(&self) -> i32 {
        1
    }
}

/// Multiplies the score of a single clause by a fixed coordination factor.
pub struct ScaledScorer {
    inner: Box<dyn Scorer>,
    factor: f32,
}

impl ScaledScorer {
    /// Wrap `inner`, returning it unchanged when `factor` is 1.
    pub fn wrap(inner: Box<dyn Scorer>, factor: f32) -> Box<dyn Scorer> {
        if factor == 1.0 {
            inner
        } else {
            Box::new(ScaledScorer { inner, factor })
        }
    }
}

impl DocIdSetIterator for ScaledScorer {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    fn next_doc(&mut self) -> DocId {
        self.inner.next_doc()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        self.inner.advance(target)
    }

    fn cost(&self) -> i64 {
        self.inner.cost()
    }
}

impl Scorer for ScaledScorer {
    fn score(&self) -> f32 {
        self.inner.score() * self.factor
    }

    fn freq(&self) -> i32 {
        self.inner.freq()
    }
}

/// Scores a whole leaf at once, pushing every match into a collector.
///
/// The collector has already been switched to the leaf. Docs arrive in
/// increasing order unless the bulk scorer was requested for an out-of-order
/// collector.
pub trait BulkScorer: Send {
    fn score(&mut self, collector: &mut dyn Collector) -> Result<()>;
}

/// Drains a [`Scorer`] in doc id order.
pub struct DefaultBulkScorer {
    scorer: Box<dyn Scorer>,
}

impl DefaultBulkScorer {
    pub fn new(scorer: Box<dyn Scorer>) -> Self {
        DefaultBulkScorer { scorer }
    }
}

impl BulkScorer for DefaultBulkScorer {
    fn score(&mut self, collector: &mut dyn Collector) -> Result<()> {
        let mut doc = self.scorer.next_doc();
        while doc != NO_MORE_DOCS {
            collector.collect(doc, self.scorer.as_ref())?;
            doc = self.scorer.next_doc();
        }
        Ok(())
    }
}

/// A scorer standing on one already-scored hit, handed to collectors by
/// bulk scorers that do not iterate a [`Scorer`] themselves.
#[derive(Debug, Clone, Copy)]
pub struct HitScorer {
    doc: DocId,
    score: f32,
    freq: i32,
}

impl HitScorer {
    pub fn new(doc: DocId, score: f32, freq: i32) -> Self {
        HitScorer { doc, score, freq }
    }
}

impl DocIdSetIterator for HitScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        self.doc = NO_MORE_DOCS;
        self.doc
    }

    fn advance(&mut self, _target: DocId) -> DocId {
        self.next_doc()
    }

    fn cost(&self) -> i64 {
        1
    }
}

impl Scorer for HitScorer {
    fn score(&self) -> f32 {
        self.score
    }

    fn freq(&self) -> i32 {
        self.freq
    }
}
