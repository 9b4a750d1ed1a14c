//! Required scorer with optional scorers adding to its score.

use crate::index::DocId;
use crate::search::doc_id_set::{DocIdSetIterator, NO_MORE_DOCS};
use crate::search::scorer::Scorer;

/// How optional clauses take part in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalMode {
    /// Optional clauses only add to the score.
    Scoring,
    /// The optional scorer must match too (a minimum-should-match disjunction).
    Required,
}

/// Matches the documents of a required scorer; an optional scorer positioned
/// on the same document adds its score and matching-clause count.
///
/// The combined score is `(req + opt) * coord[req_clauses + opt_freq]`.
pub struct ReqOptSumScorer {
    req: Box<dyn Scorer>,
    opt: Option<Box<dyn Scorer>>,
    coord: Vec<f32>,
    required_clauses: i32,
    opt_is_single: bool,
    mode: OptionalMode,
    doc: DocId,
}

impl ReqOptSumScorer {
    /// `opt_is_single` marks an optional scorer that is one clause rather than
    /// a disjunction, so its freq is not a clause count.
    pub fn new(
        req: Box<dyn Scorer>,
        opt: Box<dyn Scorer>,
        coord: Vec<f32>,
        required_clauses: usize,
        opt_is_single: bool,
        mode: OptionalMode,
    ) -> Self {
        ReqOptSumScorer {
            req,
            opt: Some(opt),
            coord,
            required_clauses: required_clauses as i32,
            opt_is_single,
            mode,
            doc: -1,
        }
    }

    fn optional_on(&self, doc: DocId) -> Option<&dyn Scorer> {
        self.opt
            .as_deref()
            .filter(|opt| doc != NO_MORE_DOCS && opt.doc_id() == doc)
    }

    /// Bring the optional scorer up to the required doc.
    fn align_optional(&mut self) {
        let doc = self.req.doc_id();
        if doc == NO_MORE_DOCS {
            return;
        }
        if let Some(opt) = self.opt.as_mut() {
            if opt.doc_id() < doc && opt.advance(doc) == NO_MORE_DOCS {
                self.opt = None;
            }
        }
    }

    /// Leapfrog both scorers until they agree, for [`OptionalMode::Required`].
    fn align_both(&mut self, mut doc: DocId) -> DocId {
        let Some(opt) = self.opt.as_mut() else {
            return NO_MORE_DOCS;
        };
        loop {
            if doc == NO_MORE_DOCS {
                return doc;
            }
            let mut opt_doc = opt.doc_id();
            if opt_doc < doc {
                opt_doc = opt.advance(doc);
            }
            if opt_doc == doc {
                return doc;
            }
            if opt_doc == NO_MORE_DOCS {
                return NO_MORE_DOCS;
            }
            doc = self.req.advance(opt_doc);
        }
    }

    fn settle(&mut self, doc: DocId) -> DocId {
        self.doc = match self.mode {
            OptionalMode::Scoring => {
                self.align_optional();
                doc
            }
            OptionalMode::Required => self.align_both(doc),
        };
        self.doc
    }
}

impl DocIdSetIterator for ReqOptSumScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        let doc = self.req.next_doc();
        self.settle(doc)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        let doc = self.req.advance(target);
        self.settle(doc)
    }

    fn cost(&self) -> i64 {
        self.req.cost()
    }
}

impl Scorer for ReqOptSumScorer {
    fn score(&self) -> f32 {
        let mut sum = f64::from(self.req.score());
        let mut matched = self.required_clauses;
        if let Some(opt) = self.optional_on(self.doc) {
            sum += f64::from(opt.score());
            matched += if self.opt_is_single { 1 } else { opt.freq() };
        }
        let coord = self.coord.get(matched as usize).copied().unwrap_or(1.0);
        (sum * f64::from(coord)) as f32
    }

    fn freq(&self) -> i32 {
        match self.optional_on(self.doc) {
            Some(opt) => self.req.freq() + opt.freq(),
            None => self.req.freq(),
        }
    }
}
