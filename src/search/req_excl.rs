//! Required scorer minus an exclusion cursor.

use crate::index::DocId;
use crate::search::doc_id_set::{DocIdSetIterator, NO_MORE_DOCS};
use crate::search::scorer::Scorer;

/// Matches the documents of a required scorer that an excluded scorer does
/// not match. Scores come from the required scorer only.
pub struct ReqExclScorer {
    req: Box<dyn Scorer>,
    excl: Option<Box<dyn Scorer>>,
    doc: DocId,
}

impl ReqExclScorer {
    pub fn new(req: Box<dyn Scorer>, excl: Box<dyn Scorer>) -> Self {
        ReqExclScorer {
            req,
            excl: Some(excl),
            doc: -1,
        }
    }

    /// From the required scorer's current doc, find the first doc not excluded.
    fn to_non_excluded(&mut self) -> DocId {
        let Some(excl) = self.excl.as_mut() else {
            return self.req.doc_id();
        };
        let mut excl_doc = excl.doc_id();
        let mut req_doc = self.req.doc_id();
        loop {
            if req_doc < excl_doc {
                return req_doc;
            }
            if req_doc > excl_doc {
                excl_doc = excl.advance(req_doc);
                if excl_doc == NO_MORE_DOCS {
                    self.excl = None;
                    return req_doc;
                }
                if excl_doc > req_doc {
                    return req_doc;
                }
            }
            req_doc = self.req.next_doc();
            if req_doc == NO_MORE_DOCS {
                return NO_MORE_DOCS;
            }
        }
    }
}

impl DocIdSetIterator for ReqExclScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        if self.req.next_doc() == NO_MORE_DOCS {
            self.doc = NO_MORE_DOCS;
            return self.doc;
        }
        self.doc = self.to_non_excluded();
        self.doc
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if self.req.advance(target) == NO_MORE_DOCS {
            self.doc = NO_MORE_DOCS;
            return self.doc;
        }
        self.doc = self.to_non_excluded();
        self.doc
    }

    fn cost(&self) -> i64 {
        self.req.cost()
    }
}

impl Scorer for ReqExclScorer {
    fn score(&self) -> f32 {
        self.req.score()
    }

    fn freq(&self) -> i32 {
        self.req.freq()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::test_support::{VecScorer, drain};

    #[test]
    fn test_exclusion() {
        let mut scorer = ReqExclScorer::new(
            VecScorer::boxed(&[1, 2, 3, 5, 8, 13]),
            VecScorer::boxed(&[2, 3, 4, 13]),
        );
        assert_eq!(drain(&mut scorer), vec![1, 5, 8]);
    }

    #[test]
    fn test_exclusion_exhausts_first() {
        let mut scorer = ReqExclScorer::new(
            VecScorer::boxed(&[1, 2, 30, 40]),
            VecScorer::boxed(&[2]),
        );
        assert_eq!(scorer.advance(2), 30);
        assert_eq!(scorer.next_doc(), 40);
        assert_eq!(scorer.next_doc(), NO_MORE_DOCS);
    }

    #[test]
    fn test_everything_excluded() {
        let mut scorer = ReqExclScorer::new(VecScorer::boxed(&[4, 6]), VecScorer::boxed(&[4, 6]));
        assert_eq!(scorer.next_doc(), NO_MORE_DOCS);
    }
}
