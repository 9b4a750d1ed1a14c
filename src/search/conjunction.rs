//! Conjunction (AND) of scorers.

use crate::index::DocId;
use crate::search::doc_id_set::{DocIdSetIterator, NO_MORE_DOCS};
use crate::search::scorer::Scorer;

struct DocsAndFreqs {
    scorer: Box<dyn Scorer>,
    cost: i64,
    doc: DocId,
}

/// Matches documents on which every child scorer matches.
///
/// Children are ordered by ascending cost once, at construction; the
/// cheapest one leads and the others leapfrog to its candidates.
pub struct ConjunctionScorer {
    docs_and_freqs: Vec<DocsAndFreqs>,
    coord: f32,
}

impl ConjunctionScorer {
    /// Conjunction of `scorers` with the score sum multiplied by `coord`.
    pub fn new(scorers: Vec<Box<dyn Scorer>>, coord: f32) -> Self {
        debug_assert!(!scorers.is_empty(), "conjunction needs at least one scorer");
        let mut docs_and_freqs: Vec<DocsAndFreqs> = scorers
            .into_iter()
            .map(|scorer| DocsAndFreqs {
                cost: scorer.cost(),
                doc: scorer.doc_id(),
                scorer,
            })
            .collect();
        docs_and_freqs.sort_by_key(|entry| entry.cost);
        ConjunctionScorer {
            docs_and_freqs,
            coord,
        }
    }

    fn do_next(&mut self, mut doc: DocId) -> DocId {
        'advance_head: loop {
            if doc == NO_MORE_DOCS {
                return doc;
            }
            let (lead, others) = self.docs_and_freqs.split_at_mut(1);
            let lead = &mut lead[0];
            for other in others.iter_mut() {
                if other.doc < doc {
                    other.doc = other.scorer.advance(doc);
                }
                if other.doc > doc {
                    // Overshoot: the lead jumps ahead and the sweep restarts.
                    lead.doc = lead.scorer.advance(other.doc);
                    doc = lead.doc;
                    continue 'advance_head;
                }
            }
            return doc;
        }
    }
}

impl DocIdSetIterator for ConjunctionScorer {
    fn doc_id(&self) -> DocId {
        self.docs_and_freqs[0].doc
    }

    fn next_doc(&mut self) -> DocId {
        let lead = &mut self.docs_and_freqs[0];
        lead.doc = lead.scorer.next_doc();
        let doc = lead.doc;
        self.do_next(doc)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        let lead = &mut self.docs_and_freqs[0];
        lead.doc = lead.scorer.advance(target);
        let doc = lead.doc;
        self.do_next(doc)
    }

    fn cost(&self) -> i64 {
        self.docs_and_freqs[0].cost
    }
}

impl Scorer for ConjunctionScorer {
    fn score(&self) -> f32 {
        let sum: f64 = self
            .docs_and_freqs
            .iter()
            .map(|entry| f64::from(entry.scorer.score()))
            .sum();
        (sum * f64::from(self.coord)) as f32
    }

    fn freq(&self) -> i32 {
        self.docs_and_freqs.len() as i32
    }
}
