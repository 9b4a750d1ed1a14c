//! Disjunction (OR) of scorers over a binary min-heap.

use crate::error::{HastaError, Result};
use crate::index::DocId;
use crate::search::doc_id_set::{DocIdSetIterator, NO_MORE_DOCS};
use crate::search::scorer::Scorer;

/// Matches documents on which at least `minimum_nr_matchers` children match,
/// scoring them by the sum of the matching children's scores times
/// `coord[nr_matchers]`.
///
/// Live children are kept in an array-backed min-heap ordered by their
/// current doc; exhausted children are removed.
pub struct DisjunctionSumScorer {
    sub_scorers: Vec<Box<dyn Scorer>>,
    coord: Vec<f32>,
    minimum_nr_matchers: usize,
    cost: i64,
    doc: DocId,
    nr_matchers: i32,
    score: f64,
    pending: Vec<usize>,
}

impl DisjunctionSumScorer {
    /// Disjunction of at least two scorers; `coord` is indexed by the number
    /// of matching children and needs `sub_scorers.len() + 1` entries.
    pub fn new(sub_scorers: Vec<Box<dyn Scorer>>, coord: Vec<f32>) -> Result<Self> {
        Self::with_minimum_matchers(sub_scorers, coord, 1)
    }

    /// Like [`DisjunctionSumScorer::new`], matching only documents on which at
    /// least `minimum_nr_matchers` children match.
    pub fn with_minimum_matchers(
        sub_scorers: Vec<Box<dyn Scorer>>,
        coord: Vec<f32>,
        minimum_nr_matchers: usize,
    ) -> Result<Self> {
        if sub_scorers.len() < 2 {
            return Err(HastaError::invalid_argument(format!(
                "disjunction needs at least 2 sub scorers, got {}",
                sub_scorers.len()
            )));
        }
        if coord.len() <= sub_scorers.len() {
            return Err(HastaError::invalid_argument(format!(
                "coord table has {} entries for {} sub scorers",
                coord.len(),
                sub_scorers.len()
            )));
        }
        if minimum_nr_matchers == 0 || minimum_nr_matchers > sub_scorers.len() {
            return Err(HastaError::invalid_argument(format!(
                "minimum_nr_matchers must be within 1..={}, got {minimum_nr_matchers}",
                sub_scorers.len()
            )));
        }

        let cost = sub_scorers.iter().map(|scorer| scorer.cost()).sum();
        let mut scorer = DisjunctionSumScorer {
            sub_scorers,
            coord,
            minimum_nr_matchers,
            cost,
            doc: -1,
            nr_matchers: 0,
            score: 0.0,
            pending: Vec::new(),
        };
        scorer.heapify();
        Ok(scorer)
    }

    fn heapify(&mut self) {
        for i in (0..self.sub_scorers.len() / 2).rev() {
            self.heap_adjust(i);
        }
    }

    /// Sift the scorer at `root` down until both children are not smaller.
    fn heap_adjust(&mut self, root: usize) {
        let len = self.sub_scorers.len();
        let mut i = root;
        loop {
            let left = 2 * i + 1;
            if left >= len {
                return;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && self.sub_scorers[right].doc_id() < self.sub_scorers[left].doc_id() {
                smallest = right;
            }
            if self.sub_scorers[smallest].doc_id() < self.sub_scorers[i].doc_id() {
                self.sub_scorers.swap(i, smallest);
                i = smallest;
            } else {
                return;
            }
        }
    }

    /// Drop the exhausted root: move the last scorer into its slot and sift it down.
    fn heap_remove_root(&mut self) {
        self.sub_scorers.swap_remove(0);
        if !self.sub_scorers.is_empty() {
            self.heap_adjust(0);
        }
    }

    /// Count and sum every heap entry sitting on the root's doc.
    fn after_next(&mut self) {
        let doc = self.sub_scorers[0].doc_id();
        self.doc = doc;
        self.nr_matchers = 0;
        self.score = 0.0;
        if doc == NO_MORE_DOCS {
            return;
        }

        // Entries on `doc` form a subtree hanging from the root.
        self.pending.clear();
        self.pending.push(0);
        while let Some(i) = self.pending.pop() {
            if i < self.sub_scorers.len() && self.sub_scorers[i].doc_id() == doc {
                self.nr_matchers += 1;
                self.score += f64::from(self.sub_scorers[i].score());
                self.pending.push(2 * i + 1);
                self.pending.push(2 * i + 2);
            }
        }
    }

    fn exhaust(&mut self) -> DocId {
        self.doc = NO_MORE_DOCS;
        self.nr_matchers = 0;
        self.doc
    }

    #[cfg(test)]
    fn heap_is_valid(&self) -> bool {
        (1..self.sub_scorers.len())
            .all(|i| self.sub_scorers[(i - 1) / 2].doc_id() <= self.sub_scorers[i].doc_id())
    }

    #[cfg(test)]
    fn num_scorers(&self) -> usize {
        self.sub_scorers.len()
    }
}

impl DocIdSetIterator for DisjunctionSumScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        if self.doc == NO_MORE_DOCS || self.sub_scorers.is_empty() {
            return self.exhaust();
        }
        loop {
            if self.sub_scorers[0].next_doc() != NO_MORE_DOCS {
                self.heap_adjust(0);
            } else {
                self.heap_remove_root();
                if self.sub_scorers.len() < self.minimum_nr_matchers {
                    return self.exhaust();
                }
            }
            if self.sub_scorers[0].doc_id() != self.doc {
                self.after_next();
                if self.nr_matchers as usize >= self.minimum_nr_matchers {
                    return self.doc;
                }
            }
        }
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if self.doc == NO_MORE_DOCS || self.sub_scorers.is_empty() {
            return self.exhaust();
        }
        while self.sub_scorers[0].doc_id() < target {
            if self.sub_scorers[0].advance(target) != NO_MORE_DOCS {
                self.heap_adjust(0);
            } else {
                self.heap_remove_root();
                if self.sub_scorers.len() < self.minimum_nr_matchers {
                    return self.exhaust();
                }
            }
        }
        self.after_next();
        if self.nr_matchers as usize >= self.minimum_nr_matchers {
            self.doc
        } else {
            self.next_doc()
        }
    }

    fn cost(&self) -> i64 {
        self.cost
    }
}

impl Scorer for DisjunctionSumScorer {
    fn score(&self) -> f32 {
        (self.score * f64::from(self.coord[self.nr_matchers as usize])) as f32
    }

    fn freq(&self) -> i32 {
        self.nr_matchers
    }
}
