//! Window-at-a-time scoring of pure disjunctions.
//!
//! [`BucketScorer`] scores optional clauses (and filters out prohibited ones)
//! one window of [`WINDOW_SIZE`] documents at a time. Every child pours its
//! matches for the window into a bucket table indexed by `doc & MASK`; the
//! filled buckets are then handed to the collector in the order they were
//! last touched, which is not doc id order. Only collectors that accept docs
//! out of order can be driven this way.

use crate::error::{HastaError, Result};
use crate::index::DocId;
use crate::search::collector::Collector;
use crate::search::doc_id_set::NO_MORE_DOCS;
use crate::search::scorer::{BulkScorer, HitScorer, Scorer};

pub const WINDOW_SIZE: usize = 2048;
const MASK: DocId = (WINDOW_SIZE - 1) as DocId;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    doc: DocId,
    score: f64,
    coord: usize,
    prohibited: bool,
}

impl Default for Bucket {
    fn default() -> Self {
        Bucket {
            doc: -1,
            score: 0.0,
            coord: 0,
            prohibited: false,
        }
    }
}

struct Clause {
    scorer: Box<dyn Scorer>,
    prohibited: bool,
}

/// Bulk scorer for boolean queries without required clauses.
pub struct BucketScorer {
    clauses: Vec<Clause>,
    buckets: Vec<Bucket>,
    /// Buckets filled in the current window, most recent last.
    valid: Vec<usize>,
    coord: Vec<f32>,
    min_nr_should_match: usize,
    /// Exclusive upper bound of the current window.
    end: DocId,
}

impl BucketScorer {
    /// `coord[n]` is the factor for `n` matching optional clauses, so it
    /// needs at least `optional.len() + 1` entries.
    pub fn new(
        optional: Vec<Box<dyn Scorer>>,
        prohibited: Vec<Box<dyn Scorer>>,
        coord: Vec<f32>,
        min_nr_should_match: usize,
    ) -> Result<Self> {
        if optional.is_empty() {
            return Err(HastaError::invalid_argument(
                "BucketScorer needs at least one optional clause",
            ));
        }
        if coord.len() <= optional.len() {
            return Err(HastaError::invalid_argument(format!(
                "coord table has {} entries, expected at least {}",
                coord.len(),
                optional.len() + 1
            )));
        }

        let clauses = optional
            .into_iter()
            .map(|scorer| Clause {
                scorer,
                prohibited: false,
            })
            .chain(prohibited.into_iter().map(|scorer| Clause {
                scorer,
                prohibited: true,
            }))
            .map(|mut clause| {
                clause.scorer.next_doc();
                clause
            })
            .collect();

        Ok(BucketScorer {
            clauses,
            buckets: vec![Bucket::default(); WINDOW_SIZE],
            valid: Vec::new(),
            coord,
            min_nr_should_match: min_nr_should_match.max(1),
            end: 0,
        })
    }

    /// Pour every child's matches below `self.end` into the bucket table.
    fn fill_window(&mut self) {
        let start = self.end.saturating_sub(WINDOW_SIZE as DocId);
        for clause in &mut self.clauses {
            let mut doc = clause.scorer.doc_id();
            if doc < start {
                // windows without optional matches were skipped
                doc = clause.scorer.advance(start);
            }
            while doc < self.end {
                let index = (doc & MASK) as usize;
                let bucket = &mut self.buckets[index];
                if bucket.doc != doc {
                    *bucket = Bucket {
                        doc,
                        ..Bucket::default()
                    };
                    self.valid.push(index);
                }
                if clause.prohibited {
                    bucket.prohibited = true;
                } else {
                    bucket.score += f64::from(clause.scorer.score());
                    bucket.coord += 1;
                }
                doc = clause.scorer.next_doc();
            }
        }
    }

    /// Smallest doc any optional clause is positioned on.
    fn next_optional_doc(&self) -> DocId {
        self.clauses
            .iter()
            .filter(|clause| !clause.prohibited)
            .map(|clause| clause.scorer.doc_id())
            .min()
            .unwrap_or(NO_MORE_DOCS)
    }
}

impl BulkScorer for BucketScorer {
    fn score(&mut self, collector: &mut dyn Collector) -> Result<()> {
        loop {
            let next = self.next_optional_doc();
            if next == NO_MORE_DOCS {
                return Ok(());
            }
            // skip straight to the window holding the next optional match
            self.end = (next & !MASK).saturating_add(WINDOW_SIZE as DocId);
            self.fill_window();

            while let Some(index) = self.valid.pop() {
                let bucket = self.buckets[index];
                if bucket.prohibited || bucket.coord < self.min_nr_should_match {
                    continue;
                }
                let score = (bucket.score * f64::from(self.coord[bucket.coord])) as f32;
                let hit = HitScorer::new(bucket.doc, score, bucket.coord as i32);
                collector.collect(bucket.doc, &hit)?;
            }
        }
    }
}
