//! Collectors and top-hit results.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::error::{HastaError, Result};
use crate::index::DocId;
use crate::index::reader::LeafReaderContext;
use crate::search::scorer::Scorer;

/// Receives every matching document of a search.
///
/// `set_next_reader` is called before the documents of each leaf; `collect`
/// then receives segment-local doc ids together with the scorer positioned on
/// that doc.
pub trait Collector: Send {
    /// Switch to the next leaf.
    fn set_next_reader(&mut self, context: &LeafReaderContext) -> Result<()>;

    /// Collect `doc` (segment-local); `scorer` is positioned on it.
    fn collect(&mut self, doc: DocId, scorer: &dyn Scorer) -> Result<()>;

    /// Whether docs may be delivered out of order within a leaf.
    fn accepts_docs_out_of_order(&self) -> bool;
}

impl<C: Collector + ?Sized> Collector for &mut C {
    fn set_next_reader(&mut self, context: &LeafReaderContext) -> Result<()> {
        (**self).set_next_reader(context)
    }

    fn collect(&mut self, doc: DocId, scorer: &dyn Scorer) -> Result<()> {
        (**self).collect(doc, scorer)
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        (**self).accepts_docs_out_of_order()
    }
}

/// A hit: top-level doc id and score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDoc {
    pub doc: DocId,
    pub score: f32,
    /// Index of the shard the hit came from after [`TopDocs::merge`], else -1.
    pub shard_index: i32,
}

impl ScoreDoc {
    pub fn new(doc: DocId, score: f32) -> Self {
        ScoreDoc {
            doc,
            score,
            shard_index: -1,
        }
    }
}

/// Result of a top-hits search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopDocs {
    /// Number of documents that matched, not just those returned.
    pub total_hits: i64,
    /// Hits in descending score order.
    pub score_docs: Vec<ScoreDoc>,
    max_score: f32,
}

impl TopDocs {
    pub fn new(total_hits: i64, score_docs: Vec<ScoreDoc>, max_score: f32) -> Self {
        TopDocs {
            total_hits,
            score_docs,
            max_score,
        }
    }

    /// No hits; the max score is NaN.
    pub fn empty() -> Self {
        Self::new(0, Vec::new(), f32::NAN)
    }

    /// Highest score seen, NaN when nothing matched.
    pub fn max_score(&self) -> f32 {
        self.max_score
    }

    /// Merge per-shard results into the top `n`.
    ///
    /// Hits are ordered by descending score, then by shard index, then by
    /// their rank within the shard. Each returned hit carries its shard index.
    pub fn merge(n: usize, shards: &[TopDocs]) -> TopDocs {
        let mut total_hits = 0;
        let mut max_score = f32::NEG_INFINITY;
        let mut available = false;
        let mut queue = BinaryHeap::new();

        for (shard_index, shard) in shards.iter().enumerate() {
            total_hits += shard.total_hits;
            if let Some(first) = shard.score_docs.first() {
                available = true;
                max_score = max_score.max(shard.max_score);
                queue.push(ShardCursor {
                    score: first.score,
                    shard_index,
                    hit_index: 0,
                });
            }
        }

        let mut score_docs = Vec::with_capacity(n.min(16));
        while score_docs.len() < n {
            let Some(cursor) = queue.pop() else {
                break;
            };
            let hits = &shards[cursor.shard_index].score_docs;
            let mut hit = hits[cursor.hit_index];
            hit.shard_index = cursor.shard_index as i32;
            score_docs.push(hit);

            let next = cursor.hit_index + 1;
            if let Some(following) = hits.get(next) {
                queue.push(ShardCursor {
                    score: following.score,
                    shard_index: cursor.shard_index,
                    hit_index: next,
                });
            }
        }

        TopDocs::new(
            total_hits,
            score_docs,
            if available { max_score } else { f32::NAN },
        )
    }
}

/// Head of one shard's hit list during a merge; the greatest cursor is the
/// best hit.
#[derive(Debug)]
struct ShardCursor {
    score: f32,
    shard_index: usize,
    hit_index: usize,
}

impl PartialEq for ShardCursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ShardCursor {}

impl PartialOrd for ShardCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ShardCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.shard_index.cmp(&self.shard_index))
            .then_with(|| other.hit_index.cmp(&self.hit_index))
    }
}

/// A hit in the collector's queue; the greatest entry is the weakest hit.
#[derive(Debug, Clone, Copy)]
struct QueuedHit {
    doc: DocId,
    score: f32,
}

impl PartialEq for QueuedHit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedHit {}

impl PartialOrd for QueuedHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedHit {
    fn cmp(&self, other: &Self) -> Ordering {
        // lower score is weaker; on equal scores the later doc is weaker
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.doc.cmp(&other.doc))
    }
}

/// Keeps the `n` best-scoring hits.
///
/// The in-order variant relies on docs arriving in increasing order, so a hit
/// whose score only ties the weakest queued hit is never competitive. The
/// out-of-order variant breaks ties explicitly by doc id.
#[derive(Debug)]
pub struct TopScoreDocCollector {
    num_hits: usize,
    queue: BinaryHeap<QueuedHit>,
    total_hits: i64,
    doc_base: DocId,
    in_order: bool,
}

impl TopScoreDocCollector {
    /// Collector for the top `num_hits` hits; `num_hits` must be positive.
    pub fn create(num_hits: usize, docs_scored_in_order: bool) -> Result<Self> {
        if num_hits == 0 {
            return Err(HastaError::invalid_argument("numHits must be > 0"));
        }
        Ok(TopScoreDocCollector {
            num_hits,
            queue: BinaryHeap::with_capacity(num_hits.min(1024)),
            total_hits: 0,
            doc_base: 0,
            in_order: docs_scored_in_order,
        })
    }

    /// Number of documents collected so far.
    pub fn total_hits(&self) -> i64 {
        self.total_hits
    }

    fn competitive(&self, hit: &QueuedHit) -> bool {
        let Some(weakest) = self.queue.peek() else {
            return true;
        };
        if self.queue.len() < self.num_hits {
            return true;
        }
        if self.in_order {
            hit.score > weakest.score
        } else {
            hit.score > weakest.score || (hit.score == weakest.score && hit.doc < weakest.doc)
        }
    }

    /// The collected hits, best first.
    pub fn top_docs(&self) -> TopDocs {
        let score_docs: Vec<ScoreDoc> = self
            .queue
            .clone()
            .into_sorted_vec()
            .into_iter()
            .map(|hit| ScoreDoc::new(hit.doc, hit.score))
            .collect();
        let max_score = score_docs.first().map_or(f32::NAN, |hit| hit.score);
        TopDocs::new(self.total_hits, score_docs, max_score)
    }
}

impl Collector for TopScoreDocCollector {
    fn set_next_reader(&mut self, context: &LeafReaderContext) -> Result<()> {
        self.doc_base = context.doc_base;
        Ok(())
    }

    fn collect(&mut self, doc: DocId, scorer: &dyn Scorer) -> Result<()> {
        let score = scorer.score();
        debug_assert!(!score.is_nan(), "scores must not be NaN");
        self.total_hits += 1;

        let hit = QueuedHit {
            doc: self.doc_base + doc,
            score,
        };
        if !self.competitive(&hit) {
            return Ok(());
        }
        if self.queue.len() == self.num_hits {
            self.queue.pop();
        }
        self.queue.push(hit);
        Ok(())
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        !self.in_order
    }
}

/// Counts matching documents without scoring them.
#[derive(Debug, Default)]
pub struct TotalHitCountCollector {
    total_hits: i64,
}

impl TotalHitCountCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_hits(&self) -> i64 {
        self.total_hits
    }
}

impl Collector for TotalHitCountCollector {
    fn set_next_reader(&mut self, _context: &LeafReaderContext) -> Result<()> {
        Ok(())
    }

    fn collect(&mut self, _doc: DocId, _scorer: &dyn Scorer) -> Result<()> {
        self.total_hits += 1;
        Ok(())
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        true
    }
}
