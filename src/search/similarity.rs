//! Pluggable relevance scoring.
//!
//! The query core never evaluates a scoring formula itself. A [`Similarity`]
//! turns collection and term statistics into a [`SimWeight`] once per query,
//! and then hands out a per-segment [`SimScorer`] that maps a document and a
//! term frequency to a score.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::DocId;
use crate::index::doc_values::NumericDocValues;
use crate::index::reader::LeafReaderContext;

/// Statistics of one field across the whole index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStatistics {
    /// Field name.
    pub field: String,
    /// One greater than the largest doc id.
    pub max_doc: i64,
    /// Documents with at least one term in the field, or -1.
    pub doc_count: i64,
    /// Sum of total term frequencies of all terms, or -1.
    pub sum_total_term_freq: i64,
    /// Sum of document frequencies of all terms, or -1.
    pub sum_doc_freq: i64,
}

/// Statistics of one term across the whole index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermStatistics {
    /// Term text.
    pub term: String,
    /// Documents containing the term.
    pub doc_freq: i64,
    /// Occurrences of the term, or -1.
    pub total_term_freq: i64,
}

/// Query-level scoring state produced by [`Similarity::compute_weight`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimWeight {
    /// Field being scored.
    pub field: String,
    /// Inverse document frequency, summed over all terms for phrases.
    pub idf: f32,
    /// Average field length, used for length normalisation.
    pub avg_field_length: f32,
    /// Boost of the query that owns this weight.
    pub query_boost: f32,
    /// Boost inherited from enclosing queries.
    pub top_level_boost: f32,
    /// Query normalisation factor.
    pub query_norm: f32,
    /// Final multiplier applied to every per-document score.
    pub value: f32,
}

/// Per-segment scoring closure.
pub trait SimScorer: Send + Debug {
    /// Score of `doc` for the given (possibly sloppy) frequency.
    fn score(&self, doc: DocId, freq: f32) -> f32;

    /// Frequency contribution of a sloppy phrase match of edit `distance`.
    fn compute_slop_factor(&self, distance: i32) -> f32 {
        1.0 / (distance as f32 + 1.0)
    }
}

/// A scoring model.
pub trait Similarity: Send + Sync + Debug {
    /// Factor rewarding documents that match `overlap` of `max_overlap` clauses.
    fn coord(&self, _overlap: usize, _max_overlap: usize) -> f32 {
        1.0
    }

    /// Normalisation applied to the whole query from its summed squared weights.
    fn query_norm(&self, _sum_of_squared_weights: f32) -> f32 {
        1.0
    }

    /// Build the query-level weight for `terms` in a field.
    fn compute_weight(
        &self,
        query_boost: f32,
        collection: &CollectionStatistics,
        terms: &[TermStatistics],
    ) -> SimWeight;

    /// Contribution of `weight` to the query's sum of squared weights.
    fn value_for_normalization(&self, weight: &SimWeight) -> f32 {
        let raw = weight.idf * weight.query_boost;
        raw * raw
    }

    /// Apply the query norm and enclosing boosts to `weight`.
    fn normalize(&self, weight: &mut SimWeight, query_norm: f32, top_level_boost: f32);

    /// Per-segment scorer for `weight`.
    fn sim_scorer(&self, weight: &SimWeight, context: &LeafReaderContext) -> Result<Box<dyn SimScorer>>;
}

fn avg_field_length(collection: &CollectionStatistics) -> f32 {
    if collection.sum_total_term_freq <= 0 || collection.doc_count <= 0 {
        1.0
    } else {
        collection.sum_total_term_freq as f32 / collection.doc_count as f32
    }
}

fn leaf_norms(
    weight: &SimWeight,
    context: &LeafReaderContext,
) -> Result<Option<Arc<dyn NumericDocValues>>> {
    context.reader.norms(&weight.field)
}

/// Okapi BM25.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bm25Similarity {
    k1: f32,
    b: f32,
}

impl Default for Bm25Similarity {
    fn default() -> Self {
        Bm25Similarity { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Similarity {
    /// Create a BM25 model with the given saturation and length parameters.
    pub fn new(k1: f32, b: f32) -> Self {
        Bm25Similarity { k1, b }
    }

    /// Get the k1 parameter.
    pub fn k1(&self) -> f32 {
        self.k1
    }

    /// Get the b parameter.
    pub fn b(&self) -> f32 {
        self.b
    }

    fn idf(doc_freq: i64, doc_count: i64) -> f32 {
        let n = doc_count.max(0) as f32;
        let df = doc_freq.max(0) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

impl Similarity for Bm25Similarity {
    fn compute_weight(
        &self,
        query_boost: f32,
        collection: &CollectionStatistics,
        terms: &[TermStatistics],
    ) -> SimWeight {
        let doc_count = if collection.doc_count < 0 {
            collection.max_doc
        } else {
            collection.doc_count
        };
        let idf = terms
            .iter()
            .map(|term| Self::idf(term.doc_freq, doc_count))
            .sum();

        SimWeight {
            field: collection.field.clone(),
            idf,
            avg_field_length: avg_field_length(collection),
            query_boost,
            top_level_boost: 1.0,
            query_norm: 1.0,
            value: idf * query_boost,
        }
    }

    fn normalize(&self, weight: &mut SimWeight, _query_norm: f32, top_level_boost: f32) {
        weight.top_level_boost = top_level_boost;
        weight.value = weight.idf * weight.query_boost * top_level_boost;
    }

    fn sim_scorer(&self, weight: &SimWeight, context: &LeafReaderContext) -> Result<Box<dyn SimScorer>> {
        Ok(Box::new(Bm25DocScorer {
            weight: weight.value,
            k1: self.k1,
            b: self.b,
            avg_field_length: weight.avg_field_length,
            norms: leaf_norms(weight, context)?,
        }))
    }
}

#[derive(Debug)]
struct Bm25DocScorer {
    weight: f32,
    k1: f32,
    b: f32,
    avg_field_length: f32,
    norms: Option<Arc<dyn NumericDocValues>>,
}

impl SimScorer for Bm25DocScorer {
    fn score(&self, doc: DocId, freq: f32) -> f32 {
        if freq <= 0.0 {
            return 0.0;
        }
        let field_length = match &self.norms {
            Some(norms) => norms.get(doc) as f32,
            None => self.avg_field_length,
        };
        let norm_factor = 1.0 - self.b + self.b * (field_length / self.avg_field_length);
        self.weight * (freq * (self.k1 + 1.0)) / (freq + self.k1 * norm_factor)
    }
}

/// Classic vector-space scoring with coordination and query normalisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TfIdfSimilarity;

impl TfIdfSimilarity {
    fn idf(doc_freq: i64, num_docs: i64) -> f32 {
        1.0 + (num_docs.max(0) as f32 / (doc_freq.max(0) as f32 + 1.0)).ln()
    }
}

impl Similarity for TfIdfSimilarity {
    fn coord(&self, overlap: usize, max_overlap: usize) -> f32 {
        if max_overlap == 0 {
            1.0
        } else {
            overlap as f32 / max_overlap as f32
        }
    }

    fn query_norm(&self, sum_of_squared_weights: f32) -> f32 {
        1.0 / sum_of_squared_weights.sqrt()
    }

    fn compute_weight(
        &self,
        query_boost: f32,
        collection: &CollectionStatistics,
        terms: &[TermStatistics],
    ) -> SimWeight {
        let idf = terms
            .iter()
            .map(|term| Self::idf(term.doc_freq, collection.max_doc))
            .sum();

        SimWeight {
            field: collection.field.clone(),
            idf,
            avg_field_length: avg_field_length(collection),
            query_boost,
            top_level_boost: 1.0,
            query_norm: 1.0,
            value: idf * query_boost * idf,
        }
    }

    fn normalize(&self, weight: &mut SimWeight, query_norm: f32, top_level_boost: f32) {
        weight.top_level_boost = top_level_boost;
        weight.query_norm = query_norm * top_level_boost;
        let query_weight = weight.idf * weight.query_boost * weight.query_norm;
        weight.value = query_weight * weight.idf;
    }

    fn sim_scorer(&self, weight: &SimWeight, context: &LeafReaderContext) -> Result<Box<dyn SimScorer>> {
        Ok(Box::new(TfIdfDocScorer {
            weight: weight.value,
            norms: leaf_norms(weight, context)?,
        }))
    }
}

#[derive(Debug)]
struct TfIdfDocScorer {
    weight: f32,
    norms: Option<Arc<dyn NumericDocValues>>,
}

impl SimScorer for TfIdfDocScorer {
    fn score(&self, doc: DocId, freq: f32) -> f32 {
        let length_norm = match &self.norms {
            Some(norms) => {
                let length = norms.get(doc);
                if length > 0 {
                    1.0 / (length as f32).sqrt()
                } else {
                    1.0
                }
            }
            None => 1.0,
        };
        freq.sqrt() * self.weight * length_norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> CollectionStatistics {
        CollectionStatistics {
            field: "body".to_string(),
            max_doc: 100,
            doc_count: 100,
            sum_total_term_freq: 1000,
            sum_doc_freq: 800,
        }
    }

    fn term(doc_freq: i64) -> TermStatistics {
        TermStatistics {
            term: "t".to_string(),
            doc_freq,
            total_term_freq: doc_freq,
        }
    }

    #[test]
    fn test_bm25_idf_prefers_rare_terms() {
        let sim = Bm25Similarity::default();
        let rare = sim.compute_weight(1.0, &collection(), &[term(1)]);
        let common = sim.compute_weight(1.0, &collection(), &[term(90)]);
        assert!(rare.idf > common.idf);
        assert!(common.idf > 0.0);
        assert_eq!(rare.avg_field_length, 10.0);
    }

    #[test]
    fn test_bm25_tf_saturates() {
        let scorer = Bm25DocScorer {
            weight: 1.0,
            k1: 1.2,
            b: 0.75,
            avg_field_length: 10.0,
            norms: None,
        };
        let one = scorer.score(0, 1.0);
        let two = scorer.score(0, 2.0);
        let many = scorer.score(0, 100.0);
        assert!(two > one);
        assert!(many < 2.2 + 1e-3);
        assert_eq!(scorer.score(0, 0.0), 0.0);
    }

    #[test]
    fn test_bm25_normalize_applies_top_level_boost() {
        let sim = Bm25Similarity::default();
        let mut weight = sim.compute_weight(2.0, &collection(), &[term(10)]);
        sim.normalize(&mut weight, 0.5, 3.0);
        assert!((weight.value - weight.idf * 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_tf_idf_coord_and_query_norm() {
        let sim = TfIdfSimilarity;
        assert_eq!(sim.coord(1, 4), 0.25);
        assert_eq!(sim.coord(0, 0), 1.0);
        assert_eq!(sim.query_norm(4.0), 0.5);
    }

    #[test]
    fn test_slop_factor() {
        let scorer = TfIdfDocScorer {
            weight: 1.0,
            norms: None,
        };
        assert_eq!(scorer.compute_slop_factor(0), 1.0);
        assert_eq!(scorer.compute_slop_factor(1), 0.5);
        assert_eq!(scorer.compute_slop_factor(3), 0.25);
    }
}
