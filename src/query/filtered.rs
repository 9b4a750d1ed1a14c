//! A query restricted to the documents of a filter.
//!
//! The filter never contributes to scores. How the two are intersected is
//! up to the [`FilterStrategy`]: passing the filter down as accept docs,
//! leap-frogging two cursors, or checking the filter only for documents the
//! query already matched.

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::index::{DocId, Term};
use crate::query::filter::Filter;
use crate::query::{Query, Weight, boost_suffix};
use crate::search::collector::Collector;
use crate::search::doc_id_set::{DocIdSet, DocIdSetIterator, NO_MORE_DOCS};
use crate::search::scorer::{BulkScorer, DefaultBulkScorer, Scorer};
use crate::search::searcher::IndexSearcher;
use crate::util::bits::Bits;

/// Filters whose first document lies below this use random access.
pub const RANDOM_ACCESS_THRESHOLD: DocId = 100;

/// How a [`FilteredQuery`] intersects its filter with its query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterStrategy {
    /// Hand the filter to the query as accept docs when it supports random
    /// access and its first document is below [`RANDOM_ACCESS_THRESHOLD`];
    /// otherwise leap-frog with the filter leading.
    #[default]
    RandomAccess,
    /// Leap-frog, advancing the filter first.
    LeapFrogFilterFirst,
    /// Leap-frog, advancing the query first.
    LeapFrogQueryFirst,
    /// Drive the query and check each match against the filter's random
    /// access view; leap-frogs query first when the filter has none.
    QueryFirst,
}

impl FilterStrategy {
    fn filtered_scorer(
        self,
        context: &LeafReaderContext,
        weight: &dyn Weight,
        set: &dyn DocIdSet,
    ) -> Result<Option<Box<dyn Scorer>>> {
        match self {
            FilterStrategy::RandomAccess => {
                let Some(mut filter) = set.iterator() else {
                    return Ok(None);
                };
                let first = filter.next_doc();
                if first == NO_MORE_DOCS {
                    return Ok(None);
                }
                if first < RANDOM_ACCESS_THRESHOLD {
                    if let Some(bits) = set.bits() {
                        return weight.scorer(context, Some(bits));
                    }
                }
                Ok(weight
                    .scorer(context, None)?
                    .map(|scorer| Box::new(LeapFrogScorer::after_first_filter_doc(filter, scorer)) as Box<dyn Scorer>))
            }
            FilterStrategy::LeapFrogFilterFirst | FilterStrategy::LeapFrogQueryFirst => {
                let Some(filter) = set.iterator() else {
                    return Ok(None);
                };
                let query_first = self == FilterStrategy::LeapFrogQueryFirst;
                Ok(weight.scorer(context, None)?.map(|scorer| {
                    Box::new(LeapFrogScorer::new(filter, scorer, query_first)) as Box<dyn Scorer>
                }))
            }
            FilterStrategy::QueryFirst => match set.bits() {
                Some(bits) => Ok(weight
                    .scorer(context, None)?
                    .map(|scorer| Box::new(QueryFirstScorer::new(scorer, bits)) as Box<dyn Scorer>)),
                None => FilterStrategy::LeapFrogQueryFirst.filtered_scorer(context, weight, set),
            },
        }
    }
}

/// Matches the documents of `query` that `filter` accepts, scored by
/// `query` alone.
#[derive(Debug, Clone)]
pub struct FilteredQuery {
    query: Box<dyn Query>,
    filter: Arc<dyn Filter>,
    strategy: FilterStrategy,
    boost: f32,
}

impl FilteredQuery {
    pub fn new(query: Box<dyn Query>, filter: Arc<dyn Filter>) -> Self {
        FilteredQuery {
            query,
            filter,
            strategy: FilterStrategy::default(),
            boost: 1.0,
        }
    }

    pub fn with_strategy(mut self, strategy: FilterStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn query(&self) -> &dyn Query {
        self.query.as_ref()
    }

    pub fn filter(&self) -> &Arc<dyn Filter> {
        &self.filter
    }

    pub fn strategy(&self) -> FilterStrategy {
        self.strategy
    }
}

impl Query for FilteredQuery {
    fn create_weight(&self, searcher: &IndexSearcher) -> Result<Box<dyn Weight>> {
        Ok(Box::new(FilteredWeight {
            inner: self.query.create_weight(searcher)?,
            filter: Arc::clone(&self.filter),
            strategy: self.strategy,
            boost: self.boost,
        }))
    }

    fn rewrite(&self, reader: &IndexReader) -> Result<Option<Box<dyn Query>>> {
        Ok(self.query.rewrite(reader)?.map(|rewritten| {
            Box::new(FilteredQuery {
                query: rewritten,
                filter: Arc::clone(&self.filter),
                strategy: self.strategy,
                boost: self.boost,
            }) as Box<dyn Query>
        }))
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        format!(
            "filtered({})->{}{}",
            self.query.description(),
            self.filter.description(),
            boost_suffix(self.boost)
        )
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extract_terms(&self, terms: &mut BTreeSet<Term>) {
        self.query.extract_terms(terms);
    }

    fn field(&self) -> Option<&str> {
        self.query.field()
    }
}

#[derive(Debug)]
struct FilteredWeight {
    inner: Box<dyn Weight>,
    filter: Arc<dyn Filter>,
    strategy: FilterStrategy,
    boost: f32,
}

impl Weight for FilteredWeight {
    fn value_for_normalization(&self) -> f32 {
        self.inner.value_for_normalization() * self.boost * self.boost
    }

    fn normalize(&mut self, norm: f32, top_level_boost: f32) {
        self.inner.normalize(norm, top_level_boost * self.boost);
    }

    fn scorer(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn Scorer>>> {
        let Some(set) = self.filter.doc_id_set(context, accept_docs)? else {
            return Ok(None);
        };
        self.strategy
            .filtered_scorer(context, self.inner.as_ref(), set.as_ref())
    }

    fn scores_docs_out_of_order(&self) -> bool {
        self.strategy == FilterStrategy::QueryFirst && self.inner.scores_docs_out_of_order()
    }

    fn bulk_scorer(
        &self,
        context: &LeafReaderContext,
        score_docs_in_order: bool,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn BulkScorer>>> {
        let Some(set) = self.filter.doc_id_set(context, accept_docs)? else {
            return Ok(None);
        };
        let bits = match self.strategy {
            FilterStrategy::QueryFirst => set.bits(),
            _ => None,
        };
        match bits {
            Some(bits) => Ok(self
                .inner
                .bulk_scorer(context, score_docs_in_order, None)?
                .map(|inner| Box::new(QueryFirstBulkScorer { inner, bits }) as Box<dyn BulkScorer>)),
            None => Ok(self
                .strategy
                .filtered_scorer(context, self.inner.as_ref(), set.as_ref())?
                .map(|scorer| Box::new(DefaultBulkScorer::new(scorer)) as Box<dyn BulkScorer>)),
        }
    }
}

/// Intersects a filter cursor with a scorer by advancing whichever is
/// behind to the other's document.
pub struct LeapFrogScorer {
    filter: Box<dyn DocIdSetIterator>,
    scorer: Box<dyn Scorer>,
    query_first: bool,
    primary_doc: DocId,
    secondary_doc: DocId,
    /// The primary cursor already stands on its first document.
    primed: bool,
}

impl LeapFrogScorer {
    /// `query_first` makes the scorer the primary cursor.
    pub fn new(filter: Box<dyn DocIdSetIterator>, scorer: Box<dyn Scorer>, query_first: bool) -> Self {
        LeapFrogScorer {
            filter,
            scorer,
            query_first,
            primary_doc: -1,
            secondary_doc: -1,
            primed: false,
        }
    }

    /// Filter-first leap-frog over a filter cursor that was already moved
    /// to its first document.
    pub fn after_first_filter_doc(filter: Box<dyn DocIdSetIterator>, scorer: Box<dyn Scorer>) -> Self {
        let first = filter.doc_id();
        LeapFrogScorer {
            primary_doc: first,
            primed: true,
            ..Self::new(filter, scorer, false)
        }
    }

    fn next_primary(&mut self) -> DocId {
        if self.query_first {
            self.scorer.next_doc()
        } else {
            self.filter.next_doc()
        }
    }

    fn advance_primary(&mut self, target: DocId) -> DocId {
        if self.query_first {
            self.scorer.advance(target)
        } else {
            self.filter.advance(target)
        }
    }

    fn advance_secondary(&mut self, target: DocId) -> DocId {
        if self.query_first {
            self.filter.advance(target)
        } else {
            self.scorer.advance(target)
        }
    }

    fn advance_to_next_common_doc(&mut self) -> DocId {
        loop {
            if self.secondary_doc < self.primary_doc {
                self.secondary_doc = self.advance_secondary(self.primary_doc);
            } else if self.secondary_doc == self.primary_doc {
                return self.primary_doc;
            } else {
                self.primary_doc = self.advance_primary(self.secondary_doc);
            }
        }
    }
}

impl DocIdSetIterator for LeapFrogScorer {
    fn doc_id(&self) -> DocId {
        self.secondary_doc
    }

    fn next_doc(&mut self) -> DocId {
        if self.secondary_doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        if !std::mem::take(&mut self.primed) {
            self.primary_doc = self.next_primary();
        }
        self.advance_to_next_common_doc()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if self.secondary_doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        self.primed = false;
        if target > self.primary_doc {
            self.primary_doc = self.advance_primary(target);
        }
        self.advance_to_next_common_doc()
    }

    fn cost(&self) -> i64 {
        self.filter.cost().min(self.scorer.cost())
    }
}

impl Scorer for LeapFrogScorer {
    fn score(&self) -> f32 {
        self.scorer.score()
    }

    fn freq(&self) -> i32 {
        self.scorer.freq()
    }
}

/// Drives a scorer and skips the documents a random-access filter rejects.
pub struct QueryFirstScorer {
    scorer: Box<dyn Scorer>,
    bits: Arc<dyn Bits>,
    doc: DocId,
}

impl QueryFirstScorer {
    pub fn new(scorer: Box<dyn Scorer>, bits: Arc<dyn Bits>) -> Self {
        QueryFirstScorer {
            scorer,
            bits,
            doc: -1,
        }
    }

    fn settle(&mut self, mut doc: DocId) -> DocId {
        while doc != NO_MORE_DOCS && !self.bits.get(doc as usize) {
            doc = self.scorer.next_doc();
        }
        self.doc = doc;
        doc
    }
}

impl DocIdSetIterator for QueryFirstScorer {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        if self.doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        let doc = self.scorer.next_doc();
        self.settle(doc)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        if self.doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        let doc = self.scorer.advance(target);
        self.settle(doc)
    }

    fn cost(&self) -> i64 {
        self.scorer.cost()
    }
}

impl Scorer for QueryFirstScorer {
    fn score(&self) -> f32 {
        self.scorer.score()
    }

    fn freq(&self) -> i32 {
        self.scorer.freq()
    }
}

/// Bulk-scores the query, possibly out of order, and drops hits the
/// filter rejects before they reach the collector.
struct QueryFirstBulkScorer {
    inner: Box<dyn BulkScorer>,
    bits: Arc<dyn Bits>,
}

impl BulkScorer for QueryFirstBulkScorer {
    fn score(&mut self, collector: &mut dyn Collector) -> Result<()> {
        let mut accepting = AcceptingCollector {
            inner: collector,
            bits: self.bits.as_ref(),
        };
        self.inner.score(&mut accepting)
    }
}

struct AcceptingCollector<'a> {
    inner: &'a mut dyn Collector,
    bits: &'a dyn Bits,
}

impl Collector for AcceptingCollector<'_> {
    fn set_next_reader(&mut self, context: &LeafReaderContext) -> Result<()> {
        self.inner.set_next_reader(context)
    }

    fn collect(&mut self, doc: DocId, scorer: &dyn Scorer) -> Result<()> {
        if self.bits.get(doc as usize) {
            self.inner.collect(doc, scorer)
        } else {
            Ok(())
        }
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        self.inner.accepts_docs_out_of_order()
    }
}
