//! Constant-score query over a filter or another query.

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::index::Term;
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::query::filter::Filter;
use crate::query::{Query, Weight, boost_suffix};
use crate::search::doc_id_set::DocIdSetIterator;
use crate::search::scorer::{ConstantScorer, Scorer};
use crate::search::searcher::IndexSearcher;
use crate::util::bits::Bits;

/// What a [`ConstantScoreQuery`] matches.
#[derive(Debug, Clone)]
pub enum ConstantScoreSource {
    /// Documents accepted by a filter.
    Filter(Arc<dyn Filter>),
    /// Documents matched by a query, whose scores are ignored.
    Query(Box<dyn Query>),
}

/// Gives every matching document a score equal to the query boost times
/// the query norm.
#[derive(Debug, Clone)]
pub struct ConstantScoreQuery {
    source: ConstantScoreSource,
    boost: f32,
}

impl ConstantScoreQuery {
    /// Match the documents accepted by `filter`.
    pub fn from_filter(filter: Arc<dyn Filter>) -> Self {
        ConstantScoreQuery {
            source: ConstantScoreSource::Filter(filter),
            boost: 1.0,
        }
    }

    /// Match the documents matched by `query`.
    pub fn from_query(query: Box<dyn Query>) -> Self {
        ConstantScoreQuery {
            source: ConstantScoreSource::Query(query),
            boost: 1.0,
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn source(&self) -> &ConstantScoreSource {
        &self.source
    }

    /// The wrapped filter, if this query wraps one.
    pub fn filter(&self) -> Option<&Arc<dyn Filter>> {
        match &self.source {
            ConstantScoreSource::Filter(filter) => Some(filter),
            ConstantScoreSource::Query(_) => None,
        }
    }

    /// The wrapped query, if this query wraps one.
    pub fn query(&self) -> Option<&dyn Query> {
        match &self.source {
            ConstantScoreSource::Filter(_) => None,
            ConstantScoreSource::Query(query) => Some(query.as_ref()),
        }
    }
}

impl Query for ConstantScoreQuery {
    fn create_weight(&self, searcher: &IndexSearcher) -> Result<Box<dyn Weight>> {
        let inner = match &self.source {
            ConstantScoreSource::Filter(filter) => InnerWeight::Filter(Arc::clone(filter)),
            ConstantScoreSource::Query(query) => InnerWeight::Query(query.create_weight(searcher)?),
        };
        Ok(Box::new(ConstantWeight {
            inner,
            boost: self.boost,
            query_norm: 1.0,
            query_weight: self.boost,
        }))
    }

    fn rewrite(&self, reader: &IndexReader) -> Result<Option<Box<dyn Query>>> {
        let ConstantScoreSource::Query(query) = &self.source else {
            return Ok(None);
        };
        Ok(query.rewrite(reader)?.map(|rewritten| {
            Box::new(ConstantScoreQuery {
                source: ConstantScoreSource::Query(rewritten),
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
        let inner = match &self.source {
            ConstantScoreSource::Filter(filter) => filter.description(),
            ConstantScoreSource::Query(query) => query.description(),
        };
        format!("ConstantScore({inner}){}", boost_suffix(self.boost))
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extract_terms(&self, terms: &mut BTreeSet<Term>) {
        if let ConstantScoreSource::Query(query) = &self.source {
            query.extract_terms(terms);
        }
    }

    fn field(&self) -> Option<&str> {
        self.query().and_then(|query| query.field())
    }
}

#[derive(Debug)]
enum InnerWeight {
    Filter(Arc<dyn Filter>),
    Query(Box<dyn Weight>),
}

#[derive(Debug)]
struct ConstantWeight {
    inner: InnerWeight,
    boost: f32,
    query_norm: f32,
    query_weight: f32,
}

impl Weight for ConstantWeight {
    fn value_for_normalization(&self) -> f32 {
        // the wrapped weight still computes its own state, but does not count
        if let InnerWeight::Query(weight) = &self.inner {
            weight.value_for_normalization();
        }
        self.boost * self.boost
    }

    fn normalize(&mut self, norm: f32, top_level_boost: f32) {
        self.query_norm = norm * top_level_boost;
        self.query_weight = self.boost * self.query_norm;
        if let InnerWeight::Query(weight) = &mut self.inner {
            weight.normalize(norm, top_level_boost);
        }
    }

    fn scorer(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn Scorer>>> {
        let iter: Box<dyn DocIdSetIterator> = match &self.inner {
            InnerWeight::Filter(filter) => {
                let Some(set) = filter.doc_id_set(context, accept_docs)? else {
                    return Ok(None);
                };
                let Some(iter) = set.iterator() else {
                    return Ok(None);
                };
                iter
            }
            InnerWeight::Query(weight) => {
                let Some(scorer) = weight.scorer(context, accept_docs)? else {
                    return Ok(None);
                };
                Box::new(scorer)
            }
        };
        Ok(Some(Box::new(ConstantScorer::new(iter, self.query_weight))))
    }

    fn scores_docs_out_of_order(&self) -> bool {
        match &self.inner {
            InnerWeight::Filter(_) => false,
            InnerWeight::Query(weight) => weight.scores_docs_out_of_order(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::reader::LeafReader;
    use crate::query::filter::QueryWrapperFilter;
    use crate::query::{BooleanQuery, TermQuery};
    use crate::search::phrase::test_support::segment;
    use crate::search::similarity::TfIdfSimilarity;

    fn term(text: &str) -> Box<dyn Query> {
        Box::new(TermQuery::new(Term::new("f", text)))
    }

    fn searcher() -> IndexSearcher {
        let segments: Vec<Arc<dyn LeafReader>> =
            vec![segment(&["a a b", "b", "a"]), segment(&["c", "a c"])];
        IndexSearcher::with_similarity(Arc::new(IndexReader::new(segments)), Arc::new(TfIdfSimilarity))
    }

    #[test]
    fn test_wrapped_query_scores_boost() {
        let searcher = searcher();
        let query = ConstantScoreQuery::from_query(term("a")).with_boost(3.0);
        let top = searcher.search(&query, 10).unwrap();
        assert_eq!(top.total_hits, 3);
        // a lone constant-score query normalises to a score of one
        for hit in &top.score_docs {
            assert!((hit.score - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_wrapped_filter_matches_filter_docs() {
        let searcher = searcher();
        let filter = Arc::new(QueryWrapperFilter::new(term("c")));
        let query = ConstantScoreQuery::from_filter(filter);
        let mut docs: Vec<i32> = searcher
            .search(&query, 10)
            .unwrap()
            .score_docs
            .iter()
            .map(|hit| hit.doc)
            .collect();
        docs.sort_unstable();
        assert_eq!(docs, vec![3, 4]);
    }

    #[test]
    fn test_scores_are_boost_times_norm_in_boolean() {
        let searcher = searcher();
        let mut query = BooleanQuery::new();
        query
            .add_should(Box::new(ConstantScoreQuery::from_query(term("a")).with_boost(2.0)))
            .unwrap();
        query
            .add_should(Box::new(ConstantScoreQuery::from_query(term("c")).with_boost(1.0)))
            .unwrap();
        let top = searcher.search(&query, 10).unwrap();
        let score_of = |doc: i32| top.score_docs.iter().find(|hit| hit.doc == doc).unwrap().score;
        // tf-idf normalises by 1/sqrt(2^2 + 1^2); coord is 1/2 for one clause
        let norm = 1.0 / 5f32.sqrt();
        assert!((score_of(0) - 2.0 * norm * 0.5).abs() < 1e-5);
        assert!((score_of(3) - norm * 0.5).abs() < 1e-5);
        assert!((score_of(4) - 3.0 * norm).abs() < 1e-5);
    }

    #[test]
    fn test_rewrite_and_description() {
        let searcher = searcher();
        let mut inner = BooleanQuery::new();
        inner.add_should(term("a")).unwrap();
        let query = ConstantScoreQuery::from_query(Box::new(inner)).with_boost(2.0);
        assert_eq!(query.description(), "ConstantScore(f:a)^2.0");

        let rewritten = searcher.rewrite(&query).unwrap();
        let rewritten = rewritten.as_any().downcast_ref::<ConstantScoreQuery>().unwrap();
        assert!(rewritten.query().unwrap().as_any().is::<TermQuery>());
        assert_eq!(rewritten.boost(), 2.0);

        let filtered = ConstantScoreQuery::from_filter(Arc::new(QueryWrapperFilter::new(term("a"))));
        assert!(filtered.rewrite(searcher.reader()).unwrap().is_none());
    }
}
