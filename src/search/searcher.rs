//! Running queries against an index reader.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::{HastaError, Result};
use crate::index::Term;
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::query::{Query, Weight};
use crate::search::collector::{Collector, TopDocs, TopScoreDocCollector, TotalHitCountCollector};
use crate::search::field_collector::{Sort, TopFieldCollector, TopFieldDocs};
use crate::search::similarity::{
    Bm25Similarity, CollectionStatistics, Similarity, TermStatistics,
};
use crate::search::term_context::TermContext;

/// Searches one point-in-time view of an index.
///
/// The searcher owns a handle on its [`IndexReader`] and the [`Similarity`]
/// used to score queries. It is cheap to share behind an `Arc`.
pub struct IndexSearcher {
    reader: Arc<IndexReader>,
    similarity: Arc<dyn Similarity>,
}

impl fmt::Debug for IndexSearcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSearcher")
            .field("reader", &self.reader)
            .field("similarity", &self.similarity)
            .finish()
    }
}

impl IndexSearcher {
    /// Create a searcher scoring with BM25.
    pub fn new(reader: Arc<IndexReader>) -> Self {
        Self::with_similarity(reader, Arc::new(Bm25Similarity::default()))
    }

    /// Create a searcher with the given similarity.
    pub fn with_similarity(reader: Arc<IndexReader>, similarity: Arc<dyn Similarity>) -> Self {
        IndexSearcher { reader, similarity }
    }

    /// Create a searcher with the similarity selected by `config`.
    pub fn with_config(reader: Arc<IndexReader>, config: &SearchConfig) -> Self {
        Self::with_similarity(reader, config.similarity.build())
    }

    pub fn reader(&self) -> &Arc<IndexReader> {
        &self.reader
    }

    pub fn similarity(&self) -> &Arc<dyn Similarity> {
        &self.similarity
    }

    /// Rewrite `query` until it is made of primitive queries only.
    pub fn rewrite(&self, query: &dyn Query) -> Result<Box<dyn Query>> {
        let mut current = query.clone_box();
        while let Some(rewritten) = current.rewrite(&self.reader)? {
            current = rewritten;
        }
        Ok(current)
    }

    /// Rewrite `query`, build its weight and normalise it.
    pub fn create_normalized_weight(&self, query: &dyn Query) -> Result<Box<dyn Weight>> {
        let query = self.rewrite(query)?;
        let mut weight = query.create_weight(self)?;
        let value = weight.value_for_normalization();
        let mut norm = self.similarity.query_norm(value);
        if norm.is_infinite() || norm.is_nan() {
            norm = 1.0;
        }
        weight.normalize(norm, 1.0);
        Ok(weight)
    }

    /// The top `n` hits of `query`.
    pub fn search(&self, query: &dyn Query, n: usize) -> Result<TopDocs> {
        let n = self.clamp_hits(n)?;
        let weight = self.create_normalized_weight(query)?;
        let mut collector = TopScoreDocCollector::create(n, !weight.scores_docs_out_of_order())?;
        self.search_leaves(self.reader.leaves(), weight.as_ref(), &mut collector)?;
        let top = collector.top_docs();
        debug!(
            target: "hasta::search",
            query = %query.description(),
            total_hits = top.total_hits,
            "search finished"
        );
        Ok(top)
    }

    /// Feed every match of `query` into `collector`.
    pub fn search_with_collector(&self, query: &dyn Query, collector: &mut dyn Collector) -> Result<()> {
        let weight = self.create_normalized_weight(query)?;
        self.search_leaves(self.reader.leaves(), weight.as_ref(), collector)
    }

    /// The top `n` hits of `query` under `sort`.
    pub fn search_sorted(&self, query: &dyn Query, n: usize, sort: &Sort) -> Result<TopFieldDocs> {
        let n = self.clamp_hits(n)?;
        let weight = self.create_normalized_weight(query)?;
        let mut collector = TopFieldCollector::create(sort.clone(), n, false)?;
        self.search_leaves(self.reader.leaves(), weight.as_ref(), &mut collector)?;
        Ok(collector.top_docs())
    }

    /// Number of documents matching `query`.
    pub fn count(&self, query: &dyn Query) -> Result<i64> {
        let mut collector = TotalHitCountCollector::new();
        self.search_with_collector(query, &mut collector)?;
        Ok(collector.total_hits())
    }

    /// Like [`search`](Self::search), collecting every leaf on the rayon pool
    /// and merging the per-leaf results.
    pub fn search_concurrent(&self, query: &dyn Query, n: usize) -> Result<TopDocs> {
        let n = self.clamp_hits(n)?;
        let weight = self.create_normalized_weight(query)?;
        let in_order = !weight.scores_docs_out_of_order();
        let weight = weight.as_ref();

        let shards = self
            .reader
            .leaves()
            .par_iter()
            .map(|leaf| {
                let mut collector = TopScoreDocCollector::create(n, in_order)?;
                self.search_leaves(std::slice::from_ref(leaf), weight, &mut collector)?;
                Ok(collector.top_docs())
            })
            .collect::<Result<Vec<TopDocs>>>()?;

        let mut merged = TopDocs::merge(n, &shards);
        for hit in &mut merged.score_docs {
            hit.shard_index = -1;
        }
        Ok(merged)
    }

    /// Index-wide statistics of `field`.
    pub fn collection_statistics(&self, field: &str) -> Result<CollectionStatistics> {
        let mut doc_count = 0i64;
        let mut sum_total_term_freq = 0i64;
        let mut sum_doc_freq = 0i64;

        for leaf in self.reader.leaves() {
            let Some(terms) = leaf.reader.terms(field)? else {
                continue;
            };
            doc_count = absorb_unknown(doc_count, i64::from(terms.doc_count()));
            sum_total_term_freq = absorb_unknown(sum_total_term_freq, terms.sum_total_term_freq());
            sum_doc_freq = absorb_unknown(sum_doc_freq, terms.sum_doc_freq());
        }

        Ok(CollectionStatistics {
            field: field.to_string(),
            max_doc: i64::from(self.reader.max_doc()),
            doc_count,
            sum_total_term_freq,
            sum_doc_freq,
        })
    }

    /// Index-wide statistics of `term` from its collected context.
    pub fn term_statistics(&self, term: &Term, context: &TermContext) -> TermStatistics {
        TermStatistics {
            term: term.text().to_string(),
            doc_freq: i64::from(context.doc_freq()),
            total_term_freq: context.total_term_freq(),
        }
    }

    fn clamp_hits(&self, n: usize) -> Result<usize> {
        if n == 0 {
            return Err(HastaError::invalid_argument("n must be > 0"));
        }
        let limit = self.reader.max_doc().max(1) as usize;
        Ok(n.min(limit))
    }

    fn search_leaves(
        &self,
        leaves: &[LeafReaderContext],
        weight: &dyn Weight,
        collector: &mut dyn Collector,
    ) -> Result<()> {
        let in_order = !collector.accepts_docs_out_of_order();
        for leaf in leaves {
            collector.set_next_reader(leaf)?;
            let Some(mut scorer) = weight.bulk_scorer(leaf, in_order, leaf.reader.live_docs())?
            else {
                continue;
            };
            scorer.score(collector)?;
        }
        Ok(())
    }
}

/// Add `value` to a running total; -1 on either side makes the total -1.
fn absorb_unknown(total: i64, value: i64) -> i64 {
    if total == -1 || value == -1 {
        -1
    } else {
        total + value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::reader::LeafReader;
    use crate::query::{BooleanQuery, Occur, TermQuery};
    use crate::search::phrase::test_support::segment;
    use crate::search::similarity::TfIdfSimilarity;

    fn searcher() -> IndexSearcher {
        let segments: Vec<Arc<dyn LeafReader>> = vec![
            segment(&["apple pear", "apple", "plum"]),
            segment(&["pear", "apple apple pear"]),
        ];
        IndexSearcher::new(Arc::new(IndexReader::new(segments)))
    }

    fn term(text: &str) -> TermQuery {
        TermQuery::new(Term::new("f", text))
    }

    #[test]
    fn test_search_returns_global_docs() {
        let searcher = searcher();
        let top = searcher.search(&term("pear"), 10).unwrap();
        assert_eq!(top.total_hits, 3);
        let mut docs: Vec<_> = top.score_docs.iter().map(|hit| hit.doc).collect();
        docs.sort_unstable();
        assert_eq!(docs, vec![0, 3, 4]);
        assert_eq!(top.max_score(), top.score_docs[0].score);
    }

    #[test]
    fn test_zero_hits_requested() {
        let searcher = searcher();
        assert!(matches!(
            searcher.search(&term("pear"), 0),
            Err(HastaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_no_match() {
        let searcher = searcher();
        let top = searcher.search(&term("kiwi"), 5).unwrap();
        assert_eq!(top.total_hits, 0);
        assert!(top.max_score().is_nan());
    }

    #[test]
    fn test_count() {
        let searcher = searcher();
        assert_eq!(searcher.count(&term("apple")).unwrap(), 3);
    }

    #[test]
    fn test_concurrent_matches_sequential() {
        let searcher = searcher();
        let mut query = BooleanQuery::new();
        query.add(Box::new(term("apple")), Occur::Should).unwrap();
        query.add(Box::new(term("pear")), Occur::Should).unwrap();

        let sequential = searcher.search(&query, 3).unwrap();
        let concurrent = searcher.search_concurrent(&query, 3).unwrap();
        assert_eq!(sequential.total_hits, concurrent.total_hits);
        let docs = |top: &TopDocs| top.score_docs.iter().map(|hit| hit.doc).collect::<Vec<_>>();
        assert_eq!(docs(&sequential), docs(&concurrent));
        assert!(concurrent.score_docs.iter().all(|hit| hit.shard_index == -1));
    }

    #[test]
    fn test_collection_statistics() {
        let searcher = searcher();
        let stats = searcher.collection_statistics("f").unwrap();
        assert_eq!(stats.max_doc, 5);
        assert_eq!(stats.doc_count, 5);
        assert_eq!(stats.sum_total_term_freq, 8);

        let missing = searcher.collection_statistics("nope").unwrap();
        assert_eq!(missing.doc_count, 0);
    }

    #[test]
    fn test_term_statistics() {
        let searcher = searcher();
        let term = Term::new("f", "apple");
        let context = TermContext::build(searcher.reader(), &term).unwrap();
        let stats = searcher.term_statistics(&term, &context);
        assert_eq!(stats.doc_freq, 3);
        assert_eq!(stats.total_term_freq, 4);
    }

    #[test]
    fn test_query_norm_fallback() {
        let reader = searcher().reader().clone();
        let searcher = IndexSearcher::with_similarity(reader, Arc::new(TfIdfSimilarity));
        // a zero boost makes the sum of squared weights 0 and the norm infinite
        let weight = searcher
            .create_normalized_weight(&term("apple").with_boost(0.0))
            .unwrap();
        assert!(weight.value_for_normalization().is_finite());
        assert_eq!(searcher.count(&term("apple").with_boost(0.0)).unwrap(), 3);
    }
}
