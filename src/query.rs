//! Queries and weights.
//!
//! A [`Query`] is an immutable description of what to match. Searching first
//! rewrites it into primitive queries, then binds it to a searcher as a
//! [`Weight`], which hands out one [`Scorer`] per index segment.

pub mod boolean;
pub mod constant_score;
pub mod field_cache_range;
pub mod filter;
pub mod filtered;
pub mod multi_term;
pub mod phrase;
pub mod rewrite;
pub mod term;

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::index::Term;
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::search::scorer::{BulkScorer, DefaultBulkScorer, Scorer};
use crate::search::searcher::IndexSearcher;
use crate::util::bits::Bits;

pub use self::boolean::{BooleanClause, BooleanQuery, BooleanQueryBuilder, Occur};
pub use self::constant_score::ConstantScoreQuery;
pub use self::field_cache_range::FieldCacheRangeFilter;
pub use self::filter::{CachingWrapperFilter, Filter, QueryWrapperFilter};
pub use self::filtered::{FilterStrategy, FilteredQuery};
pub use self::multi_term::{
    FuzzyQuery, MultiTermQuery, NumericRangeQuery, PrefixQuery, RegexpQuery, TermRangeQuery,
    WildcardQuery,
};
pub use self::phrase::PhraseQuery;
pub use self::rewrite::RewriteMethod;
pub use self::term::TermQuery;

/// Trait for search queries.
pub trait Query: Send + Sync + Debug {
    /// Bind this (rewritten) query to `searcher`.
    fn create_weight(&self, searcher: &IndexSearcher) -> Result<Box<dyn Weight>>;

    /// Rewrite into more primitive queries; `None` if already primitive.
    fn rewrite(&self, _reader: &IndexReader) -> Result<Option<Box<dyn Query>>> {
        Ok(None)
    }

    /// Get the boost factor for this query.
    fn boost(&self) -> f32;

    /// Set the boost factor for this query.
    fn set_boost(&mut self, boost: f32);

    /// Get a human-readable description of this query.
    fn description(&self) -> String;

    /// Clone this query.
    fn clone_box(&self) -> Box<dyn Query>;

    /// Get this query as Any for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Add the terms this rewritten query matches to `terms`.
    fn extract_terms(&self, _terms: &mut BTreeSet<Term>) {}

    /// Get the field name this query searches in, if applicable.
    fn field(&self) -> Option<&str> {
        None
    }
}

impl Clone for Box<dyn Query> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A query bound to a searcher: normalisation state plus a scorer factory.
pub trait Weight: Send + Sync + Debug {
    /// Sum of squared weights of this weight and its children.
    fn value_for_normalization(&self) -> f32;

    /// Apply the query norm and the boosts of enclosing queries.
    fn normalize(&mut self, norm: f32, top_level_boost: f32);

    /// Scorer over one segment, or `None` if nothing can match there.
    /// `accept_docs` limits matches to the set documents.
    fn scorer(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn Scorer>>>;

    /// Whether scorers may deliver documents out of order.
    fn scores_docs_out_of_order(&self) -> bool {
        false
    }

    /// Score a whole leaf into a collector. With `score_docs_in_order`
    /// false, weights that can deliver docs out of order may do so.
    fn bulk_scorer(
        &self,
        context: &LeafReaderContext,
        _score_docs_in_order: bool,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Box<dyn BulkScorer>>> {
        Ok(self
            .scorer(context, accept_docs)?
            .map(|scorer| Box::new(DefaultBulkScorer::new(scorer)) as Box<dyn BulkScorer>))
    }
}

/// Format `boost` the way query descriptions append it: nothing for 1.0.
pub(crate) fn boost_suffix(boost: f32) -> String {
    if boost == 1.0 {
        String::new()
    } else {
        format!("^{boost:?}")
    }
}
