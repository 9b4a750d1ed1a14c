//! # Hasta
//!
//! The query-evaluation core of a full-text search engine.
//!
//! ## Features
//!
//! - Doc id cursors and scorers with conjunction, disjunction and
//!   required/optional composition
//! - Exact and sloppy phrase matching
//! - Term, boolean, phrase, constant-score and multi-term queries
//!   (prefix, wildcard, regexp, fuzzy, term and numeric range) with
//!   pluggable rewrites
//! - Filtered queries and doc-values range filters
//! - Top-k collection by score or by text and numeric fields, with time
//!   limits
//! - Reference-counted searcher management and background reopening

pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod search;
pub mod util;

pub mod prelude {
    pub use crate::config::SearchConfig;
    pub use crate::error::{HastaError, Result};
    pub use crate::index::{DocId, Term};
    pub use crate::query::{
        BooleanQuery, BooleanQueryBuilder, ConstantScoreQuery, FieldCacheRangeFilter, Filter,
        FilterStrategy, FilteredQuery, FuzzyQuery, MultiTermQuery, NumericRangeQuery, Occur,
        PhraseQuery, PrefixQuery, Query, RegexpQuery, RewriteMethod, TermQuery, TermRangeQuery,
        WildcardQuery,
    };
    pub use crate::search::field_collector::{Sort, SortField};
    pub use crate::search::collector::{Collector, TopDocs};
    pub use crate::search::searcher::IndexSearcher;
    pub use crate::search::searcher_manager::SearcherManager;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
