//! Search configuration.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::Term;
use crate::query::boolean::BooleanQuery;
use crate::query::multi_term::FuzzyQuery;
use crate::query::rewrite::RewriteMethod;
use crate::search::similarity::{Bm25Similarity, Similarity, TfIdfSimilarity};

/// Scoring model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimilarityConfig {
    /// Okapi BM25.
    Bm25 {
        /// Term frequency saturation.
        k1: f32,
        /// Length normalisation strength.
        b: f32,
    },
    /// Classic tf-idf with coordination.
    TfIdf,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        SimilarityConfig::Bm25 { k1: 1.2, b: 0.75 }
    }
}

impl SimilarityConfig {
    /// Instantiate the configured model.
    pub fn build(&self) -> Arc<dyn Similarity> {
        match self {
            SimilarityConfig::Bm25 { k1, b } => Arc::new(Bm25Similarity::new(*k1, *b)),
            SimilarityConfig::TfIdf => Arc::new(TfIdfSimilarity),
        }
    }
}

/// Configuration for query evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of clauses in a boolean query.
    pub max_clause_count: usize,

    /// Auto rewrite switches to a filter after this many terms.
    pub auto_rewrite_term_count_cutoff: usize,

    /// Auto rewrite switches to a filter once the visited terms cover this
    /// percentage of the index's documents.
    pub auto_rewrite_doc_count_percent: f64,

    /// Number of terms a fuzzy query expands to.
    pub fuzzy_max_expansions: usize,

    /// Scoring model.
    pub similarity: SimilarityConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_clause_count: 1024,
            auto_rewrite_term_count_cutoff: 350,
            auto_rewrite_doc_count_percent: 0.1,
            fuzzy_max_expansions: 50,
            similarity: SimilarityConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Parse a configuration from JSON; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Install the process-wide settings (the boolean clause limit).
    pub fn apply(&self) -> Result<()> {
        BooleanQuery::set_max_clause_count(self.max_clause_count)
    }

    /// The auto rewrite method with the configured cutoffs.
    pub fn rewrite_method(&self) -> RewriteMethod {
        RewriteMethod::ConstantScoreAuto {
            term_count_cutoff: self.auto_rewrite_term_count_cutoff,
            doc_count_percent: self.auto_rewrite_doc_count_percent,
        }
    }

    /// A fuzzy query on `term` expanding to at most `fuzzy_max_expansions` terms.
    pub fn fuzzy_query(&self, term: Term) -> FuzzyQuery {
        FuzzyQuery::new(term).max_expansions(self.fuzzy_max_expansions)
    }
}
