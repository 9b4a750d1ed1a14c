//! Strategies that turn a [`MultiTermQuery`] into an executable query.
//!
//! Every strategy walks the accepted terms of each segment through a
//! [`TermCollector`]. What differs is what comes out:
//!
//! * [`RewriteMethod::ScoringBoolean`]: one scored `SHOULD` clause per term.
//! * [`RewriteMethod::ConstantScoreBoolean`]: the same clauses with scores dropped.
//! * [`RewriteMethod::ConstantScoreFilter`]: a filter over the union of the
//!   terms' postings; never hits the clause limit.
//! * [`RewriteMethod::ConstantScoreAuto`]: a constant-score boolean while the
//!   terms stay below the cutoffs, the filter once they do not.
//! * [`RewriteMethod::TopTermsScoringBoolean`] and
//!   [`RewriteMethod::TopTermsBoostOnlyBoolean`]: only the `size` terms with
//!   the highest boost.
//! * [`RewriteMethod::DocTermOrds`]: a filter matching per-document term
//!   ordinals against the set of accepted ordinals.

pub mod auto;
pub mod filter;
pub mod scoring;
pub mod top_terms;

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::Term;
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::index::terms::TermsEnum;
use crate::query::multi_term::MultiTermQuery;
use crate::query::{Query, TermQuery};
use crate::search::term_context::TermContext;

pub use self::filter::{DocTermOrdsFilter, MultiTermQueryWrapperFilter};
pub use self::top_terms::TopTermsMode;

/// Default term count above which the auto rewrite switches to a filter.
pub const DEFAULT_TERM_COUNT_CUTOFF: usize = 350;

/// Default percentage of the index's documents above which the auto rewrite
/// switches to a filter.
pub const DEFAULT_DOC_COUNT_PERCENT: f64 = 0.1;

/// How a multi-term query is rewritten.
///
/// Equality and hashing are by value, parameters included, so two methods
/// with the same settings are interchangeable as cache keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewriteMethod {
    /// A boolean query with one scored clause per term.
    ScoringBoolean,
    /// A boolean query with one clause per term, wrapped to a constant score.
    ConstantScoreBoolean,
    /// A constant-score filter built from the terms' postings.
    ConstantScoreFilter,
    /// Boolean below both cutoffs, filter otherwise.
    ConstantScoreAuto {
        /// Number of terms at which to give up on the boolean form.
        term_count_cutoff: usize,
        /// Percentage of `max_doc` visited at which to give up on the boolean form.
        doc_count_percent: f64,
    },
    /// The `size` most competitive terms, scored.
    TopTermsScoringBoolean {
        size: usize,
    },
    /// The `size` most competitive terms, each scoring its boost only.
    TopTermsBoostOnlyBoolean {
        size: usize,
    },
    /// A constant-score filter over per-document term ordinals.
    DocTermOrds,
}

impl Default for RewriteMethod {
    fn default() -> Self {
        RewriteMethod::ConstantScoreAuto {
            term_count_cutoff: DEFAULT_TERM_COUNT_CUTOFF,
            doc_count_percent: DEFAULT_DOC_COUNT_PERCENT,
        }
    }
}

impl RewriteMethod {
    /// Rewrite `query` against `reader`.
    pub fn rewrite(&self, reader: &IndexReader, query: &dyn MultiTermQuery) -> Result<Box<dyn Query>> {
        match *self {
            RewriteMethod::ScoringBoolean => Ok(Box::new(scoring::scoring_boolean(reader, query)?)),
            RewriteMethod::ConstantScoreBoolean => scoring::constant_score_boolean(reader, query),
            RewriteMethod::ConstantScoreFilter => Ok(filter::constant_score_filter(query)),
            RewriteMethod::ConstantScoreAuto {
                term_count_cutoff,
                doc_count_percent,
            } => auto::rewrite(reader, query, term_count_cutoff, doc_count_percent),
            RewriteMethod::TopTermsScoringBoolean { size } => {
                top_terms::rewrite(reader, query, size, TopTermsMode::Scoring)
            }
            RewriteMethod::TopTermsBoostOnlyBoolean { size } => {
                top_terms::rewrite(reader, query, size, TopTermsMode::BoostOnly)
            }
            RewriteMethod::DocTermOrds => Ok(filter::doc_term_ords(query)),
        }
    }

    /// Whether the rewritten query ignores per-term scores.
    pub fn is_constant_score(&self) -> bool {
        !matches!(
            self,
            RewriteMethod::ScoringBoolean | RewriteMethod::TopTermsScoringBoolean { .. }
        )
    }

    fn key(&self) -> (u8, usize, u64) {
        match *self {
            RewriteMethod::ScoringBoolean => (0, 0, 0),
            RewriteMethod::ConstantScoreBoolean => (1, 0, 0),
            RewriteMethod::ConstantScoreFilter => (2, 0, 0),
            RewriteMethod::ConstantScoreAuto {
                term_count_cutoff,
                doc_count_percent,
            } => (3, term_count_cutoff, doc_count_percent.to_bits()),
            RewriteMethod::TopTermsScoringBoolean { size } => (4, size, 0),
            RewriteMethod::TopTermsBoostOnlyBoolean { size } => (5, size, 0),
            RewriteMethod::DocTermOrds => (6, 0, 0),
        }
    }
}

impl PartialEq for RewriteMethod {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for RewriteMethod {}

impl Hash for RewriteMethod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Receives the accepted terms of a multi-term query, segment by segment.
pub trait TermCollector {
    /// Called before the terms of a new segment; the enum's attributes may
    /// be primed for the consumer.
    fn set_next_enum(&mut self, _leaf: &LeafReaderContext, _terms_enum: &mut dyn TermsEnum) {}

    /// Collect the term `terms_enum` is positioned on. Returning `false`
    /// stops the collection for all remaining segments.
    fn collect(
        &mut self,
        leaf: &LeafReaderContext,
        terms_enum: &mut dyn TermsEnum,
        term: &str,
    ) -> Result<bool>;
}

/// Feed every term `query` accepts in `reader` into `collector`.
pub fn collect_terms(
    reader: &IndexReader,
    query: &dyn MultiTermQuery,
    collector: &mut dyn TermCollector,
) -> Result<()> {
    for leaf in reader.leaves() {
        let Some(terms) = leaf.reader.terms(query.term_field())? else {
            continue;
        };
        let mut terms_enum = query.terms_enum(terms.as_ref())?;
        collector.set_next_enum(leaf, terms_enum.as_mut());
        while let Some(term) = terms_enum.next()? {
            if !collector.collect(leaf, terms_enum.as_mut(), &term)? {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Register the state of the term `terms_enum` is positioned on.
fn register_state(context: &mut TermContext, leaf: &LeafReaderContext, terms_enum: &dyn TermsEnum) {
    context.register(
        terms_enum.term_state(),
        leaf.ord,
        terms_enum.doc_freq(),
        terms_enum.total_term_freq(),
    );
}

/// A term query over pre-collected states.
fn term_query(field: &str, text: String, context: TermContext, boost: f32) -> TermQuery {
    TermQuery::with_context(Term::new(field, text), context).with_boost(boost)
}
