//! Boolean rewrites with one clause per accepted term.

use std::collections::BTreeMap;

use crate::error::{HastaError, Result};
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::index::terms::TermsEnum;
use crate::query::multi_term::MultiTermQuery;
use crate::query::rewrite::{TermCollector, collect_terms, register_state, term_query};
use crate::query::{BooleanQuery, ConstantScoreQuery, Query};
use crate::search::term_context::TermContext;

struct CollectedTerm {
    context: TermContext,
    boost: f32,
}

/// Collects every accepted term; fails once there are more than the
/// boolean clause limit.
struct ScoringCollector {
    num_leaves: usize,
    max_clause_count: usize,
    terms: BTreeMap<String, CollectedTerm>,
}

impl TermCollector for ScoringCollector {
    fn collect(
        &mut self,
        leaf: &LeafReaderContext,
        terms_enum: &mut dyn TermsEnum,
        term: &str,
    ) -> Result<bool> {
        if let Some(entry) = self.terms.get_mut(term) {
            debug_assert!(
                entry.boost == terms_enum.attributes().boost,
                "boost of {term} differs between segments"
            );
            register_state(&mut entry.context, leaf, terms_enum);
            return Ok(true);
        }
        if self.terms.len() >= self.max_clause_count {
            return Err(HastaError::too_many_clauses(self.max_clause_count));
        }
        let mut context = TermContext::new(self.num_leaves);
        register_state(&mut context, leaf, terms_enum);
        self.terms.insert(
            term.to_string(),
            CollectedTerm {
                context,
                boost: terms_enum.attributes().boost,
            },
        );
        Ok(true)
    }
}

/// One `SHOULD` term query per accepted term, in term order, each boosted by
/// the query boost times the term's own boost. Coordination is disabled.
pub fn scoring_boolean(reader: &IndexReader, query: &dyn MultiTermQuery) -> Result<BooleanQuery> {
    let mut collector = ScoringCollector {
        num_leaves: reader.leaves().len(),
        max_clause_count: BooleanQuery::max_clause_count(),
        terms: BTreeMap::new(),
    };
    collect_terms(reader, query, &mut collector)?;

    let mut result = BooleanQuery::with_disable_coord(true);
    for (text, entry) in collector.terms {
        let clause = term_query(
            query.term_field(),
            text,
            entry.context,
            query.boost() * entry.boost,
        );
        result.add_should(Box::new(clause))?;
    }
    Ok(result)
}

/// [`scoring_boolean`] wrapped so every match scores the query boost.
pub fn constant_score_boolean(
    reader: &IndexReader,
    query: &dyn MultiTermQuery,
) -> Result<Box<dyn Query>> {
    let clauses = scoring_boolean(reader, query)?;
    Ok(Box::new(
        ConstantScoreQuery::from_query(Box::new(clauses)).with_boost(query.boost()),
    ))
}
