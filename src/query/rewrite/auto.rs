//! Constant-score rewrite that picks the boolean or the filter form.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::index::reader::{IndexReader, LeafReaderContext};
use crate::index::terms::TermsEnum;
use crate::query::multi_term::MultiTermQuery;
use crate::query::rewrite::{TermCollector, collect_terms, filter, register_state, term_query};
use crate::query::{BooleanQuery, ConstantScoreQuery, Query};
use crate::search::term_context::TermContext;

/// Collects terms until either cutoff is reached.
struct CutOffCollector {
    num_leaves: usize,
    term_limit: usize,
    doc_count_cutoff: i64,
    doc_visit_count: i64,
    has_cut_off: bool,
    // Terms arrive in order within a segment but repeat across segments.
    pending: BTreeMap<String, TermContext>,
}

impl TermCollector for CutOffCollector {
    fn collect(
        &mut self,
        leaf: &LeafReaderContext,
        terms_enum: &mut dyn TermsEnum,
        term: &str,
    ) -> Result<bool> {
        let context = self
            .pending
            .entry(term.to_string())
            .or_insert_with(|| TermContext::new(self.num_leaves));
        register_state(context, leaf, terms_enum);
        self.doc_visit_count += i64::from(terms_enum.doc_freq());

        if self.pending.len() >= self.term_limit || self.doc_visit_count >= self.doc_count_cutoff {
            self.has_cut_off = true;
            return Ok(false);
        }
        Ok(true)
    }
}

pub(crate) fn rewrite(
    reader: &IndexReader,
    query: &dyn MultiTermQuery,
    term_count_cutoff: usize,
    doc_count_percent: f64,
) -> Result<Box<dyn Query>> {
    let doc_count_cutoff = (doc_count_percent / 100.0 * f64::from(reader.max_doc())) as i64;
    let term_limit = term_count_cutoff.min(BooleanQuery::max_clause_count());
    let mut collector = CutOffCollector {
        num_leaves: reader.leaves().len(),
        term_limit,
        doc_count_cutoff,
        doc_visit_count: 0,
        has_cut_off: false,
        pending: BTreeMap::new(),
    };
    collect_terms(reader, query, &mut collector)?;

    if collector.has_cut_off {
        debug!(
            target: "hasta::query",
            query = %query.description(),
            terms = collector.pending.len(),
            doc_visit_count = collector.doc_visit_count,
            "auto rewrite falling back to filter"
        );
        return Ok(filter::constant_score_filter(query));
    }
    if collector.pending.is_empty() {
        return Ok(Box::new(BooleanQuery::with_disable_coord(true)));
    }

    let mut clauses = BooleanQuery::with_disable_coord(true);
    for (text, context) in collector.pending {
        clauses.add_should(Box::new(term_query(query.term_field(), text, context, 1.0)))?;
    }
    Ok(Box::new(
        ConstantScoreQuery::from_query(Box::new(clauses)).with_boost(query.boost()),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::index::Term;
    use crate::index::reader::LeafReader;
    use crate::query::{PrefixQuery, TermQuery};
    use crate::search::phrase::test_support::segment;

    fn reader() -> IndexReader {
        let mut docs = vec!["aa", "ab", "ac", "ad", "ae"];
        docs.extend(std::iter::repeat_n("zz", 20));
        let segments: Vec<Arc<dyn LeafReader>> = vec![segment(&docs)];
        IndexReader::new(segments)
    }

    #[test]
    fn test_term_count_cutoff_selects_filter() {
        let query = PrefixQuery::new(Term::new("f", "a"));
        let rewritten = rewrite(&reader(), &query, 2, 100.0).unwrap();
        let wrapped = rewritten.as_any().downcast_ref::<ConstantScoreQuery>().unwrap();
        assert!(wrapped.filter().is_some());
    }

    #[test]
    fn test_doc_count_cutoff_selects_filter() {
        let query = PrefixQuery::new(Term::new("f", "a"));
        // 10% of 25 docs is 2 visited docs
        let rewritten = rewrite(&reader(), &query, 100, 10.0).unwrap();
        let wrapped = rewritten.as_any().downcast_ref::<ConstantScoreQuery>().unwrap();
        assert!(wrapped.filter().is_some());
    }

    #[test]
    fn test_below_cutoffs_selects_boolean() {
        let query = PrefixQuery::new(Term::new("f", "a")).with_boost(2.0);
        let rewritten = rewrite(&reader(), &query, 10, 100.0).unwrap();
        let wrapped = rewritten.as_any().downcast_ref::<ConstantScoreQuery>().unwrap();
        assert_eq!(wrapped.boost(), 2.0);

        let clauses = wrapped.query().unwrap().as_any().downcast_ref::<BooleanQuery>().unwrap();
        let texts: Vec<&str> = clauses
            .clauses()
            .iter()
            .map(|c| c.query.as_any().downcast_ref::<TermQuery>().unwrap().term().text())
            .collect();
        assert_eq!(texts, vec!["aa", "ab", "ac", "ad", "ae"]);
    }

    #[test]
    fn test_no_terms_gives_empty_boolean() {
        let query = PrefixQuery::new(Term::new("f", "q"));
        let rewritten = rewrite(&reader(), &query, 10, 100.0).unwrap();
        let empty = rewritten.as_any().downcast_ref::<BooleanQuery>().unwrap();
        assert!(empty.is_empty());
    }
}
