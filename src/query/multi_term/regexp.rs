//! Regular expression query.

use std::sync::Arc;

use regex::Regex;

use crate::error::{HastaError, Result};
use crate::index::Term;
use crate::index::terms::{Terms, TermsEnum};
use crate::query::multi_term::wildcard::PatternAcceptor;
use crate::query::multi_term::{FilteredTermsEnum, MultiTermQuery};
use crate::query::rewrite::RewriteMethod;

/// Matches documents containing terms that match a regular expression.
///
/// The expression must match the whole term.
#[derive(Debug, Clone)]
pub struct RegexpQuery {
    term: Term,
    regex: Arc<Regex>,
    boost: f32,
    rewrite_method: RewriteMethod,
}

impl RegexpQuery {
    /// Create a regexp query; the term text is the expression.
    pub fn new(term: Term) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", term.text()))
            .map_err(|e| HastaError::query(format!("Invalid regular expression: {e}")))?;
        Ok(RegexpQuery {
            term,
            regex: Arc::new(regex),
            boost: 1.0,
            rewrite_method: RewriteMethod::default(),
        })
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn with_rewrite_method(mut self, method: RewriteMethod) -> Self {
        self.rewrite_method = method;
        self
    }

    pub fn term(&self) -> &Term {
        &self.term
    }

    fn describe(&self) -> String {
        format!("{}:/{}/", self.term.field(), self.term.text())
    }
}

multi_term_query!(RegexpQuery);

impl MultiTermQuery for RegexpQuery {
    fn term_field(&self) -> &str {
        self.term.field()
    }

    fn terms_enum(&self, terms: &dyn Terms) -> Result<Box<dyn TermsEnum>> {
        Ok(Box::new(FilteredTermsEnum::new(
            terms.iterator()?,
            PatternAcceptor {
                prefix: String::new(),
                regex: Arc::clone(&self.regex),
            },
        )))
    }

    fn rewrite_method(&self) -> RewriteMethod {
        self.rewrite_method
    }

    fn set_rewrite_method(&mut self, method: RewriteMethod) {
        self.rewrite_method = method;
    }

    fn clone_multi_term(&self) -> Box<dyn MultiTermQuery> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::query::multi_term::test_support::{drain_terms, field_terms};
    use crate::search::phrase::test_support::segment;

    #[test]
    fn test_regexp_terms_are_anchored() {
        let seg = segment(&["colour", "color", "discolor", "colors"]);
        let terms = field_terms(&seg);
        let query = RegexpQuery::new(Term::new("f", "colou?r")).unwrap();
        let mut te = query.terms_enum(terms.as_ref()).unwrap();
        assert_eq!(drain_terms(te.as_mut()), vec!["color", "colour"]);
    }

    #[test]
    fn test_alternation_is_fully_anchored() {
        let seg = segment(&["ab", "abc", "c", "xc"]);
        let terms = field_terms(&seg);
        let query = RegexpQuery::new(Term::new("f", "ab|c")).unwrap();
        let mut te = query.terms_enum(terms.as_ref()).unwrap();
        assert_eq!(drain_terms(te.as_mut()), vec!["ab", "c"]);
    }

    #[test]
    fn test_invalid_expression() {
        let err = RegexpQuery::new(Term::new("f", "(unclosed")).unwrap_err();
        assert!(matches!(err, HastaError::Query(_)));
    }

    #[test]
    fn test_description() {
        let query = RegexpQuery::new(Term::new("f", "a.c")).unwrap();
        assert_eq!(query.description(), "f:/a.c/");
    }
}
