//! Prefix query.

use crate::error::Result;
use crate::index::Term;
use crate::index::terms::{TermAttributes, Terms, TermsEnum};
use crate::query::multi_term::{AcceptStatus, FilteredTermsEnum, MultiTermQuery, TermAcceptor};
use crate::query::rewrite::RewriteMethod;

/// Matches documents containing terms that start with a prefix.
#[derive(Debug, Clone)]
pub struct PrefixQuery {
    prefix: Term,
    boost: f32,
    rewrite_method: RewriteMethod,
}

impl PrefixQuery {
    pub fn new(prefix: Term) -> Self {
        PrefixQuery {
            prefix,
            boost: 1.0,
            rewrite_method: RewriteMethod::default(),
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn with_rewrite_method(mut self, method: RewriteMethod) -> Self {
        self.rewrite_method = method;
        self
    }

    /// The prefix term.
    pub fn prefix(&self) -> &Term {
        &self.prefix
    }

    fn describe(&self) -> String {
        format!("{}*", self.prefix)
    }
}

multi_term_query!(PrefixQuery);

impl MultiTermQuery for PrefixQuery {
    fn term_field(&self) -> &str {
        self.prefix.field()
    }

    fn terms_enum(&self, terms: &dyn Terms) -> Result<Box<dyn TermsEnum>> {
        let inner = terms.iterator()?;
        if self.prefix.text().is_empty() {
            return Ok(inner);
        }
        Ok(Box::new(FilteredTermsEnum::new(
            inner,
            PrefixAcceptor {
                prefix: self.prefix.text().to_string(),
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

struct PrefixAcceptor {
    prefix: String,
}

impl TermAcceptor for PrefixAcceptor {
    fn initial_seek(&self) -> String {
        self.prefix.clone()
    }

    fn accept(&mut self, term: &str, _attributes: &mut TermAttributes) -> AcceptStatus {
        if term.starts_with(&self.prefix) {
            AcceptStatus::Yes
        } else {
            AcceptStatus::End
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::query::multi_term::test_support::{drain_terms, field_terms};
    use crate::search::phrase::test_support::segment;

    #[test]
    fn test_prefix_terms() {
        let seg = segment(&["app", "apple", "apply", "apricot", "banana", "ap"]);
        let terms = field_terms(&seg);
        let query = PrefixQuery::new(Term::new("f", "app"));
        let mut te = query.terms_enum(terms.as_ref()).unwrap();
        assert_eq!(drain_terms(te.as_mut()), vec!["app", "apple", "apply"]);
    }

    #[test]
    fn test_empty_prefix_matches_all_terms() {
        let seg = segment(&["b", "a", "c"]);
        let terms = field_terms(&seg);
        let query = PrefixQuery::new(Term::new("f", ""));
        let mut te = query.terms_enum(terms.as_ref()).unwrap();
        assert_eq!(drain_terms(te.as_mut()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_description() {
        let query = PrefixQuery::new(Term::new("f", "app")).with_boost(2.0);
        assert_eq!(query.description(), "f:app*^2.0");
        assert_eq!(query.field(), Some("f"));
    }
}
