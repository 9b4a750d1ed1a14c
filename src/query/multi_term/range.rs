//! Term range query.

use std::ops::Bound;

use crate::error::Result;
use crate::index::terms::{TermAttributes, Terms, TermsEnum};
use crate::query::multi_term::{AcceptStatus, FilteredTermsEnum, MultiTermQuery, TermAcceptor};
use crate::query::rewrite::RewriteMethod;

/// Matches documents containing terms between two bounds, in the term
/// dictionary's code-point order.
#[derive(Debug, Clone)]
pub struct TermRangeQuery {
    field: String,
    lower: Bound<String>,
    upper: Bound<String>,
    boost: f32,
    rewrite_method: RewriteMethod,
}

impl TermRangeQuery {
    /// Create a range query from explicit bounds.
    pub fn new<F: Into<String>>(field: F, lower: Bound<String>, upper: Bound<String>) -> Self {
        TermRangeQuery {
            field: field.into(),
            lower,
            upper,
            boost: 1.0,
            rewrite_method: RewriteMethod::default(),
        }
    }

    /// Create a range query; a `None` end is open.
    pub fn new_string_range<F: Into<String>>(
        field: F,
        lower: Option<&str>,
        upper: Option<&str>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        let bound = |text: Option<&str>, inclusive: bool| match text {
            None => Bound::Unbounded,
            Some(text) if inclusive => Bound::Included(text.to_string()),
            Some(text) => Bound::Excluded(text.to_string()),
        };
        Self::new(
            field,
            bound(lower, include_lower),
            bound(upper, include_upper),
        )
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn with_rewrite_method(mut self, method: RewriteMethod) -> Self {
        self.rewrite_method = method;
        self
    }

    pub fn lower(&self) -> &Bound<String> {
        &self.lower
    }

    pub fn upper(&self) -> &Bound<String> {
        &self.upper
    }

    fn describe(&self) -> String {
        let (open, lower) = match &self.lower {
            Bound::Included(text) => ('[', text.as_str()),
            Bound::Excluded(text) => ('{', text.as_str()),
            Bound::Unbounded => ('{', "*"),
        };
        let (upper, close) = match &self.upper {
            Bound::Included(text) => (text.as_str(), ']'),
            Bound::Excluded(text) => (text.as_str(), '}'),
            Bound::Unbounded => ("*", '}'),
        };
        format!("{}:{open}{lower} TO {upper}{close}", self.field)
    }
}

multi_term_query!(TermRangeQuery);

impl MultiTermQuery for TermRangeQuery {
    fn term_field(&self) -> &str {
        &self.field
    }

    fn terms_enum(&self, terms: &dyn Terms) -> Result<Box<dyn TermsEnum>> {
        let inner = terms.iterator()?;
        let unbounded_below = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(text) => text.is_empty(),
            Bound::Excluded(_) => false,
        };
        if unbounded_below && self.upper == Bound::Unbounded {
            return Ok(inner);
        }
        Ok(Box::new(FilteredTermsEnum::new(
            inner,
            RangeAcceptor {
                lower: self.lower.clone(),
                upper: self.upper.clone(),
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

struct RangeAcceptor {
    lower: Bound<String>,
    upper: Bound<String>,
}

impl TermAcceptor for RangeAcceptor {
    fn initial_seek(&self) -> String {
        match &self.lower {
            Bound::Included(text) | Bound::Excluded(text) => text.clone(),
            Bound::Unbounded => String::new(),
        }
    }

    fn accept(&mut self, term: &str, _attributes: &mut TermAttributes) -> AcceptStatus {
        if matches!(&self.lower, Bound::Excluded(lower) if lower == term) {
            return AcceptStatus::No;
        }
        match &self.upper {
            Bound::Included(upper) if term > upper.as_str() => AcceptStatus::End,
            Bound::Excluded(upper) if term >= upper.as_str() => AcceptStatus::End,
            _ => AcceptStatus::Yes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::query::multi_term::test_support::{drain_terms, field_terms};
    use crate::search::phrase::test_support::segment;

    fn range_terms(query: &TermRangeQuery) -> Vec<String> {
        let seg = segment(&["apple", "banana", "cherry", "date", "elder"]);
        let terms = field_terms(&seg);
        let mut te = query.terms_enum(terms.as_ref()).unwrap();
        drain_terms(te.as_mut())
    }

    #[test]
    fn test_inclusive_and_exclusive_bounds() {
        let inclusive =
            TermRangeQuery::new_string_range("f", Some("banana"), Some("date"), true, true);
        assert_eq!(range_terms(&inclusive), vec!["banana", "cherry", "date"]);

        let exclusive =
            TermRangeQuery::new_string_range("f", Some("banana"), Some("date"), false, false);
        assert_eq!(range_terms(&exclusive), vec!["cherry"]);
    }

    #[test]
    fn test_open_ends() {
        let below = TermRangeQuery::new_string_range("f", None, Some("banana"), true, true);
        assert_eq!(range_terms(&below), vec!["apple", "banana"]);

        let above = TermRangeQuery::new_string_range("f", Some("coconut"), None, true, true);
        assert_eq!(range_terms(&above), vec!["date", "elder"]);

        let all = TermRangeQuery::new_string_range("f", None, None, true, true);
        assert_eq!(range_terms(&all).len(), 5);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let inverted = TermRangeQuery::new_string_range("f", Some("date"), Some("banana"), true, true);
        assert!(range_terms(&inverted).is_empty());
    }

    #[test]
    fn test_description() {
        let query = TermRangeQuery::new_string_range("f", Some("a"), None, true, false);
        assert_eq!(query.description(), "f:[a TO *}");
        let query = TermRangeQuery::new_string_range("f", Some("a"), Some("c"), false, true);
        assert_eq!(query.description(), "f:{a TO c]");
    }
}
