//! Queries that match every term accepted by a predicate over the term
//! dictionary.
//!
//! A [`MultiTermQuery`] never builds a weight itself. Its rewrite runs the
//! configured [`RewriteMethod`], which walks a filtered [`TermsEnum`] for
//! every segment and turns the accepted terms into a boolean query, a
//! constant-score query, or a filter.

use std::sync::Arc;

use crate::error::{HastaError, Result};
use crate::index::terms::{SeekStatus, TermAttributes, TermState, Terms, TermsEnum};
use crate::index::postings::{PostingsEnum, PostingsFlags};
use crate::query::Query;
use crate::query::rewrite::RewriteMethod;
use crate::util::bits::Bits;

/// Implements [`Query`] for a multi-term query struct with `boost` and
/// `rewrite_method` fields and an inherent `describe` method.
macro_rules! multi_term_query {
    ($query:ty) => {
        impl $crate::query::Query for $query {
            fn create_weight(
                &self,
                _searcher: &$crate::search::searcher::IndexSearcher,
            ) -> $crate::error::Result<Box<dyn $crate::query::Weight>> {
                Err($crate::error::HastaError::query(format!(
                    "{} must be rewritten before it can be weighted",
                    self.describe()
                )))
            }

            fn rewrite(
                &self,
                reader: &$crate::index::reader::IndexReader,
            ) -> $crate::error::Result<Option<Box<dyn $crate::query::Query>>> {
                self.rewrite_method.rewrite(reader, self).map(Some)
            }

            fn boost(&self) -> f32 {
                self.boost
            }

            fn set_boost(&mut self, boost: f32) {
                self.boost = boost;
            }

            fn description(&self) -> String {
                format!(
                    "{}{}",
                    self.describe(),
                    $crate::query::boost_suffix(self.boost)
                )
            }

            fn clone_box(&self) -> Box<dyn $crate::query::Query> {
                Box::new(self.clone())
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn field(&self) -> Option<&str> {
                Some($crate::query::multi_term::MultiTermQuery::term_field(self))
            }
        }
    };
}

pub mod fuzzy;
pub mod numeric_range;
pub mod prefix;
pub mod range;
pub mod regexp;
pub mod wildcard;

pub use self::fuzzy::FuzzyQuery;
pub use self::numeric_range::NumericRangeQuery;
pub use self::prefix::PrefixQuery;
pub use self::range::TermRangeQuery;
pub use self::regexp::RegexpQuery;
pub use self::wildcard::WildcardQuery;

/// A query matching the terms of one field accepted by a predicate.
pub trait MultiTermQuery: Query {
    /// The field whose terms are enumerated.
    fn term_field(&self) -> &str;

    /// Enumerate the accepted terms of `terms`, in dictionary order.
    fn terms_enum(&self, terms: &dyn Terms) -> Result<Box<dyn TermsEnum>>;

    /// How this query is rewritten.
    fn rewrite_method(&self) -> RewriteMethod;

    /// Change how this query is rewritten.
    fn set_rewrite_method(&mut self, method: RewriteMethod);

    /// Clone into a boxed multi-term query.
    fn clone_multi_term(&self) -> Box<dyn MultiTermQuery>;
}

/// Verdict of a [`TermAcceptor`] on one candidate term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptStatus {
    /// Accept the term and move to the next one.
    Yes,
    /// Accept the term, then seek to [`TermAcceptor::next_seek`].
    YesAndSeek,
    /// Reject the term and move to the next one.
    No,
    /// Reject the term, then seek to [`TermAcceptor::next_seek`].
    NoAndSeek,
    /// Reject the term and stop enumerating.
    End,
}

/// The predicate behind a [`FilteredTermsEnum`].
pub trait TermAcceptor: Send {
    /// Where enumeration starts.
    fn initial_seek(&self) -> String {
        String::new()
    }

    /// Judge `term`; accepted terms may record their boost in `attributes`.
    fn accept(&mut self, term: &str, attributes: &mut TermAttributes) -> AcceptStatus;

    /// The next term to seek to after a `*AndSeek` verdict on `current`.
    /// Must be greater than `current`; `None` ends the enumeration.
    fn next_seek(&mut self, _current: &str) -> Option<String> {
        None
    }
}

/// A [`TermsEnum`] that only returns the terms its acceptor accepts.
///
/// Attributes are shared with the wrapped enum. Random seeking is not
/// supported; resuming from a saved term state is.
pub struct FilteredTermsEnum<A> {
    inner: Box<dyn TermsEnum>,
    acceptor: A,
    current: Option<String>,
    do_seek: bool,
    exhausted: bool,
}

impl<A: TermAcceptor> FilteredTermsEnum<A> {
    pub fn new(inner: Box<dyn TermsEnum>, acceptor: A) -> Self {
        FilteredTermsEnum {
            inner,
            acceptor,
            current: None,
            do_seek: true,
            exhausted: false,
        }
    }

    pub fn acceptor(&self) -> &A {
        &self.acceptor
    }

    fn finish(&mut self) -> Result<Option<String>> {
        self.exhausted = true;
        self.current = None;
        Ok(None)
    }

    fn seek_target(&mut self) -> Option<String> {
        match &self.current {
            None => Some(self.acceptor.initial_seek()),
            Some(current) => self.acceptor.next_seek(current),
        }
    }
}

impl<A: TermAcceptor> TermsEnum for FilteredTermsEnum<A> {
    fn next(&mut self) -> Result<Option<String>> {
        if self.exhausted {
            return Ok(None);
        }
        loop {
            let candidate = if self.do_seek {
                self.do_seek = false;
                let Some(target) = self.seek_target() else {
                    return self.finish();
                };
                debug_assert!(
                    self.current.as_deref().is_none_or(|current| target.as_str() > current),
                    "filtered terms enum must seek forward"
                );
                if self.inner.seek_ceil(&target)? == SeekStatus::End {
                    return self.finish();
                }
                match self.inner.term() {
                    Some(term) => term.to_string(),
                    None => return self.finish(),
                }
            } else {
                match self.inner.next()? {
                    Some(term) => term,
                    None => return self.finish(),
                }
            };

            let status = self
                .acceptor
                .accept(&candidate, self.inner.attributes_mut());
            self.current = Some(candidate);
            match status {
                AcceptStatus::Yes => return Ok(self.current.clone()),
                AcceptStatus::YesAndSeek => {
                    self.do_seek = true;
                    return Ok(self.current.clone());
                }
                AcceptStatus::No => {}
                AcceptStatus::NoAndSeek => self.do_seek = true,
                AcceptStatus::End => return self.finish(),
            }
        }
    }

    fn term(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn seek_ceil(&mut self, text: &str) -> Result<SeekStatus> {
        Err(HastaError::query(format!(
            "filtered terms enums cannot seek (target {text})"
        )))
    }

    fn seek_exact_state(&mut self, text: &str, state: &TermState) -> Result<()> {
        self.inner.seek_exact_state(text, state)?;
        self.current = Some(text.to_string());
        self.exhausted = false;
        Ok(())
    }

    fn ord(&self) -> Option<i64> {
        self.inner.ord()
    }

    fn doc_freq(&self) -> i32 {
        self.inner.doc_freq()
    }

    fn total_term_freq(&self) -> i64 {
        self.inner.total_term_freq()
    }

    fn term_state(&self) -> TermState {
        self.inner.term_state()
    }

    fn postings(
        &self,
        live_docs: Option<Arc<dyn Bits>>,
        flags: PostingsFlags,
    ) -> Result<Box<dyn PostingsEnum>> {
        self.inner.postings(live_docs, flags)
    }

    fn attributes(&self) -> &TermAttributes {
        self.inner.attributes()
    }

    fn attributes_mut(&mut self) -> &mut TermAttributes {
        self.inner.attributes_mut()
    }
}

/// Accepts exactly one term.
#[derive(Debug, Clone)]
pub struct SingleTermAcceptor {
    text: String,
}

impl SingleTermAcceptor {
    pub fn new(text: impl Into<String>) -> Self {
        SingleTermAcceptor { text: text.into() }
    }
}

impl TermAcceptor for SingleTermAcceptor {
    fn initial_seek(&self) -> String {
        self.text.clone()
    }

    fn accept(&mut self, term: &str, _attributes: &mut TermAttributes) -> AcceptStatus {
        if term == self.text {
            AcceptStatus::Yes
        } else {
            AcceptStatus::End
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{drain_terms, field_terms};
    use super::*;
    use crate::search::phrase::test_support::segment;

    /// Accepts terms of even length, skipping past any term starting with "s".
    struct EvenLength;

    impl TermAcceptor for EvenLength {
        fn initial_seek(&self) -> String {
            "b".to_string()
        }

        fn accept(&mut self, term: &str, attributes: &mut TermAttributes) -> AcceptStatus {
            if term.starts_with('s') {
                return AcceptStatus::NoAndSeek;
            }
            if term.starts_with('y') {
                return AcceptStatus::End;
            }
            if term.len() % 2 == 0 {
                attributes.boost = term.len() as f32;
                AcceptStatus::Yes
            } else {
                AcceptStatus::No
            }
        }

        fn next_seek(&mut self, _current: &str) -> Option<String> {
            Some("t".to_string())
        }
    }

    #[test]
    fn test_filtered_enum_statuses() {
        let seg = segment(&["aa", "bb", "ccc", "dddd", "sa", "sb", "tt", "uuu", "yy", "zz"]);
        let terms = field_terms(&seg);
        let mut te = FilteredTermsEnum::new(terms.iterator().unwrap(), EvenLength);
        assert_eq!(te.next().unwrap().as_deref(), Some("bb"));
        assert_eq!(te.attributes().boost, 2.0);
        assert_eq!(te.doc_freq(), 1);
        assert_eq!(drain_terms(&mut te), vec!["dddd", "tt"]);
        assert!(te.next().unwrap().is_none());
        assert!(te.term().is_none());
    }

    #[test]
    fn test_filtered_enum_rejects_random_seek() {
        let seg = segment(&["a"]);
        let terms = field_terms(&seg);
        let mut te = FilteredTermsEnum::new(terms.iterator().unwrap(), SingleTermAcceptor::new("a"));
        assert!(te.seek_ceil("a").is_err());
    }

    #[test]
    fn test_single_term_acceptor() {
        let seg = segment(&["apple", "apply", "banana"]);
        let terms = field_terms(&seg);
        let mut te = FilteredTermsEnum::new(terms.iterator().unwrap(), SingleTermAcceptor::new("apply"));
        assert_eq!(drain_terms(&mut te), vec!["apply"]);

        let mut missing = FilteredTermsEnum::new(terms.iterator().unwrap(), SingleTermAcceptor::new("cherry"));
        assert!(drain_terms(&mut missing).is_empty());
    }
}
