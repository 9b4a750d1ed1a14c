//! Wildcard query implementation for pattern matching.

use std::sync::Arc;

use regex::Regex;

use crate::error::{HastaError, Result};
use crate::index::Term;
use crate::index::terms::{TermAttributes, Terms, TermsEnum};
use crate::query::multi_term::{AcceptStatus, FilteredTermsEnum, MultiTermQuery, TermAcceptor};
use crate::query::rewrite::RewriteMethod;

/// A query that matches documents containing terms that match a wildcard pattern.
///
/// Supports the following wildcards:
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
/// - `\` escapes the character that follows it
#[derive(Debug, Clone)]
pub struct WildcardQuery {
    term: Term,
    /// Literal text before the first wildcard.
    prefix: String,
    regex: Arc<Regex>,
    boost: f32,
    rewrite_method: RewriteMethod,
}

impl WildcardQuery {
    /// Create a new wildcard query; the term text is the pattern.
    pub fn new(term: Term) -> Result<Self> {
        let (prefix, regex) = Self::compile_pattern(term.text())?;
        Ok(WildcardQuery {
            term,
            prefix,
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

    /// The pattern term.
    pub fn term(&self) -> &Term {
        &self.term
    }

    /// Check if a term matches the wildcard pattern.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Compile a wildcard pattern into its literal prefix and an anchored regex.
    fn compile_pattern(pattern: &str) -> Result<(String, Regex)> {
        let mut regex_pattern = String::from("^");
        let mut prefix = String::new();
        let mut in_prefix = true;
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    in_prefix = false;
                    regex_pattern.push_str(".*");
                }
                '?' => {
                    in_prefix = false;
                    regex_pattern.push('.');
                }
                _ => {
                    // a trailing backslash matches itself
                    let literal = if c == '\\' { chars.next().unwrap_or('\\') } else { c };
                    if in_prefix {
                        prefix.push(literal);
                    }
                    regex_pattern.push_str(&regex::escape(literal.encode_utf8(&mut [0; 4])));
                }
            }
        }
        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern)
            .map_err(|e| HastaError::query(format!("Invalid wildcard pattern: {e}")))?;
        Ok((prefix, regex))
    }

    fn describe(&self) -> String {
        self.term.to_string()
    }
}

multi_term_query!(WildcardQuery);

impl MultiTermQuery for WildcardQuery {
    fn term_field(&self) -> &str {
        self.term.field()
    }

    fn terms_enum(&self, terms: &dyn Terms) -> Result<Box<dyn TermsEnum>> {
        Ok(Box::new(FilteredTermsEnum::new(
            terms.iterator()?,
            PatternAcceptor {
                prefix: self.prefix.clone(),
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

/// Accepts terms matched by an anchored regex, within a literal prefix.
pub(crate) struct PatternAcceptor {
    pub(crate) prefix: String,
    pub(crate) regex: Arc<Regex>,
}

impl TermAcceptor for PatternAcceptor {
    fn initial_seek(&self) -> String {
        self.prefix.clone()
    }

    fn accept(&mut self, term: &str, _attributes: &mut TermAttributes) -> AcceptStatus {
        if !term.starts_with(&self.prefix) {
            AcceptStatus::End
        } else if self.regex.is_match(term) {
            AcceptStatus::Yes
        } else {
            AcceptStatus::No
        }
    }
}
