//! Fuzzy query implementation for approximate string matching.

use crate::error::{HastaError, Result};
use crate::index::Term;
use crate::index::terms::{TermAttributes, Terms, TermsEnum};
use crate::query::multi_term::{
    AcceptStatus, FilteredTermsEnum, MultiTermQuery, SingleTermAcceptor, TermAcceptor,
};
use crate::query::rewrite::RewriteMethod;
use crate::util::levenshtein::edit_distance_within;

/// Largest supported edit distance.
pub const MAXIMUM_SUPPORTED_DISTANCE: u32 = 2;

/// Default number of terms a fuzzy query expands to.
pub const DEFAULT_MAX_EXPANSIONS: usize = 50;

/// A fuzzy query for approximate string matching.
///
/// Matches terms within `max_edits` edits of the query text that share its
/// first `prefix_length` characters. Each matching term is boosted by
/// `1 - edits / min(term length, query length)`, and by default only the
/// `max_expansions` best terms are kept.
#[derive(Debug, Clone)]
pub struct FuzzyQuery {
    term: Term,
    /// Maximum edit distance (Levenshtein distance)
    max_edits: u32,
    /// Minimum prefix length that must match exactly
    prefix_length: u32,
    /// Whether transpositions count as single edits (Damerau-Levenshtein)
    transpositions: bool,
    max_expansions: usize,
    boost: f32,
    rewrite_method: RewriteMethod,
}

impl FuzzyQuery {
    /// Create a new fuzzy query with default settings.
    pub fn new(term: Term) -> Self {
        FuzzyQuery {
            term,
            max_edits: MAXIMUM_SUPPORTED_DISTANCE,
            prefix_length: 0,
            transpositions: true,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            boost: 1.0,
            rewrite_method: RewriteMethod::TopTermsScoringBoolean {
                size: DEFAULT_MAX_EXPANSIONS,
            },
        }
    }

    /// Set the maximum edit distance.
    pub fn max_edits(mut self, max_edits: u32) -> Self {
        self.max_edits = max_edits;
        self
    }

    /// Set the minimum prefix length that must match exactly.
    pub fn prefix_length(mut self, prefix_length: u32) -> Self {
        self.prefix_length = prefix_length;
        self
    }

    /// Set whether transpositions count as one edit.
    pub fn transpositions(mut self, transpositions: bool) -> Self {
        self.transpositions = transpositions;
        self
    }

    /// Set the number of terms to expand to; also resets the rewrite method
    /// to keep that many top-scoring terms.
    pub fn max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions;
        self.rewrite_method = RewriteMethod::TopTermsScoringBoolean {
            size: max_expansions,
        };
        self
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

    pub fn get_max_edits(&self) -> u32 {
        self.max_edits
    }

    pub fn get_prefix_length(&self) -> u32 {
        self.prefix_length
    }

    pub fn get_transpositions(&self) -> bool {
        self.transpositions
    }

    pub fn get_max_expansions(&self) -> usize {
        self.max_expansions
    }

    fn describe(&self) -> String {
        format!("{}~{}", self.term, self.max_edits)
    }
}

multi_term_query!(FuzzyQuery);

impl MultiTermQuery for FuzzyQuery {
    fn term_field(&self) -> &str {
        self.term.field()
    }

    fn terms_enum(&self, terms: &dyn Terms) -> Result<Box<dyn TermsEnum>> {
        if self.max_edits > MAXIMUM_SUPPORTED_DISTANCE {
            return Err(HastaError::invalid_argument(format!(
                "max_edits must be between 0 and {MAXIMUM_SUPPORTED_DISTANCE}"
            )));
        }
        if self.max_expansions == 0 {
            return Err(HastaError::invalid_argument("max_expansions must be positive"));
        }

        let text: Vec<char> = self.term.text().chars().collect();
        let inner = terms.iterator()?;
        if self.max_edits == 0 || self.prefix_length as usize >= text.len() {
            return Ok(Box::new(FilteredTermsEnum::new(
                inner,
                SingleTermAcceptor::new(self.term.text()),
            )));
        }
        Ok(Box::new(FilteredTermsEnum::new(
            inner,
            FuzzyAcceptor::new(
                text,
                self.prefix_length as usize,
                self.max_edits as usize,
                self.transpositions,
            ),
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

/// Accepts terms within the edit budget, shrinking the budget as a top-K
/// consumer reports that only closer terms can still compete.
struct FuzzyAcceptor {
    text: Vec<char>,
    prefix: String,
    max_edits: usize,
    transpositions: bool,
    bottom: f32,
    bottom_term: Option<String>,
}

impl FuzzyAcceptor {
    fn new(text: Vec<char>, prefix_length: usize, max_edits: usize, transpositions: bool) -> Self {
        let prefix = text[..prefix_length].iter().collect();
        FuzzyAcceptor {
            text,
            prefix,
            max_edits,
            transpositions,
            bottom: f32::NEG_INFINITY,
            bottom_term: None,
        }
    }

    /// Highest boost a term `edits` edits away can reach.
    fn max_boost(&self, edits: usize) -> f32 {
        1.0 - edits as f32 / self.text.len() as f32
    }

    fn bottom_changed(&mut self, term: &str) {
        // ties with the bottom lose when they sort after the bottom term
        let term_after = self
            .bottom_term
            .as_deref()
            .is_none_or(|bottom| term >= bottom);
        while self.max_edits > 0 {
            let reachable = self.max_boost(self.max_edits);
            let hopeless = if term_after {
                self.bottom >= reachable
            } else {
                self.bottom > reachable
            };
            if !hopeless {
                break;
            }
            self.max_edits -= 1;
        }
    }
}

impl TermAcceptor for FuzzyAcceptor {
    fn initial_seek(&self) -> String {
        self.prefix.clone()
    }

    fn accept(&mut self, term: &str, attributes: &mut TermAttributes) -> AcceptStatus {
        if !term.starts_with(&self.prefix) {
            return AcceptStatus::End;
        }
        if attributes.max_non_competitive_boost != self.bottom
            || attributes.competitive_term != self.bottom_term
        {
            self.bottom = attributes.max_non_competitive_boost;
            self.bottom_term = attributes.competitive_term.clone();
            self.bottom_changed(term);
        }

        let candidate: Vec<char> = term.chars().collect();
        let Some(edits) =
            edit_distance_within(&self.text, &candidate, self.max_edits, self.transpositions)
        else {
            return AcceptStatus::No;
        };
        if edits == 0 {
            attributes.boost = 1.0;
            return AcceptStatus::Yes;
        }
        let shortest = candidate.len().min(self.text.len());
        let similarity = 1.0 - edits as f32 / shortest as f32;
        if similarity > 0.0 {
            attributes.boost = similarity;
            AcceptStatus::Yes
        } else {
            AcceptStatus::No
        }
    }
}
