//! Term dictionary enumeration API.
//!
//! A [`Terms`] is the dictionary of one field in one segment; a [`TermsEnum`]
//! walks it in ascending code-point order. Statistics that a codec cannot
//! provide are reported as `-1`.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::index::postings::{PostingsEnum, PostingsFlags};
use crate::util::bits::Bits;

/// Outcome of [`TermsEnum::seek_ceil`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStatus {
    /// No term is greater than or equal to the target.
    End,
    /// The exact term was found.
    Found,
    /// Positioned on the smallest term greater than the target.
    NotFound,
}

/// Opaque resume state for a term, used to re-position an enum without a
/// dictionary lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermState {
    /// Ordinal of the term within its segment dictionary.
    pub ord: i64,
    /// Number of documents containing the term.
    pub doc_freq: i32,
    /// Total occurrences of the term, or -1 if unknown.
    pub total_term_freq: i64,
}

/// Attribute channel shared between a term enumerator and whoever consumes it.
///
/// The enumerator writes `boost` for each accepted term. A top-K consumer
/// writes back the boost below which no further term can be competitive and
/// the term holding that boost, so that the enumerator may narrow its search.
#[derive(Debug, Clone, PartialEq)]
pub struct TermAttributes {
    /// Boost of the current term.
    pub boost: f32,
    /// Boost a new term must beat to enter a full top-K queue.
    pub max_non_competitive_boost: f32,
    /// The least competitive term in a full top-K queue.
    pub competitive_term: Option<String>,
}

impl Default for TermAttributes {
    fn default() -> Self {
        TermAttributes {
            boost: 1.0,
            max_non_competitive_boost: f32::NEG_INFINITY,
            competitive_term: None,
        }
    }
}

/// Iterator over terms in a field's term dictionary.
pub trait TermsEnum: Send {
    /// Advance to the next term. Returns `None` when the dictionary is exhausted.
    fn next(&mut self) -> Result<Option<String>>;

    /// The current term, if positioned.
    fn term(&self) -> Option<&str>;

    /// Position on the smallest term greater than or equal to `text`.
    fn seek_ceil(&mut self, text: &str) -> Result<SeekStatus>;

    /// Position on `text` if it exists.
    fn seek_exact(&mut self, text: &str) -> Result<bool> {
        Ok(self.seek_ceil(text)? == SeekStatus::Found)
    }

    /// Position on `text` using a state previously taken from [`TermsEnum::term_state`].
    fn seek_exact_state(&mut self, text: &str, state: &TermState) -> Result<()>;

    /// Ordinal of the current term, if the dictionary supports ordinals.
    fn ord(&self) -> Option<i64>;

    /// Number of documents containing the current term.
    fn doc_freq(&self) -> i32;

    /// Total occurrences of the current term, or -1 if unknown.
    fn total_term_freq(&self) -> i64;

    /// Resume state of the current term.
    fn term_state(&self) -> TermState;

    /// Postings of the current term, skipping documents not set in `live_docs`.
    fn postings(
        &self,
        live_docs: Option<Arc<dyn Bits>>,
        flags: PostingsFlags,
    ) -> Result<Box<dyn PostingsEnum>>;

    /// Attributes of the current term.
    fn attributes(&self) -> &TermAttributes;

    /// Mutable attributes, for consumers that report back to the enumerator.
    fn attributes_mut(&mut self) -> &mut TermAttributes;
}

/// Access to the term dictionary of one field in one segment.
pub trait Terms: Send + Sync + Debug {
    /// Get an iterator over all terms in this field.
    fn iterator(&self) -> Result<Box<dyn TermsEnum>>;

    /// Number of unique terms, or -1 if unknown.
    fn size(&self) -> i64;

    /// Number of documents with at least one term in this field, or -1.
    fn doc_count(&self) -> i32;

    /// Sum of document frequencies across all terms, or -1.
    fn sum_doc_freq(&self) -> i64;

    /// Sum of total term frequencies across all terms, or -1.
    fn sum_total_term_freq(&self) -> i64;

    /// Check if this field has positions stored.
    fn has_positions(&self) -> bool {
        false
    }
}
