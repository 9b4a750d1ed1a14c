//! Per-document value lookups.

use std::fmt::Debug;

use crate::error::Result;
use crate::index::DocId;
use crate::index::terms::TermsEnum;

/// One integer per document: field-length norms, or the sortable form of a
/// numeric field (see [`NumericValue::to_sortable`]).
///
/// [`NumericValue::to_sortable`]: crate::util::numeric::NumericValue::to_sortable
pub trait NumericDocValues: Send + Sync + Debug {
    /// Value for `doc`, or 0 when the document has no value.
    fn get(&self, doc: DocId) -> i64;

    /// Whether `doc` has a value at all.
    fn has_value(&self, _doc: DocId) -> bool {
        true
    }
}

/// Term ordinals per document for a sorted, possibly multi-valued field.
pub trait SortedSetDocValues: Send + Sync + Debug {
    /// Ordinals of `doc` in ascending order; empty when the document has none.
    fn ords(&self, doc: DocId) -> &[i64];

    /// Number of distinct ordinals in the field.
    fn value_count(&self) -> i64;

    /// Term text for `ord`.
    fn lookup_ord(&self, ord: i64) -> Option<&str>;

    /// Enumerate the ordinal dictionary; [`TermsEnum::ord`] reports the ordinal.
    fn terms_enum(&self) -> Result<Box<dyn TermsEnum>>;
}
