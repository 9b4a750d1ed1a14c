//! Range filters evaluated over per-document values instead of postings.

use std::sync::Arc;

use crate::error::Result;
use crate::index::doc_values::SortedSetDocValues;
use crate::index::reader::LeafReaderContext;
use crate::query::filter::Filter;
use crate::search::doc_id_set::{DocIdSet, FieldCacheDocIdSet};
use crate::util::bits::Bits;
use crate::util::numeric::{NumericType, NumericValue, sortable_range};

#[derive(Debug, Clone, PartialEq)]
enum RangeBounds {
    Text {
        lower: Option<String>,
        upper: Option<String>,
    },
    Numeric {
        numeric_type: NumericType,
        lower: Option<NumericValue>,
        upper: Option<NumericValue>,
    },
}

/// Accepts documents whose value of a field lies in a range.
///
/// Text ranges compare the smallest term of each document through the
/// field's ordinals; numeric ranges compare the field's numeric doc values.
/// Documents without a value never match. Every document is checked, so
/// this pays off over postings-based ranges when the range covers many
/// terms. A `None` bound is open.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCacheRangeFilter {
    field: String,
    bounds: RangeBounds,
    include_lower: bool,
    include_upper: bool,
}

impl FieldCacheRangeFilter {
    pub fn new_string_range<F: Into<String>>(
        field: F,
        lower: Option<&str>,
        upper: Option<&str>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        FieldCacheRangeFilter {
            field: field.into(),
            bounds: RangeBounds::Text {
                lower: lower.map(str::to_string),
                upper: upper.map(str::to_string),
            },
            include_lower,
            include_upper,
        }
    }

    fn numeric<F: Into<String>>(
        field: F,
        numeric_type: NumericType,
        lower: Option<NumericValue>,
        upper: Option<NumericValue>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        FieldCacheRangeFilter {
            field: field.into(),
            bounds: RangeBounds::Numeric {
                numeric_type,
                lower,
                upper,
            },
            include_lower,
            include_upper,
        }
    }

    pub fn new_int_range<F: Into<String>>(
        field: F,
        lower: Option<i32>,
        upper: Option<i32>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        let (lower, upper) = (lower.map(NumericValue::Int), upper.map(NumericValue::Int));
        Self::numeric(field, NumericType::Int, lower, upper, include_lower, include_upper)
    }

    pub fn new_long_range<F: Into<String>>(
        field: F,
        lower: Option<i64>,
        upper: Option<i64>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        let (lower, upper) = (lower.map(NumericValue::Long), upper.map(NumericValue::Long));
        Self::numeric(field, NumericType::Long, lower, upper, include_lower, include_upper)
    }

    pub fn new_float_range<F: Into<String>>(
        field: F,
        lower: Option<f32>,
        upper: Option<f32>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        let (lower, upper) = (lower.map(NumericValue::Float), upper.map(NumericValue::Float));
        Self::numeric(field, NumericType::Float, lower, upper, include_lower, include_upper)
    }

    pub fn new_double_range<F: Into<String>>(
        field: F,
        lower: Option<f64>,
        upper: Option<f64>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        let (lower, upper) = (lower.map(NumericValue::Double), upper.map(NumericValue::Double));
        Self::numeric(field, NumericType::Double, lower, upper, include_lower, include_upper)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn includes_lower(&self) -> bool {
        self.include_lower
    }

    pub fn includes_upper(&self) -> bool {
        self.include_upper
    }

    /// Inclusive ordinal bounds of a text range, or `None` if no ordinal
    /// can match.
    fn ord_range(
        &self,
        values: &dyn SortedSetDocValues,
        lower: Option<&str>,
        upper: Option<&str>,
    ) -> Option<(i64, i64)> {
        let lower = match lower.map(|text| lookup_term(values, text)) {
            None => 0,
            Some(Ok(ord)) if self.include_lower => ord,
            Some(Ok(ord)) => ord + 1,
            Some(Err(insertion)) => insertion,
        };
        let upper = match upper.map(|text| lookup_term(values, text)) {
            None => i64::MAX,
            Some(Ok(ord)) if self.include_upper => ord,
            Some(Ok(ord)) => ord - 1,
            Some(Err(insertion)) => insertion - 1,
        };
        (upper >= 0 && lower <= upper).then_some((lower, upper))
    }
}

/// Binary search of the ordinal dictionary: `Ok(ord)` if `text` is present,
/// otherwise `Err` with the ordinal it would be inserted at.
fn lookup_term(values: &dyn SortedSetDocValues, text: &str) -> std::result::Result<i64, i64> {
    let (mut low, mut high) = (0i64, values.value_count() - 1);
    while low <= high {
        let mid = low + (high - low) / 2;
        match values.lookup_ord(mid).map(|term| term.cmp(text)) {
            Some(std::cmp::Ordering::Less) => low = mid + 1,
            Some(std::cmp::Ordering::Greater) | None => high = mid - 1,
            Some(std::cmp::Ordering::Equal) => return Ok(mid),
        }
    }
    Err(low)
}

impl Filter for FieldCacheRangeFilter {
    fn doc_id_set(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Arc<dyn DocIdSet>>> {
        let max_doc = context.reader.max_doc();
        match &self.bounds {
            RangeBounds::Text { lower, upper } => {
                let Some(values) = context.reader.sorted_set_doc_values(&self.field)? else {
                    return Ok(None);
                };
                let Some((lower, upper)) =
                    self.ord_range(values.as_ref(), lower.as_deref(), upper.as_deref())
                else {
                    return Ok(None);
                };
                Ok(Some(Arc::new(FieldCacheDocIdSet::new(
                    max_doc,
                    accept_docs,
                    move |doc| {
                        values
                            .ords(doc)
                            .first()
                            .is_some_and(|&ord| ord >= lower && ord <= upper)
                    },
                ))))
            }
            RangeBounds::Numeric {
                numeric_type,
                lower,
                upper,
            } => {
                let Some((lower, upper)) = sortable_range(
                    *numeric_type,
                    *lower,
                    *upper,
                    self.include_lower,
                    self.include_upper,
                )
                .filter(|(lower, upper)| lower <= upper) else {
                    return Ok(None);
                };
                let Some(values) = context.reader.numeric_doc_values(&self.field)? else {
                    return Ok(None);
                };
                Ok(Some(Arc::new(FieldCacheDocIdSet::new(
                    max_doc,
                    accept_docs,
                    move |doc| {
                        values.has_value(doc) && (lower..=upper).contains(&values.get(doc))
                    },
                ))))
            }
        }
    }

    fn description(&self) -> String {
        let (lower, upper) = match &self.bounds {
            RangeBounds::Text { lower, upper } => (lower.clone(), upper.clone()),
            RangeBounds::Numeric { lower, upper, .. } => (
                lower.map(|value| value.to_string()),
                upper.map(|value| value.to_string()),
            ),
        };
        format!(
            "{}:{}{} TO {}{}",
            self.field,
            if self.include_lower { '[' } else { '{' },
            lower.as_deref().unwrap_or("*"),
            upper.as_deref().unwrap_or("*"),
            if self.include_upper { ']' } else { '}' },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DocId;
    use crate::index::memory::{MemoryDocument, MemorySegment, MemorySegmentBuilder};
    use crate::index::reader::{IndexReader, LeafReader};
    use crate::search::doc_id_set::NO_MORE_DOCS;
    use crate::util::bits::FixedBitSet;

    fn index() -> Arc<MemorySegment> {
        let mut builder = MemorySegmentBuilder::new();
        let rows: [(&str, Option<i64>, f64); 5] = [
            ("apple", Some(-5), 0.5),
            ("banana", Some(0), -1.0),
            ("cherry", None, 2.5),
            ("date", Some(12), f64::NAN),
            ("elder", Some(i64::MAX), 1e10),
        ];
        for (name, count, weight) in rows {
            let mut document = MemoryDocument::new()
                .field("name", name)
                .numeric("weight", NumericValue::Double(weight));
            if let Some(count) = count {
                document = document.numeric("count", NumericValue::Long(count));
            }
            builder.add_document(document);
        }
        builder.build()
    }

    fn matching(filter: &FieldCacheRangeFilter, accept: Option<Arc<dyn Bits>>) -> Vec<DocId> {
        let segments: Vec<Arc<dyn LeafReader>> = vec![index()];
        let reader = IndexReader::new(segments);
        let Some(set) = filter.doc_id_set(&reader.leaves()[0], accept).unwrap() else {
            return Vec::new();
        };
        let mut iter = set.iterator().unwrap();
        let mut docs = Vec::new();
        let mut doc = iter.next_doc();
        while doc != NO_MORE_DOCS {
            docs.push(doc);
            doc = iter.next_doc();
        }
        docs
    }

    #[test]
    fn test_string_ranges() {
        let filter = FieldCacheRangeFilter::new_string_range("name", Some("banana"), Some("date"), true, true);
        assert_eq!(matching(&filter, None), vec![1, 2, 3]);

        let filter = FieldCacheRangeFilter::new_string_range("name", Some("banana"), Some("date"), false, false);
        assert_eq!(matching(&filter, None), vec![2]);

        // bounds between terms
        let filter = FieldCacheRangeFilter::new_string_range("name", Some("b"), Some("d"), false, false);
        assert_eq!(matching(&filter, None), vec![1, 2]);

        let filter = FieldCacheRangeFilter::new_string_range("name", None, Some("apple"), true, false);
        assert!(matching(&filter, None).is_empty());

        let filter = FieldCacheRangeFilter::new_string_range("name", Some("cherry"), None, true, true);
        assert_eq!(matching(&filter, None), vec![2, 3, 4]);

        let filter = FieldCacheRangeFilter::new_string_range("name", Some("zzz"), None, true, true);
        assert!(matching(&filter, None).is_empty());
    }

    #[test]
    fn test_numeric_ranges_skip_missing_values() {
        let filter = FieldCacheRangeFilter::new_long_range("count", Some(-5), Some(12), true, false);
        assert_eq!(matching(&filter, None), vec![0, 1]);

        let filter = FieldCacheRangeFilter::new_long_range("count", None, None, true, true);
        assert_eq!(matching(&filter, None), vec![0, 1, 3, 4]);

        let filter = FieldCacheRangeFilter::new_long_range("count", Some(i64::MAX), None, false, true);
        assert!(matching(&filter, None).is_empty());

        let filter = FieldCacheRangeFilter::new_long_range("count", Some(5), Some(5), true, true);
        assert!(matching(&filter, None).is_empty());
    }

    #[test]
    fn test_double_range_excludes_nan() {
        let filter = FieldCacheRangeFilter::new_double_range("weight", Some(-1.0), None, false, true);
        assert_eq!(matching(&filter, None), vec![0, 2, 4]);

        let filter = FieldCacheRangeFilter::new_double_range("weight", None, Some(1.0), true, true);
        assert_eq!(matching(&filter, None), vec![0, 1]);
    }

    #[test]
    fn test_accept_docs_and_random_access() {
        let mut accept = FixedBitSet::with_all_set(5);
        accept.clear(1);
        let filter = FieldCacheRangeFilter::new_long_range("count", None, Some(100), true, true);
        assert_eq!(matching(&filter, Some(Arc::new(accept.clone()))), vec![0, 3]);

        let segments: Vec<Arc<dyn LeafReader>> = vec![index()];
        let reader = IndexReader::new(segments);
        let set = filter
            .doc_id_set(&reader.leaves()[0], Some(Arc::new(accept)))
            .unwrap()
            .unwrap();
        let bits = set.bits().unwrap();
        let random: Vec<bool> = (0..5).map(|doc| bits.get(doc)).collect();
        assert_eq!(random, vec![true, false, false, true, false]);
    }

    #[test]
    fn test_missing_field_and_description() {
        let filter = FieldCacheRangeFilter::new_int_range("absent", Some(1), None, true, true);
        assert!(matching(&filter, None).is_empty());
        assert_eq!(filter.description(), "absent:[1 TO *]");

        let filter = FieldCacheRangeFilter::new_float_range("w", None, Some(2.5), false, false);
        assert_eq!(filter.description(), "w:{* TO 2.5}");
        let filter = FieldCacheRangeFilter::new_string_range("name", Some("a"), Some("b"), true, false);
        assert_eq!(filter.description(), "name:[a TO b}");
    }
}
