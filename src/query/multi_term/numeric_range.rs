//! Range query over a trie-encoded numeric field.

use std::collections::VecDeque;

use crate::error::{HastaError, Result};
use crate::index::terms::{TermAttributes, Terms, TermsEnum};
use crate::query::multi_term::{AcceptStatus, FilteredTermsEnum, MultiTermQuery, TermAcceptor};
use crate::query::rewrite::RewriteMethod;
use crate::util::numeric::{
    NumericType, NumericValue, PRECISION_STEP_DEFAULT, sortable_range, split_int_range,
    split_long_range,
};

/// Matches documents whose numeric field lies between two bounds.
///
/// The field must have been indexed with the same precision step; a `None`
/// bound is open. Floating point ranges without a lower (upper) bound start
/// at negative (end at positive) infinity, so NaN only matches when it is
/// an explicit bound.
#[derive(Debug, Clone)]
pub struct NumericRangeQuery {
    field: String,
    numeric_type: NumericType,
    precision_step: u32,
    min: Option<NumericValue>,
    max: Option<NumericValue>,
    min_inclusive: bool,
    max_inclusive: bool,
    boost: f32,
    rewrite_method: RewriteMethod,
}

impl NumericRangeQuery {
    fn build<F: Into<String>>(
        field: F,
        numeric_type: NumericType,
        precision_step: u32,
        min: Option<NumericValue>,
        max: Option<NumericValue>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> Result<Self> {
        if precision_step < 1 {
            return Err(HastaError::invalid_argument("precisionStep must be >=1"));
        }
        Ok(NumericRangeQuery {
            field: field.into(),
            numeric_type,
            precision_step,
            min,
            max,
            min_inclusive,
            max_inclusive,
            boost: 1.0,
            rewrite_method: RewriteMethod::default(),
        })
    }

    pub fn new_int_range<F: Into<String>>(
        field: F,
        precision_step: u32,
        min: Option<i32>,
        max: Option<i32>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> Result<Self> {
        Self::build(
            field,
            NumericType::Int,
            precision_step,
            min.map(NumericValue::Int),
            max.map(NumericValue::Int),
            min_inclusive,
            max_inclusive,
        )
    }

    pub fn new_long_range<F: Into<String>>(
        field: F,
        precision_step: u32,
        min: Option<i64>,
        max: Option<i64>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> Result<Self> {
        Self::build(
            field,
            NumericType::Long,
            precision_step,
            min.map(NumericValue::Long),
            max.map(NumericValue::Long),
            min_inclusive,
            max_inclusive,
        )
    }

    pub fn new_float_range<F: Into<String>>(
        field: F,
        precision_step: u32,
        min: Option<f32>,
        max: Option<f32>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> Result<Self> {
        Self::build(
            field,
            NumericType::Float,
            precision_step,
            min.map(NumericValue::Float),
            max.map(NumericValue::Float),
            min_inclusive,
            max_inclusive,
        )
    }

    pub fn new_double_range<F: Into<String>>(
        field: F,
        precision_step: u32,
        min: Option<f64>,
        max: Option<f64>,
        min_inclusive: bool,
        max_inclusive: bool,
    ) -> Result<Self> {
        Self::build(
            field,
            NumericType::Double,
            precision_step,
            min.map(NumericValue::Double),
            max.map(NumericValue::Double),
            min_inclusive,
            max_inclusive,
        )
    }

    /// An int range with the default precision step.
    pub fn int_range<F: Into<String>>(field: F, min: Option<i32>, max: Option<i32>) -> Self {
        NumericRangeQuery {
            field: field.into(),
            numeric_type: NumericType::Int,
            precision_step: PRECISION_STEP_DEFAULT,
            min: min.map(NumericValue::Int),
            max: max.map(NumericValue::Int),
            min_inclusive: true,
            max_inclusive: true,
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

    pub fn numeric_type(&self) -> NumericType {
        self.numeric_type
    }

    pub fn precision_step(&self) -> u32 {
        self.precision_step
    }

    pub fn min(&self) -> Option<NumericValue> {
        self.min
    }

    pub fn max(&self) -> Option<NumericValue> {
        self.max
    }

    pub fn includes_min(&self) -> bool {
        self.min_inclusive
    }

    pub fn includes_max(&self) -> bool {
        self.max_inclusive
    }

    fn describe(&self) -> String {
        let bound = |value: Option<NumericValue>| value.map_or("*".to_string(), |v| v.to_string());
        format!(
            "{}:{}{} TO {}{}",
            self.field,
            if self.min_inclusive { '[' } else { '{' },
            bound(self.min),
            bound(self.max),
            if self.max_inclusive { ']' } else { '}' },
        )
    }
}

multi_term_query!(NumericRangeQuery);

impl MultiTermQuery for NumericRangeQuery {
    fn term_field(&self) -> &str {
        &self.field
    }

    fn terms_enum(&self, terms: &dyn Terms) -> Result<Box<dyn TermsEnum>> {
        let mut bounds = VecDeque::new();
        let range = sortable_range(
            self.numeric_type,
            self.min,
            self.max,
            self.min_inclusive,
            self.max_inclusive,
        );
        if let Some((min, max)) = range {
            let mut add = |lower: String, upper: String| bounds.push_back((lower, upper));
            match self.numeric_type.value_size() {
                32 => split_int_range(self.precision_step, min as i32, max as i32, &mut add),
                _ => split_long_range(self.precision_step, min, max, &mut add),
            }
        }
        Ok(Box::new(FilteredTermsEnum::new(
            terms.iterator()?,
            SubRangeAcceptor {
                bounds,
                current_upper: None,
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

/// Walks the sorted trie sub-ranges of a numeric range, seeking over the
/// gaps between them.
struct SubRangeAcceptor {
    bounds: VecDeque<(String, String)>,
    current_upper: Option<String>,
}

impl SubRangeAcceptor {
    fn next_range(&mut self) -> Option<String> {
        let (lower, upper) = self.bounds.pop_front()?;
        self.current_upper = Some(upper);
        Some(lower)
    }
}

impl TermAcceptor for SubRangeAcceptor {
    fn initial_seek(&self) -> String {
        self.bounds
            .front()
            .map(|(lower, _)| lower.clone())
            .unwrap_or_default()
    }

    fn accept(&mut self, term: &str, _attributes: &mut TermAttributes) -> AcceptStatus {
        loop {
            if self
                .current_upper
                .as_deref()
                .is_some_and(|upper| term <= upper)
            {
                return AcceptStatus::Yes;
            }
            let Some((lower, _)) = self.bounds.front() else {
                return AcceptStatus::End;
            };
            if term < lower.as_str() {
                return AcceptStatus::NoAndSeek;
            }
            self.next_range();
        }
    }

    fn next_seek(&mut self, current: &str) -> Option<String> {
        while let Some(lower) = self.next_range() {
            if self
                .current_upper
                .as_deref()
                .is_some_and(|upper| current > upper)
            {
                continue;
            }
            return Some(if current > lower.as_str() {
                current.to_string()
            } else {
                lower
            });
        }
        self.current_upper = None;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::{MemoryDocument, MemorySegmentBuilder};
    use crate::index::reader::{IndexReader, LeafReader};
    use crate::query::Query;
    use crate::query::multi_term::test_support::drain_terms;
    use crate::search::searcher::IndexSearcher;
    use std::sync::Arc;

    fn int_searcher(values: &[i32], step: u32) -> IndexSearcher {
        let mut builder = MemorySegmentBuilder::new();
        for &value in values {
            builder.add_document(MemoryDocument::new().numeric_with_step(
                "n",
                NumericValue::Int(value),
                step,
            ));
        }
        let segments: Vec<Arc<dyn LeafReader>> = vec![builder.build()];
        IndexSearcher::new(Arc::new(IndexReader::new(segments)))
    }

    fn matching(searcher: &IndexSearcher, query: &NumericRangeQuery) -> Vec<i32> {
        let mut docs: Vec<i32> = searcher
            .search(query, 10_000)
            .unwrap()
            .score_docs
            .iter()
            .map(|hit| hit.doc)
            .collect();
        docs.sort_unstable();
        docs
    }

    #[test]
    fn test_int_range_bounds() {
        let values: Vec<i32> = (-300..300).step_by(7).collect();
        let searcher = int_searcher(&values, 4);
        let docs_between = |lo: i32, hi: i32| -> Vec<i32> {
            values
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v >= lo && v <= hi)
                .map(|(doc, _)| doc as i32)
                .collect()
        };

        let inclusive = NumericRangeQuery::new_int_range("n", 4, Some(-20), Some(99), true, true).unwrap();
        assert_eq!(matching(&searcher, &inclusive), docs_between(-20, 99));

        // both bounds are indexed values
        let exclusive = NumericRangeQuery::new_int_range("n", 4, Some(-20), Some(99), false, false).unwrap();
        assert_eq!(matching(&searcher, &exclusive), docs_between(-19, 98));

        let open_below = NumericRangeQuery::new_int_range("n", 4, None, Some(-250), true, true).unwrap();
        assert_eq!(matching(&searcher, &open_below), docs_between(i32::MIN, -250));

        let everything = NumericRangeQuery::int_range("n", None, None);
        assert_eq!(matching(&searcher, &everything).len(), values.len());
    }

    #[test]
    fn test_empty_ranges() {
        let searcher = int_searcher(&[1, 2, 3, i32::MAX], 8);
        let inverted = NumericRangeQuery::new_int_range("n", 8, Some(3), Some(1), true, true).unwrap();
        assert!(matching(&searcher, &inverted).is_empty());

        let point = NumericRangeQuery::new_int_range("n", 8, Some(2), Some(2), false, true).unwrap();
        assert!(matching(&searcher, &point).is_empty());

        let above_max = NumericRangeQuery::new_int_range("n", 8, Some(i32::MAX), None, false, true).unwrap();
        assert!(matching(&searcher, &above_max).is_empty());

        let at_max = NumericRangeQuery::new_int_range("n", 8, Some(i32::MAX), None, true, true).unwrap();
        assert_eq!(matching(&searcher, &at_max), vec![3]);
    }

    #[test]
    fn test_double_range_excludes_nan_unless_bounded() {
        let mut builder = MemorySegmentBuilder::new();
        for value in [-1.5, 0.0, 2.25, f64::INFINITY, f64::NAN] {
            builder.add_document(MemoryDocument::new().numeric("d", NumericValue::Double(value)));
        }
        let segments: Vec<Arc<dyn LeafReader>> = vec![builder.build()];
        let searcher = IndexSearcher::new(Arc::new(IndexReader::new(segments)));

        let query = NumericRangeQuery::new_double_range("d", 4, Some(-1.5), Some(2.25), false, true).unwrap();
        assert_eq!(matching(&searcher, &query), vec![1, 2]);

        let open = NumericRangeQuery::new_double_range("d", 4, None, None, true, true).unwrap();
        assert_eq!(matching(&searcher, &open).len(), 4);

        let nan = NumericRangeQuery::new_double_range("d", 4, Some(f64::NAN), Some(f64::NAN), true, true).unwrap();
        assert_eq!(matching(&searcher, &nan), vec![4]);
    }

    #[test]
    fn test_terms_enum_visits_few_terms() {
        let values: Vec<i32> = (0..4096).collect();
        let mut builder = MemorySegmentBuilder::new();
        for &value in &values {
            builder.add_document(MemoryDocument::new().numeric_with_step("n", NumericValue::Int(value), 4));
        }
        let segment = builder.build();
        let terms = segment.terms("n").unwrap().unwrap();

        let query = NumericRangeQuery::new_int_range("n", 4, Some(17), Some(4000), true, true).unwrap();
        let mut te = query.terms_enum(terms.as_ref()).unwrap();
        let accepted = drain_terms(te.as_mut());
        // far fewer terms than the 3984 values covered
        assert!(accepted.len() < 100, "{} terms", accepted.len());
        let covered: i32 = accepted
            .iter()
            .map(|term| {
                let mut te = terms.iterator().unwrap();
                assert!(te.seek_exact(term).unwrap());
                te.doc_freq()
            })
            .sum();
        assert_eq!(covered, 4000 - 17 + 1);
    }

    #[test]
    fn test_description_and_validation() {
        let query = NumericRangeQuery::new_double_range("price", 4, Some(1.0), None, true, false)
            .unwrap()
            .with_boost(2.0);
        assert_eq!(query.description(), "price:[1.0 TO *}^2.0");
        let query = NumericRangeQuery::new_long_range("n", 8, None, Some(5), false, true).unwrap();
        assert_eq!(query.description(), "n:{* TO 5]");
        assert!(NumericRangeQuery::new_int_range("n", 0, None, None, true, true).is_err());
    }
}
