//! Sorting search results by field values.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{HastaError, Result};
use crate::index::DocId;
use crate::index::doc_values::{NumericDocValues, SortedSetDocValues};
use crate::index::reader::LeafReaderContext;
use crate::search::collector::Collector;
use crate::search::scorer::Scorer;
use crate::util::numeric::{NumericType, NumericValue};

/// What a [`SortField`] sorts by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortFieldType {
    /// Relevance; higher scores first unless reversed.
    Score,
    /// Index order.
    Doc,
    /// Term text of a sorted field, documents without a value first.
    String(String),
    /// Numeric doc values read as 32-bit integers.
    Int(String),
    /// Numeric doc values read as 64-bit integers.
    Long(String),
    /// Numeric doc values read as 32-bit floats.
    Float(String),
    /// Numeric doc values read as 64-bit floats.
    Double(String),
}

impl SortFieldType {
    /// The value type of a numeric sort.
    pub fn numeric_type(&self) -> Option<NumericType> {
        match self {
            SortFieldType::Int(_) => Some(NumericType::Int),
            SortFieldType::Long(_) => Some(NumericType::Long),
            SortFieldType::Float(_) => Some(NumericType::Float),
            SortFieldType::Double(_) => Some(NumericType::Double),
            SortFieldType::Score | SortFieldType::Doc | SortFieldType::String(_) => None,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            SortFieldType::Score | SortFieldType::Doc => None,
            SortFieldType::String(field)
            | SortFieldType::Int(field)
            | SortFieldType::Long(field)
            | SortFieldType::Float(field)
            | SortFieldType::Double(field) => Some(field),
        }
    }
}

/// One criterion of a [`Sort`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub kind: SortFieldType,
    pub reverse: bool,
    /// Value of numeric sorts for documents without one; zero when unset.
    #[serde(default)]
    pub missing_value: Option<NumericValue>,
}

impl SortField {
    fn of(kind: SortFieldType) -> Self {
        SortField {
            kind,
            reverse: false,
            missing_value: None,
        }
    }

    pub fn score() -> Self {
        Self::of(SortFieldType::Score)
    }

    pub fn doc() -> Self {
        Self::of(SortFieldType::Doc)
    }

    pub fn string(field: &str) -> Self {
        Self::of(SortFieldType::String(field.to_string()))
    }

    /// Sort by the numeric doc values of `field` read as `numeric_type`.
    pub fn numeric(field: &str, numeric_type: NumericType) -> Self {
        let field = field.to_string();
        Self::of(match numeric_type {
            NumericType::Int => SortFieldType::Int(field),
            NumericType::Long => SortFieldType::Long(field),
            NumericType::Float => SortFieldType::Float(field),
            NumericType::Double => SortFieldType::Double(field),
        })
    }

    /// Use `value` for documents without a value. Only numeric sorts take
    /// one, and it must match their type.
    pub fn with_missing_value(mut self, value: NumericValue) -> Result<Self> {
        match self.kind.numeric_type() {
            Some(numeric_type) if numeric_type == value.numeric_type() => {
                self.missing_value = Some(value);
                Ok(self)
            }
            Some(numeric_type) => Err(HastaError::invalid_argument(format!(
                "missing value {value} does not match sort type {numeric_type:?}"
            ))),
            None => Err(HastaError::invalid_argument(
                "missing values are only supported for numeric sorts",
            )),
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }

    fn needs_scores(&self) -> bool {
        self.kind == SortFieldType::Score
    }

    /// Whether smaller values sort first.
    fn ascending(&self) -> bool {
        match self.kind {
            SortFieldType::Score => self.reverse,
            _ => !self.reverse,
        }
    }

    fn missing_numeric(&self, numeric_type: NumericType) -> NumericValue {
        self.missing_value.unwrap_or_else(|| numeric_type.decode(0))
    }
}

/// Ordered list of sort criteria; ties fall back to doc id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub fields: Vec<SortField>,
}

impl Sort {
    pub fn new(fields: Vec<SortField>) -> Self {
        Sort { fields }
    }

    /// Sort by relevance.
    pub fn relevance() -> Self {
        Sort::new(vec![SortField::score()])
    }

    /// Sort by index order.
    pub fn index_order() -> Self {
        Sort::new(vec![SortField::doc()])
    }

    pub fn needs_scores(&self) -> bool {
        self.fields.iter().any(SortField::needs_scores)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|field| {
                let mut name = match &field.kind {
                    SortFieldType::Score => "<score>".to_string(),
                    SortFieldType::Doc => "<doc>".to_string(),
                    SortFieldType::String(name) => format!("<string: \"{name}\">"),
                    SortFieldType::Int(name) => format!("<int: \"{name}\">"),
                    SortFieldType::Long(name) => format!("<long: \"{name}\">"),
                    SortFieldType::Float(name) => format!("<float: \"{name}\">"),
                    SortFieldType::Double(name) => format!("<double: \"{name}\">"),
                };
                if field.reverse {
                    name.push('!');
                }
                if let Some(missing) = field.missing_value {
                    name.push_str(&format!(" missingValue={missing}"));
                }
                name
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Sort value of one hit for one [`SortField`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortValue {
    Score(f32),
    Doc(DocId),
    Text(Option<String>),
    Numeric(NumericValue),
}

impl SortValue {
    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Score(a), SortValue::Score(b)) => a.total_cmp(b),
            (SortValue::Doc(a), SortValue::Doc(b)) => a.cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            // NaN sorts above every other float, -0.0 below 0.0
            (SortValue::Numeric(a), SortValue::Numeric(b)) => a.to_sortable().cmp(&b.to_sortable()),
            _ => Ordering::Equal,
        }
    }
}

/// A hit with the values it was sorted by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDoc {
    pub doc: DocId,
    /// Score, NaN when scores were not tracked.
    pub score: f32,
    pub fields: Vec<SortValue>,
}

/// Result of a sorted search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopFieldDocs {
    pub total_hits: i64,
    pub score_docs: Vec<FieldDoc>,
    pub max_score: f32,
    pub sort: Sort,
}

#[derive(Debug)]
struct SortedEntry {
    doc: FieldDoc,
    ascending: Arc<[bool]>,
}

impl PartialEq for SortedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortedEntry {}

impl PartialOrd for SortedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortedEntry {
    /// Better hits compare less.
    fn cmp(&self, other: &Self) -> Ordering {
        for ((a, b), &ascending) in self
            .doc
            .fields
            .iter()
            .zip(&other.doc.fields)
            .zip(self.ascending.iter())
        {
            let order = a.compare(b);
            let order = if ascending { order } else { order.reverse() };
            if order != Ordering::Equal {
                return order;
            }
        }
        self.doc.doc.cmp(&other.doc.doc)
    }
}

/// Per-segment source of one sort field's values.
enum LeafValues {
    None,
    Sorted(Arc<dyn SortedSetDocValues>),
    Numeric(Arc<dyn NumericDocValues>),
}

/// Keeps the `n` best hits under a [`Sort`].
pub struct TopFieldCollector {
    sort: Sort,
    ascending: Arc<[bool]>,
    num_hits: usize,
    track_scores: bool,
    queue: BinaryHeap<SortedEntry>,
    total_hits: i64,
    max_score: f32,
    doc_base: DocId,
    values: Vec<LeafValues>,
}

impl fmt::Debug for TopFieldCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopFieldCollector")
            .field("sort", &self.sort.to_string())
            .field("num_hits", &self.num_hits)
            .field("total_hits", &self.total_hits)
            .finish()
    }
}

impl TopFieldCollector {
    /// Collector for the top `num_hits` hits under `sort`. Scores are
    /// computed when the sort needs them or `track_scores` is set.
    pub fn create(sort: Sort, num_hits: usize, track_scores: bool) -> Result<Self> {
        if num_hits == 0 {
            return Err(HastaError::invalid_argument("numHits must be > 0"));
        }
        if sort.fields.is_empty() {
            return Err(HastaError::invalid_argument("Sort must contain at least one field"));
        }
        let ascending: Arc<[bool]> = sort.fields.iter().map(SortField::ascending).collect();
        let track_scores = track_scores || sort.needs_scores();
        Ok(TopFieldCollector {
            values: sort.fields.iter().map(|_| LeafValues::None).collect(),
            sort,
            ascending,
            num_hits,
            track_scores,
            queue: BinaryHeap::new(),
            total_hits: 0,
            max_score: f32::NEG_INFINITY,
            doc_base: 0,
        })
    }

    pub fn total_hits(&self) -> i64 {
        self.total_hits
    }

    /// The collected hits in sort order.
    pub fn top_docs(&self) -> TopFieldDocs {
        let score_docs: Vec<FieldDoc> = self
            .queue
            .iter()
            .map(|entry| SortedEntry {
                doc: entry.doc.clone(),
                ascending: Arc::clone(&entry.ascending),
            })
            .collect::<BinaryHeap<_>>()
            .into_sorted_vec()
            .into_iter()
            .map(|entry| entry.doc)
            .collect();
        let max_score = if self.track_scores && self.total_hits > 0 {
            self.max_score
        } else {
            f32::NAN
        };
        TopFieldDocs {
            total_hits: self.total_hits,
            score_docs,
            max_score,
            sort: self.sort.clone(),
        }
    }

    fn sort_values(&self, doc: DocId, score: f32) -> Vec<SortValue> {
        self.sort
            .fields
            .iter()
            .zip(&self.values)
            .map(|(field, values)| match (&field.kind, values) {
                (SortFieldType::Score, _) => SortValue::Score(score),
                (SortFieldType::Doc, _) => SortValue::Doc(self.doc_base + doc),
                (SortFieldType::String(_), LeafValues::Sorted(values)) => SortValue::Text(
                    values
                        .ords(doc)
                        .first()
                        .and_then(|&ord| values.lookup_ord(ord))
                        .map(str::to_string),
                ),
                (SortFieldType::String(_), _) => SortValue::Text(None),
                (kind, values) => {
                    let numeric_type = kind.numeric_type().unwrap_or(NumericType::Long);
                    SortValue::Numeric(match values {
                        LeafValues::Numeric(values) if values.has_value(doc) => {
                            numeric_type.decode(values.get(doc))
                        }
                        _ => field.missing_numeric(numeric_type),
                    })
                }
            })
            .collect()
    }
}

impl Collector for TopFieldCollector {
    fn set_next_reader(&mut self, context: &LeafReaderContext) -> Result<()> {
        self.doc_base = context.doc_base;
        for (slot, field) in self.values.iter_mut().zip(&self.sort.fields) {
            *slot = match &field.kind {
                SortFieldType::Score | SortFieldType::Doc => LeafValues::None,
                SortFieldType::String(name) => context
                    .reader
                    .sorted_set_doc_values(name)?
                    .map_or(LeafValues::None, LeafValues::Sorted),
                SortFieldType::Int(name)
                | SortFieldType::Long(name)
                | SortFieldType::Float(name)
                | SortFieldType::Double(name) => context
                    .reader
                    .numeric_doc_values(name)?
                    .map_or(LeafValues::None, LeafValues::Numeric),
            };
        }
        Ok(())
    }

    fn collect(&mut self, doc: DocId, scorer: &dyn Scorer) -> Result<()> {
        self.total_hits += 1;
        let score = if self.track_scores {
            let score = scorer.score();
            self.max_score = self.max_score.max(score);
            score
        } else {
            f32::NAN
        };

        let entry = SortedEntry {
            doc: FieldDoc {
                doc: self.doc_base + doc,
                score,
                fields: self.sort_values(doc, score),
            },
            ascending: Arc::clone(&self.ascending),
        };
        if self.queue.len() < self.num_hits {
            self.queue.push(entry);
        } else if self.queue.peek().is_some_and(|weakest| entry < *weakest) {
            self.queue.pop();
            self.queue.push(entry);
        }
        Ok(())
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        true
    }
}
