//! An in-memory segment.
//!
//! Documents are whitespace-tokenised at build time into a sorted term
//! dictionary with positional postings, field-length norms and per-document
//! term ordinals. Numeric fields are indexed as trie terms and also kept as
//! per-document values. Deletions produce a new reader over the same core, so
//! per-core caches stay valid across them.

use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{HastaError, Result};
use crate::index::DocId;
use crate::index::doc_values::{NumericDocValues, SortedSetDocValues};
use crate::index::postings::{PostingsEnum, PostingsFlags};
use crate::index::reader::{CoreClosedListener, CoreKey, LeafReader};
use crate::index::terms::{SeekStatus, TermAttributes, TermState, Terms, TermsEnum};
use crate::search::doc_id_set::{DocIdSetIterator, NO_MORE_DOCS};
use crate::util::bits::{Bits, FixedBitSet};
use crate::util::numeric::{NumericValue, PRECISION_STEP_DEFAULT, numeric_terms};

/// A document to be added to a [`MemorySegmentBuilder`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    fields: Vec<(String, Vec<(String, i32)>)>,
    numerics: Vec<(String, NumericValue)>,
}

impl MemoryDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add whitespace-separated tokens to `name`.
    ///
    /// Repeated calls for the same field continue the position sequence.
    pub fn field(mut self, name: &str, text: &str) -> Self {
        let mut next = self.next_position(name);
        let tokens = text
            .split_whitespace()
            .map(|token| {
                let position = next;
                next += 1;
                (token.to_string(), position)
            })
            .collect();
        self.fields.push((name.to_string(), tokens));
        self
    }

    /// Add tokens with explicit positions to `name`.
    pub fn tokens(mut self, name: &str, tokens: &[(&str, i32)]) -> Self {
        let tokens = tokens
            .iter()
            .map(|(token, position)| (token.to_string(), *position))
            .collect();
        self.fields.push((name.to_string(), tokens));
        self
    }

    /// Add a numeric value to `name` with the default precision step.
    pub fn numeric(self, name: &str, value: NumericValue) -> Self {
        self.numeric_with_step(name, value, PRECISION_STEP_DEFAULT)
    }

    /// Add a numeric value to `name`: its trie terms, all at one position,
    /// and a per-document value. Only the first value of a field is kept
    /// as the document's value.
    pub fn numeric_with_step(mut self, name: &str, value: NumericValue, precision_step: u32) -> Self {
        let position = self.next_position(name);
        let tokens = numeric_terms(value, precision_step)
            .into_iter()
            .map(|term| (term, position))
            .collect();
        self.fields.push((name.to_string(), tokens));
        self.numerics.push((name.to_string(), value));
        self
    }

    fn next_position(&self, name: &str) -> i32 {
        self.fields
            .iter()
            .filter(|(field, _)| field == name)
            .flat_map(|(_, tokens)| tokens.iter().map(|(_, position)| position + 1))
            .max()
            .unwrap_or(0)
    }
}

/// Accumulates documents and builds an immutable [`MemorySegment`].
#[derive(Debug, Default)]
pub struct MemorySegmentBuilder {
    documents: Vec<MemoryDocument>,
    without_positions: AHashSet<String>,
}

impl MemorySegmentBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `field` without positions; phrase queries on it will fail.
    pub fn without_positions(mut self, field: &str) -> Self {
        self.without_positions.insert(field.to_string());
        self
    }

    /// Add a document and return its segment-local id.
    pub fn add_document(&mut self, document: MemoryDocument) -> DocId {
        self.documents.push(document);
        (self.documents.len() - 1) as DocId
    }

    /// Number of documents added so far.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents were added.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Build the segment.
    pub fn build(&self) -> Arc<MemorySegment> {
        let max_doc = self.documents.len();
        let mut dictionaries: AHashMap<String, BTreeMap<String, Vec<Posting>>> = AHashMap::new();
        let mut lengths: AHashMap<String, Vec<i64>> = AHashMap::new();
        let mut numerics: AHashMap<String, Vec<Option<i64>>> = AHashMap::new();

        for (doc, document) in self.documents.iter().enumerate() {
            for (field, value) in &document.numerics {
                let slot = &mut numerics
                    .entry(field.clone())
                    .or_insert_with(|| vec![None; max_doc])[doc];
                if slot.is_none() {
                    *slot = Some(value.to_sortable());
                }
            }

            let mut per_field: AHashMap<&str, BTreeMap<&str, Vec<i32>>> = AHashMap::new();
            for (field, tokens) in &document.fields {
                let terms = per_field.entry(field.as_str()).or_default();
                for (token, position) in tokens {
                    terms.entry(token.as_str()).or_default().push(*position);
                }
                lengths
                    .entry(field.clone())
                    .or_insert_with(|| vec![0; max_doc])[doc] += tokens.len() as i64;
            }

            for (field, terms) in per_field {
                let dictionary = dictionaries.entry(field.to_string()).or_default();
                let keep_positions = !self.without_positions.contains(field);
                for (token, mut positions) in terms {
                    positions.sort_unstable();
                    let freq = positions.len() as i32;
                    if !keep_positions {
                        positions.clear();
                    }
                    dictionary.entry(token.to_string()).or_default().push(Posting {
                        doc: doc as DocId,
                        freq,
                        positions,
                    });
                }
            }
        }

        let mut fields = AHashMap::new();
        for (name, dictionary) in dictionaries {
            let has_positions = !self.without_positions.contains(&name);
            let norms = lengths.remove(&name).unwrap_or_else(|| vec![0; max_doc]);
            fields.insert(
                name,
                FieldIndex::build(dictionary, has_positions, norms, max_doc),
            );
        }

        let core = SegmentCore {
            key: CoreKey::next(),
            max_doc: max_doc as i32,
            fields,
            numerics: numerics
                .into_iter()
                .map(|(name, values)| (name, Arc::new(FieldNumbers { values })))
                .collect(),
            listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        };
        debug!(
            target: "hasta::index",
            max_doc,
            fields = core.fields.len(),
            "built memory segment"
        );

        Arc::new(MemorySegment {
            core: Arc::new(core),
            live_docs: None,
            num_docs: max_doc as i32,
        })
    }
}

#[derive(Debug, Clone)]
struct Posting {
    doc: DocId,
    freq: i32,
    positions: Vec<i32>,
}

#[derive(Debug)]
struct FieldIndex {
    terms: Arc<FieldTerms>,
    norms: Arc<FieldNorms>,
    ords: Arc<FieldOrds>,
}

impl FieldIndex {
    fn build(
        dictionary: BTreeMap<String, Vec<Posting>>,
        has_positions: bool,
        norms: Vec<i64>,
        max_doc: usize,
    ) -> Self {
        let mut terms = Vec::with_capacity(dictionary.len());
        let mut postings = Vec::with_capacity(dictionary.len());
        let mut doc_ords: Vec<Vec<i64>> = vec![Vec::new(); max_doc];
        let mut docs_with_field = AHashSet::new();
        let mut sum_doc_freq = 0i64;
        let mut sum_total_term_freq = 0i64;

        for (ord, (term, list)) in dictionary.into_iter().enumerate() {
            for posting in &list {
                doc_ords[posting.doc as usize].push(ord as i64);
                docs_with_field.insert(posting.doc);
                sum_total_term_freq += i64::from(posting.freq);
            }
            sum_doc_freq += list.len() as i64;
            terms.push(term);
            postings.push(Arc::from(list));
        }

        let terms = Arc::new(FieldTerms {
            terms,
            postings,
            has_positions,
            doc_count: docs_with_field.len() as i32,
            sum_doc_freq,
            sum_total_term_freq,
        });

        FieldIndex {
            ords: Arc::new(FieldOrds {
                terms: Arc::clone(&terms),
                doc_ords,
            }),
            norms: Arc::new(FieldNorms { lengths: norms }),
            terms,
        }
    }
}

struct FieldTerms {
    terms: Vec<String>,
    postings: Vec<Arc<[Posting]>>,
    has_positions: bool,
    doc_count: i32,
    sum_doc_freq: i64,
    sum_total_term_freq: i64,
}

impl Debug for FieldTerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTerms")
            .field("size", &self.terms.len())
            .field("has_positions", &self.has_positions)
            .field("doc_count", &self.doc_count)
            .finish()
    }
}

/// [`Terms`] handle over a shared field dictionary.
#[derive(Debug, Clone)]
struct MemoryTerms {
    field: Arc<FieldTerms>,
}

impl Terms for MemoryTerms {
    fn iterator(&self) -> Result<Box<dyn TermsEnum>> {
        Ok(Box::new(MemoryTermsEnum::new(Arc::clone(&self.field))))
    }

    fn size(&self) -> i64 {
        self.field.terms.len() as i64
    }

    fn doc_count(&self) -> i32 {
        self.field.doc_count
    }

    fn sum_doc_freq(&self) -> i64 {
        self.field.sum_doc_freq
    }

    fn sum_total_term_freq(&self) -> i64 {
        self.field.sum_total_term_freq
    }

    fn has_positions(&self) -> bool {
        self.field.has_positions
    }
}

/// Ordered enumeration over a [`FieldTerms`] dictionary.
struct MemoryTermsEnum {
    field: Arc<FieldTerms>,
    // None before the first call to next/seek; len() once exhausted.
    current: Option<usize>,
    attributes: TermAttributes,
}

impl MemoryTermsEnum {
    fn new(field: Arc<FieldTerms>) -> Self {
        MemoryTermsEnum {
            field,
            current: None,
            attributes: TermAttributes::default(),
        }
    }

    fn positioned(&self) -> Option<usize> {
        self.current.filter(|&index| index < self.field.terms.len())
    }
}

impl TermsEnum for MemoryTermsEnum {
    fn next(&mut self) -> Result<Option<String>> {
        let next = match self.current {
            None => 0,
            Some(index) if index >= self.field.terms.len() => return Ok(None),
            Some(index) => index + 1,
        };
        self.current = Some(next);
        Ok(self.field.terms.get(next).cloned())
    }

    fn term(&self) -> Option<&str> {
        self.positioned().map(|index| self.field.terms[index].as_str())
    }

    fn seek_ceil(&mut self, text: &str) -> Result<SeekStatus> {
        match self
            .field
            .terms
            .binary_search_by(|term| term.as_str().cmp(text))
        {
            Ok(index) => {
                self.current = Some(index);
                Ok(SeekStatus::Found)
            }
            Err(index) => {
                self.current = Some(index);
                if index >= self.field.terms.len() {
                    Ok(SeekStatus::End)
                } else {
                    Ok(SeekStatus::NotFound)
                }
            }
        }
    }

    fn seek_exact_state(&mut self, text: &str, state: &TermState) -> Result<()> {
        let index = usize::try_from(state.ord)
            .ok()
            .filter(|&index| self.field.terms.get(index).is_some_and(|term| term == text))
            .ok_or_else(|| {
                HastaError::index(format!("term state does not match term {text}"))
            })?;
        self.current = Some(index);
        Ok(())
    }

    fn ord(&self) -> Option<i64> {
        self.positioned().map(|index| index as i64)
    }

    fn doc_freq(&self) -> i32 {
        self.positioned()
            .map_or(0, |index| self.field.postings[index].len() as i32)
    }

    fn total_term_freq(&self) -> i64 {
        self.positioned().map_or(0, |index| {
            self.field.postings[index]
                .iter()
                .map(|posting| i64::from(posting.freq))
                .sum()
        })
    }

    fn term_state(&self) -> TermState {
        TermState {
            ord: self.ord().unwrap_or(-1),
            doc_freq: self.doc_freq(),
            total_term_freq: self.total_term_freq(),
        }
    }

    fn postings(
        &self,
        live_docs: Option<Arc<dyn Bits>>,
        flags: PostingsFlags,
    ) -> Result<Box<dyn PostingsEnum>> {
        let index = self
            .positioned()
            .ok_or_else(|| HastaError::index("terms enum is not positioned on a term"))?;
        let with_positions = flags == PostingsFlags::Positions && self.field.has_positions;
        Ok(Box::new(MemoryPostingsEnum {
            postings: Arc::clone(&self.field.postings[index]),
            current: None,
            doc: -1,
            position_upto: 0,
            with_positions,
            live_docs,
        }))
    }

    fn attributes(&self) -> &TermAttributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut TermAttributes {
        &mut self.attributes
    }
}

struct MemoryPostingsEnum {
    postings: Arc<[Posting]>,
    current: Option<usize>,
    doc: DocId,
    position_upto: usize,
    with_positions: bool,
    live_docs: Option<Arc<dyn Bits>>,
}

impl MemoryPostingsEnum {
    fn is_live(&self, doc: DocId) -> bool {
        self.live_docs
            .as_ref()
            .is_none_or(|bits| bits.get(doc as usize))
    }

    fn settle(&mut self, mut index: usize) -> DocId {
        while index < self.postings.len() && !self.is_live(self.postings[index].doc) {
            index += 1;
        }
        self.current = Some(index);
        self.position_upto = 0;
        self.doc = match self.postings.get(index) {
            Some(posting) => posting.doc,
            None => NO_MORE_DOCS,
        };
        self.doc
    }
}

impl DocIdSetIterator for MemoryPostingsEnum {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        let start = self.current.map_or(0, |index| index + 1);
        self.settle(start)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        let start = self.current.map_or(0, |index| index + 1).min(self.postings.len());
        let offset = self.postings[start..].partition_point(|posting| posting.doc < target);
        self.settle(start + offset)
    }

    fn cost(&self) -> i64 {
        self.postings.len() as i64
    }
}

impl PostingsEnum for MemoryPostingsEnum {
    fn freq(&self) -> i32 {
        self.current
            .and_then(|index| self.postings.get(index))
            .map_or(0, |posting| posting.freq)
    }

    fn next_position(&mut self) -> i32 {
        if !self.with_positions {
            return -1;
        }
        let position = self
            .current
            .and_then(|index| self.postings.get(index))
            .and_then(|posting| posting.positions.get(self.position_upto).copied())
            .unwrap_or(-1);
        self.position_upto += 1;
        position
    }
}

#[derive(Debug)]
struct FieldNorms {
    lengths: Vec<i64>,
}

impl NumericDocValues for FieldNorms {
    fn get(&self, doc: DocId) -> i64 {
        self.lengths.get(doc as usize).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
struct FieldNumbers {
    values: Vec<Option<i64>>,
}

impl NumericDocValues for FieldNumbers {
    fn get(&self, doc: DocId) -> i64 {
        self.values.get(doc as usize).copied().flatten().unwrap_or(0)
    }

    fn has_value(&self, doc: DocId) -> bool {
        self.values.get(doc as usize).is_some_and(Option::is_some)
    }
}

#[derive(Debug)]
struct FieldOrds {
    terms: Arc<FieldTerms>,
    doc_ords: Vec<Vec<i64>>,
}

impl SortedSetDocValues for FieldOrds {
    fn ords(&self, doc: DocId) -> &[i64] {
        self.doc_ords
            .get(doc as usize)
            .map_or(&[], |ords| ords.as_slice())
    }

    fn value_count(&self) -> i64 {
        self.terms.terms.len() as i64
    }

    fn lookup_ord(&self, ord: i64) -> Option<&str> {
        usize::try_from(ord)
            .ok()
            .and_then(|index| self.terms.terms.get(index))
            .map(|term| term.as_str())
    }

    fn terms_enum(&self) -> Result<Box<dyn TermsEnum>> {
        Ok(Box::new(MemoryTermsEnum::new(Arc::clone(&self.terms))))
    }
}

struct SegmentCore {
    key: CoreKey,
    max_doc: i32,
    fields: AHashMap<String, FieldIndex>,
    numerics: AHashMap<String, Arc<FieldNumbers>>,
    listeners: Mutex<Vec<Arc<dyn CoreClosedListener>>>,
    closed: AtomicBool,
}

/// An immutable in-memory segment, optionally with deletions.
pub struct MemorySegment {
    core: Arc<SegmentCore>,
    live_docs: Option<Arc<FixedBitSet>>,
    num_docs: i32,
}

impl MemorySegment {
    /// A new reader over the same core with `docs` additionally deleted.
    pub fn with_deletions(&self, docs: &[DocId]) -> Arc<MemorySegment> {
        let max_doc = self.core.max_doc as usize;
        let mut live = match &self.live_docs {
            Some(bits) => (**bits).clone(),
            None => FixedBitSet::with_all_set(max_doc),
        };
        for &doc in docs {
            if (doc as usize) < max_doc {
                live.clear(doc as usize);
            }
        }
        let num_docs = live.cardinality() as i32;

        Arc::new(MemorySegment {
            core: Arc::clone(&self.core),
            live_docs: Some(Arc::new(live)),
            num_docs,
        })
    }

    /// Close the core and notify core-closed listeners. Idempotent.
    pub fn close(&self) {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let listeners = std::mem::take(&mut *self.core.listeners.lock());
        debug!(
            target: "hasta::index",
            listeners = listeners.len(),
            "memory segment core closed"
        );
        for listener in listeners {
            listener.on_close(self.core.key);
        }
    }

    /// Whether [`MemorySegment::close`] has been called on this core.
    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::Acquire)
    }
}

impl Debug for MemorySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySegment")
            .field("core_key", &self.core.key)
            .field("max_doc", &self.core.max_doc)
            .field("num_docs", &self.num_docs)
            .finish()
    }
}

impl LeafReader for MemorySegment {
    fn core_key(&self) -> CoreKey {
        self.core.key
    }

    fn max_doc(&self) -> i32 {
        self.core.max_doc
    }

    fn num_docs(&self) -> i32 {
        self.num_docs
    }

    fn live_docs(&self) -> Option<Arc<dyn Bits>> {
        self.live_docs
            .as_ref()
            .map(|bits| Arc::clone(bits) as Arc<dyn Bits>)
    }

    fn terms(&self, field: &str) -> Result<Option<Arc<dyn Terms>>> {
        Ok(self.core.fields.get(field).map(|index| {
            Arc::new(MemoryTerms {
                field: Arc::clone(&index.terms),
            }) as Arc<dyn Terms>
        }))
    }

    fn norms(&self, field: &str) -> Result<Option<Arc<dyn NumericDocValues>>> {
        Ok(self
            .core
            .fields
            .get(field)
            .map(|index| Arc::clone(&index.norms) as Arc<dyn NumericDocValues>))
    }

    fn numeric_doc_values(&self, field: &str) -> Result<Option<Arc<dyn NumericDocValues>>> {
        Ok(self
            .core
            .numerics
            .get(field)
            .map(|values| Arc::clone(values) as Arc<dyn NumericDocValues>))
    }

    fn sorted_set_doc_values(&self, field: &str) -> Result<Option<Arc<dyn SortedSetDocValues>>> {
        Ok(self
            .core
            .fields
            .get(field)
            .map(|index| Arc::clone(&index.ords) as Arc<dyn SortedSetDocValues>))
    }

    fn add_core_closed_listener(&self, listener: Arc<dyn CoreClosedListener>) {
        if self.is_closed() {
            listener.on_close(self.core.key);
        } else {
            self.core.listeners.lock().push(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn sample() -> Arc<MemorySegment> {
        let mut builder = MemorySegmentBuilder::new();
        builder.add_document(MemoryDocument::new().field("body", "the quick brown fox"));
        builder.add_document(MemoryDocument::new().field("body", "the lazy dog"));
        builder.add_document(MemoryDocument::new().field("body", "quick quick fox"));
        builder.build()
    }

    #[test]
    fn test_terms_are_sorted_with_stats() {
        let segment = sample();
        let terms = segment.terms("body").unwrap().unwrap();
        assert_eq!(terms.size(), 6);
        assert_eq!(terms.doc_count(), 3);
        assert_eq!(terms.sum_total_term_freq(), 10);

        let mut te = terms.iterator().unwrap();
        let mut all = Vec::new();
        while let Some(term) = te.next().unwrap() {
            all.push(term);
        }
        assert_eq!(all, vec!["brown", "dog", "fox", "lazy", "quick", "the"]);
        assert_eq!(te.next().unwrap(), None);
    }

    #[test]
    fn test_seek_ceil() {
        let segment = sample();
        let terms = segment.terms("body").unwrap().unwrap();
        let mut te = terms.iterator().unwrap();

        assert_eq!(te.seek_ceil("fox").unwrap(), SeekStatus::Found);
        assert_eq!(te.doc_freq(), 2);
        assert_eq!(te.seek_ceil("g").unwrap(), SeekStatus::NotFound);
        assert_eq!(te.term(), Some("lazy"));
        assert_eq!(te.next().unwrap().as_deref(), Some("quick"));
        assert_eq!(te.total_term_freq(), 3);
        assert_eq!(te.seek_ceil("zzz").unwrap(), SeekStatus::End);
        assert_eq!(te.term(), None);
    }

    #[test]
    fn test_postings_and_positions() {
        let segment = sample();
        let terms = segment.terms("body").unwrap().unwrap();
        let mut te = terms.iterator().unwrap();
        assert!(te.seek_exact("quick").unwrap());

        let mut postings = te.postings(None, PostingsFlags::Positions).unwrap();
        assert_eq!(postings.doc_id(), -1);
        assert_eq!(postings.next_doc(), 0);
        assert_eq!(postings.freq(), 1);
        assert_eq!(postings.next_position(), 1);
        assert_eq!(postings.advance(1), 2);
        assert_eq!(postings.freq(), 2);
        assert_eq!(postings.next_position(), 0);
        assert_eq!(postings.next_position(), 1);
        assert_eq!(postings.next_doc(), NO_MORE_DOCS);
        assert_eq!(postings.next_doc(), NO_MORE_DOCS);
    }

    #[test]
    fn test_deletions_share_core() {
        let segment = sample();
        let deleted = segment.with_deletions(&[0]);
        assert_eq!(deleted.core_key(), segment.core_key());
        assert_eq!(deleted.num_docs(), 2);

        let terms = deleted.terms("body").unwrap().unwrap();
        let mut te = terms.iterator().unwrap();
        assert!(te.seek_exact("quick").unwrap());
        let mut postings = te.postings(deleted.live_docs(), PostingsFlags::Freqs).unwrap();
        assert_eq!(postings.next_doc(), 2);
        assert_eq!(postings.next_doc(), NO_MORE_DOCS);
    }

    #[test]
    fn test_norms_and_ords() {
        let segment = sample();
        let norms = segment.norms("body").unwrap().unwrap();
        assert_eq!(norms.get(0), 4);
        assert_eq!(norms.get(1), 3);

        let ords = segment.sorted_set_doc_values("body").unwrap().unwrap();
        assert_eq!(ords.value_count(), 6);
        // "quick quick fox": fox = 2, quick = 4
        assert_eq!(ords.ords(2), &[2, 4]);
        assert_eq!(ords.lookup_ord(4), Some("quick"));
    }

    #[test]
    fn test_numeric_values_and_trie_terms() {
        let mut builder = MemorySegmentBuilder::new();
        builder.add_document(
            MemoryDocument::new()
                .numeric("price", NumericValue::Double(-2.5))
                .numeric("price", NumericValue::Double(9.0)),
        );
        builder.add_document(MemoryDocument::new().field("body", "no price"));
        builder.add_document(MemoryDocument::new().numeric_with_step("price", NumericValue::Double(1.0), 16));
        let segment = builder.build();

        let values = segment.numeric_doc_values("price").unwrap().unwrap();
        assert_eq!(values.get(0), crate::util::numeric::double_to_sortable_long(-2.5));
        assert!(!values.has_value(1));
        assert_eq!(values.get(1), 0);
        assert!(values.has_value(2));
        assert!(segment.numeric_doc_values("body").unwrap().is_none());

        let terms = segment.terms("price").unwrap().unwrap();
        assert_eq!(terms.doc_count(), 2);
        let full = crate::util::numeric::long_to_prefix_coded(
            crate::util::numeric::double_to_sortable_long(1.0),
            0,
        );
        let mut te = terms.iterator().unwrap();
        assert!(te.seek_exact(&full).unwrap());
        assert_eq!(te.doc_freq(), 1);
    }

    #[test]
    fn test_without_positions() {
        let mut builder = MemorySegmentBuilder::new().without_positions("body");
        builder.add_document(MemoryDocument::new().field("body", "a b a"));
        let segment = builder.build();
        let terms = segment.terms("body").unwrap().unwrap();
        assert!(!terms.has_positions());

        let mut te = terms.iterator().unwrap();
        assert!(te.seek_exact("a").unwrap());
        let mut postings = te.postings(None, PostingsFlags::Positions).unwrap();
        assert_eq!(postings.next_doc(), 0);
        assert_eq!(postings.freq(), 2);
        assert_eq!(postings.next_position(), -1);
    }

    #[test]
    fn test_close_notifies_once() {
        struct Counting(AtomicUsize);
        impl CoreClosedListener for Counting {
            fn on_close(&self, _key: CoreKey) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let segment = sample();
        let listener = Arc::new(Counting(AtomicUsize::new(0)));
        segment.add_core_closed_listener(listener.clone());
        segment.close();
        segment.close();
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
        assert!(segment.is_closed());
    }
}
