//! Document id cursors and sets.
//!
//! Every matching structure in the crate is a [`DocIdSetIterator`]: a
//! forward-only cursor over strictly increasing doc ids within one segment.
//! A fresh cursor reports `-1`; an exhausted one reports [`NO_MORE_DOCS`]
//! forever after. Calling `next_doc` or `advance` on an exhausted cursor, or
//! advancing to a target not beyond the current doc, is a contract
//! violation that implementations are free to assert on.

use std::fmt::Debug;
use std::sync::Arc;

use crate::index::DocId;
use crate::util::bits::{Bits, FixedBitSet};

/// Sentinel returned by exhausted cursors.
pub const NO_MORE_DOCS: DocId = i32::MAX;

/// A forward-only cursor over increasing document ids.
pub trait DocIdSetIterator: Send {
    /// The current document: `-1` before the first move, [`NO_MORE_DOCS`] once exhausted.
    fn doc_id(&self) -> DocId;

    /// Move to the next document.
    fn next_doc(&mut self) -> DocId;

    /// Move to the first document `>= target`.
    fn advance(&mut self, target: DocId) -> DocId;

    /// Upper bound on the number of documents this cursor can still return.
    fn cost(&self) -> i64;
}

impl<T: DocIdSetIterator + ?Sized> DocIdSetIterator for Box<T> {
    fn doc_id(&self) -> DocId {
        (**self).doc_id()
    }

    fn next_doc(&mut self) -> DocId {
        (**self).next_doc()
    }

    fn advance(&mut self, target: DocId) -> DocId {
        (**self).advance(target)
    }

    fn cost(&self) -> i64 {
        (**self).cost()
    }
}

/// `advance` implemented as repeated `next_doc`.
pub fn slow_advance<I: DocIdSetIterator + ?Sized>(iter: &mut I, target: DocId) -> DocId {
    let mut doc = iter.doc_id();
    while doc < target {
        doc = iter.next_doc();
    }
    doc
}

/// A set of documents that can be iterated, possibly many times.
pub trait DocIdSet: Send + Sync + Debug {
    /// A fresh cursor, or `None` if the set is empty.
    fn iterator(&self) -> Option<Box<dyn DocIdSetIterator>>;

    /// Whether the set is cheap to keep in memory and iterate again.
    fn is_cacheable(&self) -> bool {
        false
    }

    /// Random access view, if the set supports it.
    fn bits(&self) -> Option<Arc<dyn Bits>> {
        None
    }
}

/// A cursor that matches nothing.
#[derive(Debug, Default)]
pub struct EmptyDocIdSetIterator {
    exhausted: bool,
}

impl EmptyDocIdSetIterator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocIdSetIterator for EmptyDocIdSetIterator {
    fn doc_id(&self) -> DocId {
        if self.exhausted { NO_MORE_DOCS } else { -1 }
    }

    fn next_doc(&mut self) -> DocId {
        self.exhausted = true;
        NO_MORE_DOCS
    }

    fn advance(&mut self, _target: DocId) -> DocId {
        self.exhausted = true;
        NO_MORE_DOCS
    }

    fn cost(&self) -> i64 {
        0
    }
}

/// The empty set.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDocIdSet;

impl DocIdSet for EmptyDocIdSet {
    fn iterator(&self) -> Option<Box<dyn DocIdSetIterator>> {
        None
    }

    fn is_cacheable(&self) -> bool {
        true
    }
}

/// Cursor over the set bits of a [`FixedBitSet`].
#[derive(Debug)]
pub struct BitSetIterator {
    bits: Arc<FixedBitSet>,
    doc: DocId,
    cost: i64,
}

impl BitSetIterator {
    /// Iterate `bits`; `cost` is usually its cardinality.
    pub fn new(bits: Arc<FixedBitSet>, cost: i64) -> Self {
        BitSetIterator { bits, doc: -1, cost }
    }
}

impl DocIdSetIterator for BitSetIterator {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        let target = self.doc.saturating_add(1);
        self.advance(target)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        self.doc = match self.bits.next_set_bit(target.max(0) as usize) {
            Some(doc) => doc as DocId,
            None => NO_MORE_DOCS,
        };
        self.doc
    }

    fn cost(&self) -> i64 {
        self.cost
    }
}

/// A [`DocIdSet`] backed by a bit set.
#[derive(Debug, Clone)]
pub struct BitDocIdSet {
    bits: Arc<FixedBitSet>,
    cardinality: i64,
}

impl BitDocIdSet {
    pub fn new(bits: FixedBitSet) -> Self {
        let cardinality = bits.cardinality() as i64;
        BitDocIdSet {
            bits: Arc::new(bits),
            cardinality,
        }
    }

    /// Materialize every document of `iter` into a set of `max_doc` bits.
    pub fn from_iterator(iter: &mut dyn DocIdSetIterator, max_doc: i32) -> Self {
        let mut bits = FixedBitSet::new(max_doc.max(0) as usize);
        let mut doc = iter.next_doc();
        while doc != NO_MORE_DOCS {
            bits.set(doc as usize);
            doc = iter.next_doc();
        }
        Self::new(bits)
    }

    /// The underlying bits.
    pub fn bit_set(&self) -> &Arc<FixedBitSet> {
        &self.bits
    }

    /// Number of documents in the set.
    pub fn cardinality(&self) -> i64 {
        self.cardinality
    }
}

impl DocIdSet for BitDocIdSet {
    fn iterator(&self) -> Option<Box<dyn DocIdSetIterator>> {
        Some(Box::new(BitSetIterator::new(
            Arc::clone(&self.bits),
            self.cardinality,
        )))
    }

    fn is_cacheable(&self) -> bool {
        true
    }

    fn bits(&self) -> Option<Arc<dyn Bits>> {
        Some(Arc::clone(&self.bits) as Arc<dyn Bits>)
    }
}

/// Wraps a cursor and skips documents not accepted by `accept`.
pub struct FilteredDocIdSetIterator<I> {
    inner: I,
    accept: Arc<dyn Bits>,
    doc: DocId,
}

impl<I: DocIdSetIterator> FilteredDocIdSetIterator<I> {
    pub fn new(inner: I, accept: Arc<dyn Bits>) -> Self {
        FilteredDocIdSetIterator {
            inner,
            accept,
            doc: -1,
        }
    }

    fn skip_rejected(&mut self, mut doc: DocId) -> DocId {
        while doc != NO_MORE_DOCS && !self.accept.get(doc as usize) {
            doc = self.inner.next_doc();
        }
        self.doc = doc;
        doc
    }
}

impl<I: DocIdSetIterator> DocIdSetIterator for FilteredDocIdSetIterator<I> {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        let doc = self.inner.next_doc();
        self.skip_rejected(doc)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        let doc = self.inner.advance(target);
        self.skip_rejected(doc)
    }

    fn cost(&self) -> i64 {
        self.inner.cost()
    }
}

/// A [`DocIdSet`] whose cursors skip documents not accepted by `accept`.
#[derive(Debug)]
pub struct BitsFilteredDocIdSet {
    inner: Arc<dyn DocIdSet>,
    accept: Arc<dyn Bits>,
}

impl BitsFilteredDocIdSet {
    /// Wrap `inner`, or return it unchanged when there is nothing to filter by.
    pub fn wrap(inner: Arc<dyn DocIdSet>, accept: Option<Arc<dyn Bits>>) -> Arc<dyn DocIdSet> {
        match accept {
            Some(accept) => Arc::new(BitsFilteredDocIdSet { inner, accept }),
            None => inner,
        }
    }
}

impl DocIdSet for BitsFilteredDocIdSet {
    fn iterator(&self) -> Option<Box<dyn DocIdSetIterator>> {
        let inner = self.inner.iterator()?;
        Some(Box::new(FilteredDocIdSetIterator::new(
            inner,
            Arc::clone(&self.accept),
        )))
    }

    fn bits(&self) -> Option<Arc<dyn Bits>> {
        let inner = self.inner.bits()?;
        Some(Arc::new(BothBits {
            left: inner,
            right: Arc::clone(&self.accept),
        }))
    }
}

/// Set where both views are set.
#[derive(Debug)]
struct BothBits {
    left: Arc<dyn Bits>,
    right: Arc<dyn Bits>,
}

impl Bits for BothBits {
    fn get(&self, index: usize) -> bool {
        self.left.get(index) && self.right.get(index)
    }

    fn len(&self) -> usize {
        self.left.len()
    }
}

/// Cursor over `0..max_doc` keeping documents for which `matches` holds.
pub struct MatchingDocIdSetIterator<F> {
    max_doc: DocId,
    doc: DocId,
    matches: F,
}

impl<F> MatchingDocIdSetIterator<F>
where
    F: Fn(DocId) -> bool + Send,
{
    pub fn new(max_doc: DocId, matches: F) -> Self {
        MatchingDocIdSetIterator {
            max_doc,
            doc: -1,
            matches,
        }
    }
}

impl<F> DocIdSetIterator for MatchingDocIdSetIterator<F>
where
    F: Fn(DocId) -> bool + Send,
{
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> DocId {
        let target = self.doc.saturating_add(1);
        self.advance(target)
    }

    fn advance(&mut self, target: DocId) -> DocId {
        let mut doc = target;
        while doc < self.max_doc && !(self.matches)(doc) {
            doc += 1;
        }
        self.doc = if doc >= self.max_doc { NO_MORE_DOCS } else { doc };
        self.doc
    }

    fn cost(&self) -> i64 {
        i64::from(self.max_doc)
    }
}

/// Per-document predicate of a [`FieldCacheDocIdSet`].
pub type DocMatcher = Arc<dyn Fn(DocId) -> bool + Send + Sync>;

/// The documents of `0..max_doc` that pass a predicate over per-document
/// values and are set in the accept docs. Iterating checks every document;
/// random access checks only the one asked for.
#[derive(Clone)]
pub struct FieldCacheDocIdSet {
    max_doc: DocId,
    accept_docs: Option<Arc<dyn Bits>>,
    matcher: DocMatcher,
}

impl FieldCacheDocIdSet {
    pub fn new<F>(max_doc: DocId, accept_docs: Option<Arc<dyn Bits>>, matcher: F) -> Self
    where
        F: Fn(DocId) -> bool + Send + Sync + 'static,
    {
        FieldCacheDocIdSet {
            max_doc,
            accept_docs,
            matcher: Arc::new(matcher),
        }
    }

    fn matches(&self, doc: DocId) -> bool {
        self.accept_docs
            .as_ref()
            .is_none_or(|bits| bits.get(doc as usize))
            && (self.matcher)(doc)
    }
}

impl Debug for FieldCacheDocIdSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCacheDocIdSet")
            .field("max_doc", &self.max_doc)
            .field("has_accept_docs", &self.accept_docs.is_some())
            .finish()
    }
}

impl Bits for FieldCacheDocIdSet {
    fn get(&self, index: usize) -> bool {
        index < self.max_doc.max(0) as usize && self.matches(index as DocId)
    }

    fn len(&self) -> usize {
        self.max_doc.max(0) as usize
    }
}

impl DocIdSet for FieldCacheDocIdSet {
    fn iterator(&self) -> Option<Box<dyn DocIdSetIterator>> {
        let set = self.clone();
        Some(Box::new(MatchingDocIdSetIterator::new(
            self.max_doc,
            move |doc| set.matches(doc),
        )))
    }

    fn is_cacheable(&self) -> bool {
        true
    }

    fn bits(&self) -> Option<Arc<dyn Bits>> {
        Some(Arc::new(self.clone()))
    }
}
