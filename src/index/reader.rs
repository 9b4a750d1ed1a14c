//! Segment and composite readers.
//!
//! A [`LeafReader`] exposes one segment. An [`IndexReader`] is a point-in-time
//! view over a list of leaves with consecutive doc bases; it is reference
//! counted so that a searcher manager can hand it to many threads and know
//! when the last user is gone.

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{HastaError, Result};
use crate::index::DocId;
use crate::index::doc_values::{NumericDocValues, SortedSetDocValues};
use crate::index::terms::Terms;
use crate::util::bits::Bits;

static NEXT_CORE_KEY: AtomicU64 = AtomicU64::new(1);
static NEXT_READER_VERSION: AtomicU64 = AtomicU64::new(1);

/// Identity of a segment's shared core.
///
/// Readers that differ only in deletions share a core key, which makes it the
/// right key for caches of deletion-independent data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoreKey(u64);

impl CoreKey {
    /// Allocate a fresh, process-unique key.
    pub fn next() -> Self {
        CoreKey(NEXT_CORE_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Notified once when a segment core is closed.
pub trait CoreClosedListener: Send + Sync {
    /// Called with the key of the closed core.
    fn on_close(&self, key: CoreKey);
}

/// Read access to one segment.
pub trait LeafReader: Send + Sync + Debug {
    /// Identity of the segment core.
    fn core_key(&self) -> CoreKey;

    /// One greater than the largest document id in the segment.
    fn max_doc(&self) -> i32;

    /// Number of live documents.
    fn num_docs(&self) -> i32;

    /// Live documents, or `None` if the segment has no deletions.
    fn live_docs(&self) -> Option<Arc<dyn Bits>>;

    /// Term dictionary of `field`, if the field is indexed in this segment.
    fn terms(&self, field: &str) -> Result<Option<Arc<dyn Terms>>>;

    /// Field-length norms of `field`.
    fn norms(&self, field: &str) -> Result<Option<Arc<dyn NumericDocValues>>>;

    /// Per-document values of the numeric field `field`, in sortable form.
    fn numeric_doc_values(&self, field: &str) -> Result<Option<Arc<dyn NumericDocValues>>>;

    /// Per-document term ordinals of `field`.
    fn sorted_set_doc_values(&self, field: &str) -> Result<Option<Arc<dyn SortedSetDocValues>>>;

    /// Register a listener called when the segment core closes.
    fn add_core_closed_listener(&self, listener: Arc<dyn CoreClosedListener>);
}

/// A leaf together with its position in the composite reader.
#[derive(Debug, Clone)]
pub struct LeafReaderContext {
    /// Index of the leaf within the composite reader.
    pub ord: usize,
    /// Offset added to segment doc ids to obtain top-level doc ids.
    pub doc_base: DocId,
    /// The segment.
    pub reader: Arc<dyn LeafReader>,
}

/// Notified once when an [`IndexReader`]'s reference count drops to zero.
pub trait ReaderClosedListener: Send + Sync {
    /// Called with the reader that just closed.
    fn on_close(&self, reader: &IndexReader);
}

/// A point-in-time, reference-counted view over a list of segments.
pub struct IndexReader {
    leaves: Vec<LeafReaderContext>,
    max_doc: i32,
    num_docs: i32,
    version: u64,
    ref_count: AtomicI32,
    closed_listeners: Mutex<Vec<Arc<dyn ReaderClosedListener>>>,
}

impl IndexReader {
    /// Create a reader over `segments`, in order. The reference count starts at 1.
    pub fn new(segments: Vec<Arc<dyn LeafReader>>) -> Self {
        let mut leaves = Vec::with_capacity(segments.len());
        let mut doc_base = 0;
        let mut num_docs = 0;
        for (ord, reader) in segments.into_iter().enumerate() {
            let max_doc = reader.max_doc();
            num_docs += reader.num_docs();
            leaves.push(LeafReaderContext {
                ord,
                doc_base,
                reader,
            });
            doc_base += max_doc;
        }

        IndexReader {
            leaves,
            max_doc: doc_base,
            num_docs,
            version: NEXT_READER_VERSION.fetch_add(1, Ordering::Relaxed),
            ref_count: AtomicI32::new(1),
            closed_listeners: Mutex::new(Vec::new()),
        }
    }

    /// The leaves of this reader, ordered by doc base.
    pub fn leaves(&self) -> &[LeafReaderContext] {
        &self.leaves
    }

    /// One greater than the largest top-level doc id.
    pub fn max_doc(&self) -> i32 {
        self.max_doc
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> i32 {
        self.num_docs
    }

    /// Process-unique version of this reader; newer readers have larger versions.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Current reference count.
    pub fn ref_count(&self) -> i32 {
        self.ref_count.load(Ordering::Acquire)
    }

    /// Fail with `AlreadyClosed` if the reference count has reached zero.
    pub fn ensure_open(&self) -> Result<()> {
        if self.ref_count() <= 0 {
            return Err(HastaError::already_closed("this IndexReader is closed"));
        }
        Ok(())
    }

    /// Increment the reference count, failing if the reader is closed.
    pub fn inc_ref(&self) -> Result<()> {
        if !self.try_inc_ref() {
            self.ensure_open()?;
        }
        Ok(())
    }

    /// Increment the reference count unless it has already dropped to zero.
    pub fn try_inc_ref(&self) -> bool {
        let mut count = self.ref_count.load(Ordering::Acquire);
        while count > 0 {
            match self.ref_count.compare_exchange_weak(
                count,
                count + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => count = actual,
            }
        }
        false
    }

    /// Decrement the reference count; the reader closes when it reaches zero.
    pub fn dec_ref(&self) -> Result<()> {
        self.ensure_open()?;
        let remaining = self.ref_count.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 {
            debug!(target: "hasta::reader", version = self.version, "index reader closed");
            let listeners = std::mem::take(&mut *self.closed_listeners.lock());
            for listener in listeners {
                listener.on_close(self);
            }
        } else if remaining < 0 {
            return Err(HastaError::illegal_state(format!(
                "too many dec_ref calls: ref_count is {remaining} after decrement"
            )));
        }
        Ok(())
    }

    /// Register a listener called once when this reader closes.
    pub fn add_reader_closed_listener(&self, listener: Arc<dyn ReaderClosedListener>) {
        self.closed_listeners.lock().push(listener);
    }

    /// Index of the leaf containing top-level doc id `doc`, or `None` when
    /// `doc` is outside `0..max_doc`.
    pub fn leaf_index(&self, doc: DocId) -> Option<usize> {
        if doc < 0 || doc >= self.max_doc {
            return None;
        }
        self.leaves
            .partition_point(|leaf| leaf.doc_base <= doc)
            .checked_sub(1)
    }
}

impl Debug for IndexReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexReader")
            .field("leaves", &self.leaves.len())
            .field("max_doc", &self.max_doc)
            .field("num_docs", &self.num_docs)
            .field("version", &self.version)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::{MemoryDocument, MemorySegmentBuilder};
    use std::sync::atomic::AtomicUsize;

    fn segment(docs: &[&str]) -> Arc<dyn LeafReader> {
        let mut builder = MemorySegmentBuilder::new();
        for text in docs {
            builder.add_document(MemoryDocument::new().field("body", text));
        }
        builder.build()
    }

    #[derive(Default)]
    struct CountingListener {
        calls: AtomicUsize,
    }

    impl ReaderClosedListener for CountingListener {
        fn on_close(&self, _reader: &IndexReader) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_doc_bases() {
        let reader = IndexReader::new(vec![segment(&["a", "b"]), segment(&["c", "d", "e"])]);
        assert_eq!(reader.max_doc(), 5);
        assert_eq!(reader.num_docs(), 5);
        assert_eq!(reader.leaves()[0].doc_base, 0);
        assert_eq!(reader.leaves()[1].doc_base, 2);
        assert_eq!(reader.leaf_index(0), Some(0));
        assert_eq!(reader.leaf_index(1), Some(0));
        assert_eq!(reader.leaf_index(2), Some(1));
        assert_eq!(reader.leaf_index(4), Some(1));
        assert_eq!(reader.leaf_index(5), None);
        assert_eq!(reader.leaf_index(-1), None);
    }

    #[test]
    fn test_leaf_index_skips_empty_leaves() {
        let reader = IndexReader::new(vec![segment(&["a"]), segment(&[]), segment(&["b"])]);
        assert_eq!(reader.leaf_index(0), Some(0));
        assert_eq!(reader.leaf_index(1), Some(2));

        let empty = IndexReader::new(Vec::new());
        assert_eq!(empty.max_doc(), 0);
        assert_eq!(empty.leaf_index(0), None);
    }

    #[test]
    fn test_ref_counting_closes_once() {
        let reader = IndexReader::new(vec![segment(&["a"])]);
        let listener = Arc::new(CountingListener::default());
        reader.add_reader_closed_listener(listener.clone());

        reader.inc_ref().unwrap();
        assert_eq!(reader.ref_count(), 2);
        reader.dec_ref().unwrap();
        assert_eq!(listener.calls.load(Ordering::SeqCst), 0);
        reader.dec_ref().unwrap();
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);

        assert!(!reader.try_inc_ref());
        assert!(matches!(reader.inc_ref(), Err(HastaError::AlreadyClosed(_))));
        assert!(matches!(reader.dec_ref(), Err(HastaError::AlreadyClosed(_))));
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    }
}
