//! Filters: per-segment document sets that restrict matches without scoring.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::index::reader::{CoreClosedListener, CoreKey, IndexReader, LeafReaderContext};
use crate::query::Query;
use crate::search::doc_id_set::{BitDocIdSet, BitsFilteredDocIdSet, DocIdSet};
use crate::search::searcher::IndexSearcher;
use crate::util::bits::Bits;

/// Restricts a search to a set of documents per segment.
pub trait Filter: Send + Sync + Debug {
    /// Documents of `context` accepted by this filter, or `None` if none are.
    ///
    /// Documents not set in `accept_docs` must not be returned.
    fn doc_id_set(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Arc<dyn DocIdSet>>>;

    /// Human-readable description.
    fn description(&self) -> String;
}

/// Accepts the documents a query matches, ignoring their scores.
#[derive(Debug, Clone)]
pub struct QueryWrapperFilter {
    query: Box<dyn Query>,
}

impl QueryWrapperFilter {
    pub fn new(query: Box<dyn Query>) -> Self {
        QueryWrapperFilter { query }
    }

    pub fn query(&self) -> &dyn Query {
        self.query.as_ref()
    }
}

impl Filter for QueryWrapperFilter {
    fn doc_id_set(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Arc<dyn DocIdSet>>> {
        // statistics only need to be consistent within the segment
        let leaf = Arc::new(IndexReader::new(vec![Arc::clone(&context.reader)]));
        let searcher = IndexSearcher::new(Arc::clone(&leaf));
        let weight = searcher.create_normalized_weight(self.query.as_ref())?;
        let Some(mut scorer) = weight.scorer(&leaf.leaves()[0], accept_docs)? else {
            return Ok(None);
        };
        let set = BitDocIdSet::from_iterator(&mut scorer, context.reader.max_doc());
        Ok(Some(Arc::new(set)))
    }

    fn description(&self) -> String {
        format!("QueryWrapperFilter({})", self.query.description())
    }
}

type CoreCache = Mutex<AHashMap<CoreKey, Option<Arc<dyn DocIdSet>>>>;

/// Caches the document sets of another filter per segment core.
///
/// Sets are computed without accept docs, so readers that share a core but
/// differ in deletions share one entry; deletions are applied when the set
/// is handed out. An entry is evicted as soon as its core closes.
pub struct CachingWrapperFilter {
    filter: Arc<dyn Filter>,
    cache: Arc<CoreCache>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl CachingWrapperFilter {
    pub fn new(filter: Arc<dyn Filter>) -> Self {
        CachingWrapperFilter {
            filter,
            cache: Arc::new(Mutex::new(AHashMap::new())),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    /// The wrapped filter.
    pub fn filter(&self) -> &Arc<dyn Filter> {
        &self.filter
    }

    /// Number of lookups answered from the cache.
    pub fn hit_count(&self) -> u64 {
        self.hit_count.load(Ordering::Relaxed)
    }

    /// Number of lookups that computed a new set.
    pub fn miss_count(&self) -> u64 {
        self.miss_count.load(Ordering::Relaxed)
    }

    /// Number of cached segment cores.
    pub fn cached_cores(&self) -> usize {
        self.cache.lock().len()
    }

    /// Make `set` cacheable, copying it into a bit set if necessary.
    fn cacheable(&self, set: Option<Arc<dyn DocIdSet>>, max_doc: i32) -> Option<Arc<dyn DocIdSet>> {
        let set = set?;
        if set.is_cacheable() {
            return Some(set);
        }
        let mut iter = set.iterator()?;
        let bits = BitDocIdSet::from_iterator(&mut iter, max_doc);
        if bits.cardinality() == 0 {
            None
        } else {
            Some(Arc::new(bits))
        }
    }
}

impl Debug for CachingWrapperFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingWrapperFilter")
            .field("filter", &self.filter)
            .field("cached_cores", &self.cached_cores())
            .finish()
    }
}

impl Filter for CachingWrapperFilter {
    fn doc_id_set(
        &self,
        context: &LeafReaderContext,
        accept_docs: Option<Arc<dyn Bits>>,
    ) -> Result<Option<Arc<dyn DocIdSet>>> {
        let key = context.reader.core_key();
        let cached = self.cache.lock().get(&key).cloned();
        let set = match cached {
            Some(set) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                set
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                let computed = self.filter.doc_id_set(context, None)?;
                let set = self.cacheable(computed, context.reader.max_doc());
                let first = self.cache.lock().insert(key, set.clone()).is_none();
                if first {
                    context.reader.add_core_closed_listener(Arc::new(CacheEvictor {
                        cache: Arc::downgrade(&self.cache),
                    }));
                }
                set
            }
        };
        Ok(set.map(|set| BitsFilteredDocIdSet::wrap(set, accept_docs)))
    }

    fn description(&self) -> String {
        format!("CachingWrapperFilter({})", self.filter.description())
    }
}

/// Drops a core's entry from the cache once the core closes.
struct CacheEvictor {
    cache: Weak<CoreCache>,
}

impl CoreClosedListener for CacheEvictor {
    fn on_close(&self, key: CoreKey) {
        let Some(cache) = self.cache.upgrade() else {
            return;
        };
        if cache.lock().remove(&key).is_some() {
            debug!(target: "hasta::query", ?key, "evicted cached filter set");
        }
    }
}
