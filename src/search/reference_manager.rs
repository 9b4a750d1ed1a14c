//! Sharing a periodically refreshed, reference-counted value between threads.
//!
//! A [`ReferenceManager`] holds one *current* reference. Readers
//! [`acquire`](ReferenceManager::acquire) it, use it, and
//! [`release`](ReferenceManager::release) it; a refresh swaps in a newer
//! reference while readers still holding the old one keep using it until
//! they release it. The manager owns one count on the current reference,
//! dropped when that reference is superseded or the manager closes.
//!
//! ```
//! use std::sync::Arc;
//!
//! use hasta::index::memory::{MemoryDocument, MemorySegmentBuilder};
//! use hasta::index::reader::{IndexReader, LeafReader};
//! use hasta::search::searcher_manager::{DefaultSearcherFactory, SearcherManager, StaticReopener};
//!
//! let mut builder = MemorySegmentBuilder::new();
//! builder.add_document(MemoryDocument::new().field("body", "hello"));
//! let segments: Vec<Arc<dyn LeafReader>> = vec![builder.build()];
//! let reader = Arc::new(IndexReader::new(segments));
//!
//! let manager = SearcherManager::open(
//!     reader,
//!     Arc::new(DefaultSearcherFactory::default()),
//!     Arc::new(StaticReopener),
//! )
//! .unwrap();
//! let searcher = manager.acquire().unwrap();
//! assert_eq!(searcher.reader().max_doc(), 1);
//! manager.release(searcher).unwrap();
//! manager.close().unwrap();
//! assert!(manager.acquire().is_err());
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::error::{HastaError, Result};
use crate::index::reader::IndexReader;
use crate::search::searcher::IndexSearcher;

/// A handle whose underlying resource is reference counted.
pub trait RefCounted: Clone + Send + Sync {
    /// Increment the count unless it has already dropped to zero.
    fn try_inc_ref(&self) -> bool;

    /// Decrement the count, freeing the resource when it reaches zero.
    fn dec_ref(&self) -> Result<()>;

    /// The current count.
    fn ref_count(&self) -> i32;

    /// Whether `self` and `other` are handles on the same resource.
    fn same_reference(&self, other: &Self) -> bool;
}

impl RefCounted for Arc<IndexReader> {
    fn try_inc_ref(&self) -> bool {
        IndexReader::try_inc_ref(self)
    }

    fn dec_ref(&self) -> Result<()> {
        IndexReader::dec_ref(self)
    }

    fn ref_count(&self) -> i32 {
        IndexReader::ref_count(self)
    }

    fn same_reference(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl RefCounted for Arc<IndexSearcher> {
    fn try_inc_ref(&self) -> bool {
        self.reader().try_inc_ref()
    }

    fn dec_ref(&self) -> Result<()> {
        self.reader().dec_ref()
    }

    fn ref_count(&self) -> i32 {
        self.reader().ref_count()
    }

    fn same_reference(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

/// Produces newer references for a [`ReferenceManager`].
pub trait ReferenceRefresher<G>: Send + Sync {
    /// A newer reference than `current`, or `None` if `current` is up to date.
    ///
    /// A returned reference carries one count, which passes to the manager.
    fn refresh_if_needed(&self, current: &G) -> Result<Option<G>>;

    /// Whether `current` reflects the latest state.
    fn is_current(&self, _current: &G) -> Result<bool> {
        Ok(true)
    }
}

/// Notified around every refresh attempt.
pub trait RefreshListener: Send + Sync {
    /// Called before a refresh attempt.
    fn before_refresh(&self) {}

    /// Called after a refresh attempt; `did_refresh` tells whether a new
    /// reference was swapped in.
    fn after_refresh(&self, did_refresh: bool);
}

/// Owns the current reference and hands out counted copies of it.
pub struct ReferenceManager<G: RefCounted> {
    current: RwLock<Option<G>>,
    refresh_lock: Mutex<()>,
    refresher: Box<dyn ReferenceRefresher<G>>,
    listeners: Mutex<Vec<Arc<dyn RefreshListener>>>,
}

impl<G: RefCounted> ReferenceManager<G> {
    /// Manage `initial`, taking over one of its counts.
    pub fn new(initial: G, refresher: Box<dyn ReferenceRefresher<G>>) -> Self {
        ReferenceManager {
            current: RwLock::new(Some(initial)),
            refresh_lock: Mutex::new(()),
            refresher,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// The current reference with its count incremented.
    ///
    /// Every acquired reference must be handed back to
    /// [`release`](Self::release). Never waits for a running refresh.
    pub fn acquire(&self) -> Result<G> {
        loop {
            let Some(reference) = self.current.read().as_ref().cloned() else {
                return Err(HastaError::already_closed("this ReferenceManager is closed"));
            };
            if reference.try_inc_ref() {
                return Ok(reference);
            }
            let still_current = self
                .current
                .read()
                .as_ref()
                .is_some_and(|current| current.same_reference(&reference));
            if reference.ref_count() == 0 && still_current {
                return Err(HastaError::illegal_state(
                    "the managed reference has already closed; its count was modified outside of the ReferenceManager",
                ));
            }
            // lost a race with a swap; retry on the new reference
        }
    }

    /// Hand back a reference obtained from [`acquire`](Self::acquire).
    pub fn release(&self, reference: G) -> Result<()> {
        reference.dec_ref()
    }

    /// Refresh unless another thread is already doing so.
    ///
    /// Returns `false` only when the refresh was skipped because another
    /// thread held the refresh lock; `true` means this call checked, and
    /// swapped in a new reference if one was available.
    pub fn maybe_refresh(&self) -> Result<bool> {
        let Some(_guard) = self.refresh_lock.try_lock() else {
            trace!(target: "hasta::search", "refresh already in progress");
            return Ok(false);
        };
        self.do_maybe_refresh()?;
        Ok(true)
    }

    /// Refresh, waiting for a concurrent refresh to finish first.
    pub fn maybe_refresh_blocking(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock();
        self.do_maybe_refresh()
    }

    /// Whether the current reference reflects the latest state.
    pub fn is_current(&self) -> Result<bool> {
        let reference = self.acquire()?;
        let current = self.refresher.is_current(&reference);
        self.release(reference)?;
        current
    }

    /// Drop the manager's count on the current reference. Later calls to
    /// [`acquire`](Self::acquire) fail; closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let Some(last) = self.current.write().take() else {
            return Ok(());
        };
        debug!(target: "hasta::search", "reference manager closed");
        last.dec_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.current.read().is_none()
    }

    pub fn add_listener(&self, listener: Arc<dyn RefreshListener>) {
        self.listeners.lock().push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn RefreshListener>) {
        self.listeners
            .lock()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    fn do_maybe_refresh(&self) -> Result<()> {
        let reference = self.acquire()?;
        self.notify(|listener| listener.before_refresh());
        debug!(target: "hasta::search", "refresh started");

        let mut refreshed = false;
        let outcome = match self.refresher.refresh_if_needed(&reference) {
            Ok(Some(newer)) => self.swap(newer).and_then(|previous| {
                refreshed = true;
                trace!(target: "hasta::search", "swapped in new reference");
                previous.map_or(Ok(()), |previous| previous.dec_ref())
            }),
            Ok(None) => Ok(()),
            Err(err) => Err(err),
        };
        let released = self.release(reference);

        debug!(target: "hasta::search", refreshed, "refresh finished");
        self.notify(|listener| listener.after_refresh(refreshed));
        outcome?;
        released
    }

    /// Install `newer`, returning the reference it replaced. Fails without
    /// installing anything once the manager is closed.
    fn swap(&self, newer: G) -> Result<Option<G>> {
        let mut current = self.current.write();
        if current.is_none() {
            drop(current);
            newer.dec_ref()?;
            return Err(HastaError::already_closed("this ReferenceManager is closed"));
        }
        Ok(current.replace(newer))
    }

    fn notify(&self, event: impl Fn(&dyn RefreshListener)) {
        let listeners = self.listeners.lock().clone();
        for listener in &listeners {
            event(listener.as_ref());
        }
    }
}

impl<G: RefCounted> Drop for ReferenceManager<G> {
    fn drop(&mut self) {
        if let Some(last) = self.current.get_mut().take() {
            if let Err(err) = last.dec_ref() {
                debug!(target: "hasta::search", error = %err, "releasing reference on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{OnceLock, Weak};

    use super::*;
    use crate::index::reader::LeafReader;
    use crate::search::phrase::test_support::segment;

    fn reader(docs: &[&str]) -> Arc<IndexReader> {
        let segments: Vec<Arc<dyn LeafReader>> = vec![segment(docs)];
        Arc::new(IndexReader::new(segments))
    }

    /// Hands out the queued readers one per refresh.
    struct QueueRefresher {
        pending: Mutex<Vec<Arc<IndexReader>>>,
    }

    impl ReferenceRefresher<Arc<IndexReader>> for QueueRefresher {
        fn refresh_if_needed(&self, _current: &Arc<IndexReader>) -> Result<Option<Arc<IndexReader>>> {
            Ok(self.pending.lock().pop())
        }

        fn is_current(&self, _current: &Arc<IndexReader>) -> Result<bool> {
            Ok(self.pending.lock().is_empty())
        }
    }

    fn manager(initial: Arc<IndexReader>, pending: Vec<Arc<IndexReader>>) -> ReferenceManager<Arc<IndexReader>> {
        ReferenceManager::new(
            initial,
            Box::new(QueueRefresher {
                pending: Mutex::new(pending),
            }),
        )
    }

    #[derive(Default)]
    struct RecordingListener {
        before: AtomicUsize,
        refreshed: AtomicUsize,
        skipped: AtomicUsize,
    }

    impl RefreshListener for RecordingListener {
        fn before_refresh(&self) {
            self.before.fetch_add(1, Ordering::SeqCst);
        }

        fn after_refresh(&self, did_refresh: bool) {
            if did_refresh {
                self.refreshed.fetch_add(1, Ordering::SeqCst);
            } else {
                self.skipped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_acquire_and_release_counts() {
        let initial = reader(&["a"]);
        let manager = manager(Arc::clone(&initial), Vec::new());
        let first = manager.acquire().unwrap();
        let second = manager.acquire().unwrap();
        assert_eq!(initial.ref_count(), 3);
        manager.release(first).unwrap();
        manager.release(second).unwrap();
        assert_eq!(initial.ref_count(), 1);
    }

    #[test]
    fn test_refresh_swaps_and_frees_superseded_reference() {
        let old = reader(&["a"]);
        let new = reader(&["a", "b"]);
        let manager = manager(Arc::clone(&old), vec![Arc::clone(&new)]);
        assert!(!manager.is_current().unwrap());

        let held = manager.acquire().unwrap();
        assert!(manager.maybe_refresh().unwrap());
        assert!(manager.is_current().unwrap());

        // the old reader lives on while a searcher still holds it
        assert_eq!(old.ref_count(), 1);
        let fresh = manager.acquire().unwrap();
        assert_eq!(fresh.max_doc(), 2);
        manager.release(held).unwrap();
        assert_eq!(old.ref_count(), 0);

        manager.release(fresh).unwrap();
        assert_eq!(new.ref_count(), 1);
    }

    #[test]
    fn test_listeners_see_every_attempt() {
        let manager = manager(reader(&["a"]), vec![reader(&["b"])]);
        let listener = Arc::new(RecordingListener::default());
        let registered: Arc<dyn RefreshListener> = listener.clone();
        manager.add_listener(Arc::clone(&registered));

        manager.maybe_refresh_blocking().unwrap();
        manager.maybe_refresh_blocking().unwrap();
        assert_eq!(listener.before.load(Ordering::SeqCst), 2);
        assert_eq!(listener.refreshed.load(Ordering::SeqCst), 1);
        assert_eq!(listener.skipped.load(Ordering::SeqCst), 1);

        manager.remove_listener(&registered);
        manager.maybe_refresh_blocking().unwrap();
        assert_eq!(listener.before.load(Ordering::SeqCst), 2);
    }

    /// Closes its manager in the middle of a refresh.
    struct ClosingRefresher {
        manager: Arc<OnceLock<Weak<ReferenceManager<Arc<IndexReader>>>>>,
        newer: Arc<IndexReader>,
    }

    impl ReferenceRefresher<Arc<IndexReader>> for ClosingRefresher {
        fn refresh_if_needed(&self, _current: &Arc<IndexReader>) -> Result<Option<Arc<IndexReader>>> {
            if let Some(manager) = self.manager.get().and_then(Weak::upgrade) {
                manager.close()?;
            }
            Ok(Some(Arc::clone(&self.newer)))
        }
    }

    #[test]
    fn test_failed_swap_is_not_reported_as_refresh() {
        let initial = reader(&["a"]);
        let newer = reader(&["a", "b"]);
        let slot = Arc::new(OnceLock::new());
        let manager = Arc::new(ReferenceManager::new(
            Arc::clone(&initial),
            Box::new(ClosingRefresher {
                manager: Arc::clone(&slot),
                newer: Arc::clone(&newer),
            }),
        ));
        slot.set(Arc::downgrade(&manager)).unwrap();
        let listener = Arc::new(RecordingListener::default());
        manager.add_listener(listener.clone());

        let result = manager.maybe_refresh_blocking();
        assert!(matches!(result, Err(HastaError::AlreadyClosed(_))));
        assert_eq!(listener.before.load(Ordering::SeqCst), 1);
        assert_eq!(listener.refreshed.load(Ordering::SeqCst), 0);
        assert_eq!(listener.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(newer.ref_count(), 0);
        assert_eq!(initial.ref_count(), 0);
    }

    #[test]
    fn test_maybe_refresh_skips_while_locked() {
        let manager = manager(reader(&["a"]), vec![reader(&["b"])]);
        let guard = manager.refresh_lock.lock();
        assert!(!manager.maybe_refresh().unwrap());
        drop(guard);
        assert!(manager.maybe_refresh().unwrap());
    }

    #[test]
    fn test_close() {
        let initial = reader(&["a"]);
        let manager = manager(Arc::clone(&initial), Vec::new());
        let held = manager.acquire().unwrap();
        manager.close().unwrap();
        assert!(manager.is_closed());
        assert!(matches!(manager.acquire(), Err(HastaError::AlreadyClosed(_))));
        assert!(manager.maybe_refresh_blocking().is_err());
        manager.close().unwrap();

        assert_eq!(initial.ref_count(), 1);
        manager.release(held).unwrap();
        assert_eq!(initial.ref_count(), 0);
    }

    #[test]
    fn test_acquire_detects_outside_dec_ref() {
        let initial = reader(&["a"]);
        let manager = manager(Arc::clone(&initial), Vec::new());
        initial.dec_ref().unwrap();
        assert!(matches!(manager.acquire(), Err(HastaError::IllegalState(_))));
    }

    #[test]
    fn test_concurrent_acquire_during_refresh() {
        let pending: Vec<Arc<IndexReader>> = (0..20).map(|_| reader(&["a"])).collect();
        let manager = Arc::new(manager(reader(&["a"]), pending));
        let stop = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let stop = Arc::clone(&stop);
                std::thread::spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        let reference = manager.acquire().unwrap();
                        assert!(reference.ref_count() > 0);
                        manager.release(reference).unwrap();
                    }
                })
            })
            .collect();

        for _ in 0..20 {
            manager.maybe_refresh_blocking().unwrap();
        }
        stop.store(true, Ordering::SeqCst);
        for handle in readers {
            handle.join().unwrap();
        }
        assert!(manager.is_current().unwrap());
    }
}
