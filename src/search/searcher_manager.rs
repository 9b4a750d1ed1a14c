//! Reference management specialised to searchers.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::SearchConfig;
use crate::error::{HastaError, Result};
use crate::index::reader::{IndexReader, LeafReader};
use crate::search::reference_manager::{ReferenceManager, ReferenceRefresher};
use crate::search::searcher::IndexSearcher;

/// Shares refreshed [`IndexSearcher`]s between threads.
pub type SearcherManager = ReferenceManager<Arc<IndexSearcher>>;

/// Builds the searcher for each newly opened reader.
pub trait SearcherFactory: Send + Sync {
    /// A searcher over exactly `reader`. `previous` is the reader being
    /// replaced, if any, for warming purposes.
    fn new_searcher(
        &self,
        reader: Arc<IndexReader>,
        previous: Option<&IndexReader>,
    ) -> Result<IndexSearcher>;
}

/// Builds plain searchers with the configured similarity.
#[derive(Debug, Clone, Default)]
pub struct DefaultSearcherFactory {
    config: SearchConfig,
}

impl DefaultSearcherFactory {
    pub fn new(config: SearchConfig) -> Self {
        DefaultSearcherFactory { config }
    }
}

impl SearcherFactory for DefaultSearcherFactory {
    fn new_searcher(
        &self,
        reader: Arc<IndexReader>,
        _previous: Option<&IndexReader>,
    ) -> Result<IndexSearcher> {
        Ok(IndexSearcher::with_config(reader, &self.config))
    }
}

/// Opens newer readers over a changing index.
pub trait ReaderReopener: Send + Sync {
    /// A reader reflecting changes newer than `reader`, or `None` if there
    /// are none. The returned reader carries one count owned by the caller.
    fn reopen(&self, reader: &IndexReader) -> Result<Option<Arc<IndexReader>>>;

    /// Whether `reader` reflects every change.
    fn is_current(&self, reader: &IndexReader) -> Result<bool>;
}

/// A reopener for an index that never changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticReopener;

impl ReaderReopener for StaticReopener {
    fn reopen(&self, _reader: &IndexReader) -> Result<Option<Arc<IndexReader>>> {
        Ok(None)
    }

    fn is_current(&self, _reader: &IndexReader) -> Result<bool> {
        Ok(true)
    }
}

struct PublishedSegments {
    segments: Vec<Arc<dyn LeafReader>>,
    generation: u64,
    /// Version of the first reader opened over the current generation.
    opened_version: Option<u64>,
}

/// Reopens onto whatever segment list was last published.
///
/// Stands in for an index writer: every [`publish`](Self::publish) makes a
/// new generation, and readers opened before it become stale.
pub struct SegmentListReopener {
    state: Mutex<PublishedSegments>,
}

impl fmt::Debug for SegmentListReopener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SegmentListReopener")
            .field("segments", &state.segments.len())
            .field("generation", &state.generation)
            .finish()
    }
}

impl SegmentListReopener {
    pub fn new(segments: Vec<Arc<dyn LeafReader>>) -> Self {
        SegmentListReopener {
            state: Mutex::new(PublishedSegments {
                segments,
                generation: 0,
                opened_version: None,
            }),
        }
    }

    /// Replace the segment list.
    pub fn publish(&self, segments: Vec<Arc<dyn LeafReader>>) {
        let mut state = self.state.lock();
        state.segments = segments;
        state.generation += 1;
        state.opened_version = None;
    }

    /// Append one segment to the list.
    pub fn add_segment(&self, segment: Arc<dyn LeafReader>) {
        let mut state = self.state.lock();
        state.segments.push(segment);
        state.generation += 1;
        state.opened_version = None;
    }

    /// Number of publications so far.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// A reader over the current segment list.
    pub fn open_reader(&self) -> Arc<IndexReader> {
        let mut state = self.state.lock();
        let reader = Arc::new(IndexReader::new(state.segments.clone()));
        if state.opened_version.is_none() {
            state.opened_version = Some(reader.version());
        }
        reader
    }
}

impl ReaderReopener for SegmentListReopener {
    fn reopen(&self, reader: &IndexReader) -> Result<Option<Arc<IndexReader>>> {
        if self.is_current(reader)? {
            return Ok(None);
        }
        Ok(Some(self.open_reader()))
    }

    fn is_current(&self, reader: &IndexReader) -> Result<bool> {
        reader.ensure_open()?;
        let state = self.state.lock();
        Ok(state
            .opened_version
            .is_some_and(|version| reader.version() >= version))
    }
}

/// Wrap `reader` in a searcher from `factory`, taking over the caller's
/// count on `reader`. The count is dropped if no searcher comes out.
fn get_searcher(
    factory: &dyn SearcherFactory,
    reader: Arc<IndexReader>,
    previous: Option<&IndexReader>,
) -> Result<Arc<IndexSearcher>> {
    let searcher = match factory.new_searcher(Arc::clone(&reader), previous) {
        Ok(searcher) => searcher,
        Err(err) => {
            reader.dec_ref()?;
            return Err(err);
        }
    };
    if !Arc::ptr_eq(searcher.reader(), &reader) {
        reader.dec_ref()?;
        return Err(HastaError::illegal_state(format!(
            "SearcherFactory must wrap exactly the provided reader (got reader version {} but expected {})",
            searcher.reader().version(),
            reader.version()
        )));
    }
    Ok(Arc::new(searcher))
}

struct SearcherRefresher {
    factory: Arc<dyn SearcherFactory>,
    reopener: Arc<dyn ReaderReopener>,
}

impl ReferenceRefresher<Arc<IndexSearcher>> for SearcherRefresher {
    fn refresh_if_needed(&self, current: &Arc<IndexSearcher>) -> Result<Option<Arc<IndexSearcher>>> {
        let previous = current.reader();
        let Some(reader) = self.reopener.reopen(previous)? else {
            return Ok(None);
        };
        debug!(
            target: "hasta::search",
            previous = previous.version(),
            version = reader.version(),
            "opened new reader"
        );
        get_searcher(self.factory.as_ref(), reader, Some(previous)).map(Some)
    }

    fn is_current(&self, current: &Arc<IndexSearcher>) -> Result<bool> {
        self.reopener.is_current(current.reader())
    }
}

impl ReferenceManager<Arc<IndexSearcher>> {
    /// Manage searchers starting from `reader`, taking over the caller's
    /// count on it.
    pub fn open(
        reader: Arc<IndexReader>,
        factory: Arc<dyn SearcherFactory>,
        reopener: Arc<dyn ReaderReopener>,
    ) -> Result<Self> {
        let searcher = get_searcher(factory.as_ref(), reader, None)?;
        Ok(ReferenceManager::new(
            searcher,
            Box::new(SearcherRefresher { factory, reopener }),
        ))
    }

    /// Whether the current searcher sees every change to the index.
    pub fn is_searcher_current(&self) -> Result<bool> {
        self.is_current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Term;
    use crate::query::TermQuery;
    use crate::search::phrase::test_support::segment;

    struct ForeignReaderFactory;

    impl SearcherFactory for ForeignReaderFactory {
        fn new_searcher(
            &self,
            _reader: Arc<IndexReader>,
            _previous: Option<&IndexReader>,
        ) -> Result<IndexSearcher> {
            let segments: Vec<Arc<dyn LeafReader>> = vec![segment(&["other"])];
            Ok(IndexSearcher::new(Arc::new(IndexReader::new(segments))))
        }
    }

    fn hits(manager: &SearcherManager, text: &str) -> i64 {
        let searcher = manager.acquire().unwrap();
        let count = searcher.count(&TermQuery::new(Term::new("f", text))).unwrap();
        manager.release(searcher).unwrap();
        count
    }

    #[test]
    fn test_refresh_picks_up_new_segments() {
        let reopener = Arc::new(SegmentListReopener::new(vec![segment(&["apple", "banana"])]));
        let manager = SearcherManager::open(
            reopener.open_reader(),
            Arc::new(DefaultSearcherFactory::default()),
            reopener.clone(),
        )
        .unwrap();
        assert!(manager.is_searcher_current().unwrap());
        assert_eq!(hits(&manager, "apple"), 1);

        reopener.add_segment(segment(&["apple pie"]));
        assert!(!manager.is_searcher_current().unwrap());
        assert_eq!(hits(&manager, "apple"), 1);

        assert!(manager.maybe_refresh().unwrap());
        assert!(manager.is_searcher_current().unwrap());
        assert_eq!(hits(&manager, "apple"), 2);
    }

    #[test]
    fn test_refresh_without_changes_keeps_searcher() {
        let reopener = Arc::new(SegmentListReopener::new(vec![segment(&["apple"])]));
        let manager = SearcherManager::open(
            reopener.open_reader(),
            Arc::new(DefaultSearcherFactory::default()),
            reopener.clone(),
        )
        .unwrap();
        let before = manager.acquire().unwrap();
        manager.maybe_refresh_blocking().unwrap();
        let after = manager.acquire().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        manager.release(before).unwrap();
        manager.release(after).unwrap();
    }

    #[test]
    fn test_factory_must_wrap_given_reader() {
        let segments: Vec<Arc<dyn LeafReader>> = vec![segment(&["apple"])];
        let reader = Arc::new(IndexReader::new(segments));
        let result = SearcherManager::open(
            Arc::clone(&reader),
            Arc::new(ForeignReaderFactory),
            Arc::new(StaticReopener),
        );
        assert!(matches!(result, Err(HastaError::IllegalState(_))));
        assert_eq!(reader.ref_count(), 0);
    }

    #[test]
    fn test_close_releases_reader() {
        let segments: Vec<Arc<dyn LeafReader>> = vec![segment(&["apple"])];
        let reader = Arc::new(IndexReader::new(segments));
        let manager = SearcherManager::open(
            Arc::clone(&reader),
            Arc::new(DefaultSearcherFactory::default()),
            Arc::new(StaticReopener),
        )
        .unwrap();
        manager.close().unwrap();
        assert_eq!(reader.ref_count(), 0);
        assert!(manager.is_searcher_current().is_err());
    }
}
