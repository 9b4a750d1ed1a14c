//! Abandoning collection once a time budget is spent.

use std::sync::Arc;

use tracing::warn;

use crate::error::{HastaError, Result};
use crate::index::DocId;
use crate::index::reader::LeafReaderContext;
use crate::search::collector::Collector;
use crate::search::scorer::Scorer;
use crate::util::counter::Counter;

/// Wraps a collector and fails with [`HastaError::TimeExceeded`] when the
/// counter passes the allowed number of ticks.
///
/// The baseline is taken lazily at the first leaf unless set explicitly with
/// [`set_baseline`](Self::set_baseline). Hits gathered before the timeout
/// stay in the wrapped collector, reachable through
/// [`inner`](Self::inner) or [`into_inner`](Self::into_inner).
#[derive(Debug)]
pub struct TimeLimitingCollector<C> {
    inner: C,
    counter: Arc<dyn Counter>,
    ticks_allowed: i64,
    t0: Option<i64>,
    timeout: i64,
    greedy: bool,
    doc_base: DocId,
    last_doc: DocId,
}

impl<C: Collector> TimeLimitingCollector<C> {
    pub fn new(inner: C, counter: Arc<dyn Counter>, ticks_allowed: i64) -> Self {
        TimeLimitingCollector {
            inner,
            counter,
            ticks_allowed,
            t0: None,
            timeout: i64::MAX,
            greedy: false,
            doc_base: 0,
            last_doc: -1,
        }
    }

    /// Start the budget at the counter's current value.
    pub fn set_baseline(&mut self) {
        let now = self.counter.get();
        self.set_baseline_at(now);
    }

    /// Start the budget at `ticks`.
    pub fn set_baseline_at(&mut self, ticks: i64) {
        self.t0 = Some(ticks);
        self.timeout = ticks.saturating_add(self.ticks_allowed);
    }

    /// In greedy mode the doc that hits the timeout is still collected.
    pub fn set_greedy(&mut self, greedy: bool) {
        self.greedy = greedy;
    }

    pub fn is_greedy(&self) -> bool {
        self.greedy
    }

    /// Last top-level doc handed to the wrapped collector, or -1.
    pub fn last_doc_collected(&self) -> DocId {
        self.last_doc
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Collector> Collector for TimeLimitingCollector<C> {
    fn set_next_reader(&mut self, context: &LeafReaderContext) -> Result<()> {
        self.inner.set_next_reader(context)?;
        self.doc_base = context.doc_base;
        if self.t0.is_none() {
            self.set_baseline();
        }
        Ok(())
    }

    fn collect(&mut self, doc: DocId, scorer: &dyn Scorer) -> Result<()> {
        let time = self.counter.get();
        if self.timeout < time {
            if self.greedy {
                self.inner.collect(doc, scorer)?;
                self.last_doc = self.doc_base + doc;
            }
            let t0 = self.t0.unwrap_or(time);
            warn!(
                target: "hasta::search",
                allowed = self.timeout - t0,
                elapsed = time - t0,
                last_doc = self.last_doc,
                "time limit exceeded, abandoning collection"
            );
            return Err(HastaError::time_exceeded(
                self.timeout - t0,
                time - t0,
                self.last_doc,
            ));
        }
        self.inner.collect(doc, scorer)?;
        self.last_doc = self.doc_base + doc;
        Ok(())
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        self.inner.accepts_docs_out_of_order()
    }
}
