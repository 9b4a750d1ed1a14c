//! A background thread that keeps a [`ReferenceManager`] fresh.
//!
//! Changes to the index are stamped with a generation by a
//! [`TrackingGeneration`]. The thread refreshes the manager at least every
//! `target_max_stale`, and within `target_min_stale` while some caller is
//! waiting for a generation to become searchable.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::error::{HastaError, Result};
use crate::search::reference_manager::{RefCounted, ReferenceManager, RefreshListener};

/// Generation counter shared by the writing side and the reopen thread.
///
/// A change recorded at generation `g` is searchable once a refresh that
/// started after the counter moved past `g` has finished.
#[derive(Debug)]
pub struct TrackingGeneration {
    generation: AtomicI64,
}

impl Default for TrackingGeneration {
    fn default() -> Self {
        TrackingGeneration {
            generation: AtomicI64::new(1),
        }
    }
}

impl TrackingGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a change to the index; returns the generation to wait for.
    pub fn record_change(&self) -> i64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The generation new changes are recorded at.
    pub fn generation(&self) -> i64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation, returning the one that just ended.
    pub fn get_and_increment_generation(&self) -> i64 {
        self.generation.fetch_add(1, Ordering::AcqRel)
    }
}

#[derive(Debug)]
struct ReopenState {
    searching_gen: i64,
    waiting_gen: i64,
    refresh_start_gen: i64,
    finish: bool,
}

struct Shared {
    state: Mutex<ReopenState>,
    /// Wakes the reopen thread early.
    reopen_cond: Condvar,
    /// Wakes callers blocked in `wait_for_generation`.
    generation_cond: Condvar,
}

impl RefreshListener for Shared {
    fn after_refresh(&self, _did_refresh: bool) {
        let mut state = self.state.lock();
        state.searching_gen = state.refresh_start_gen;
        trace!(target: "hasta::search", searching_gen = state.searching_gen, "generation searchable");
        self.generation_cond.notify_all();
    }
}

/// Periodically refreshes a [`ReferenceManager`] on a dedicated thread.
pub struct ControlledRealTimeReopenThread<G: RefCounted + 'static> {
    manager: Arc<ReferenceManager<G>>,
    tracking: Arc<TrackingGeneration>,
    shared: Arc<Shared>,
    listener: Arc<dyn RefreshListener>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl<G: RefCounted + 'static> ControlledRealTimeReopenThread<G> {
    /// Start refreshing `manager`.
    ///
    /// `target_max_stale` bounds staleness when nobody waits;
    /// `target_min_stale` bounds it while a caller waits for a generation.
    pub fn spawn(
        manager: Arc<ReferenceManager<G>>,
        tracking: Arc<TrackingGeneration>,
        target_max_stale: Duration,
        target_min_stale: Duration,
    ) -> Result<Self> {
        if target_max_stale < target_min_stale {
            return Err(HastaError::invalid_argument(format!(
                "target_max_stale (= {target_max_stale:?}) must be >= target_min_stale (= {target_min_stale:?})"
            )));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(ReopenState {
                searching_gen: 0,
                waiting_gen: 0,
                refresh_start_gen: 0,
                finish: false,
            }),
            reopen_cond: Condvar::new(),
            generation_cond: Condvar::new(),
        });
        let listener: Arc<dyn RefreshListener> = shared.clone();
        manager.add_listener(Arc::clone(&listener));

        let worker_manager = Arc::clone(&manager);
        let worker_tracking = Arc::clone(&tracking);
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("hasta-reopen".to_string())
            .spawn(move || {
                run(
                    &worker_manager,
                    &worker_tracking,
                    &worker_shared,
                    target_max_stale,
                    target_min_stale,
                )
            });
        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => {
                manager.remove_listener(&listener);
                return Err(err.into());
            }
        };

        Ok(ControlledRealTimeReopenThread {
            manager,
            tracking,
            shared,
            listener,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Block until generation `target` is searchable.
    pub fn wait_for_generation(&self, target: i64) -> Result<()> {
        self.wait(target, None).map(|_| ())
    }

    /// Block until generation `target` is searchable or `timeout` passes;
    /// returns whether the generation became searchable.
    pub fn wait_for_generation_timeout(&self, target: i64, timeout: Duration) -> Result<bool> {
        self.wait(target, Some(timeout))
    }

    /// The newest generation known to be searchable.
    pub fn searching_generation(&self) -> i64 {
        self.shared.state.lock().searching_gen
    }

    pub fn manager(&self) -> &Arc<ReferenceManager<G>> {
        &self.manager
    }

    /// Stop the thread and wake every waiter. Idempotent.
    pub fn close(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        {
            let mut state = self.shared.state.lock();
            state.finish = true;
            self.shared.reopen_cond.notify_one();
        }
        if handle.join().is_err() {
            warn!(target: "hasta::search", "reopen thread panicked");
        }

        // no refresh happens any more; release all waiters
        let mut state = self.shared.state.lock();
        state.searching_gen = i64::MAX;
        self.shared.generation_cond.notify_all();
        drop(state);
        self.manager.remove_listener(&self.listener);
        debug!(target: "hasta::search", "reopen thread closed");
    }

    fn wait(&self, target: i64, timeout: Option<Duration>) -> Result<bool> {
        let current = self.tracking.generation();
        if target > current {
            return Err(HastaError::invalid_argument(format!(
                "target generation {target} was never returned by the tracking generation (current generation {current})"
            )));
        }

        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.shared.state.lock();
        if target <= state.searching_gen {
            return Ok(true);
        }
        state.waiting_gen = state.waiting_gen.max(target);
        self.shared.reopen_cond.notify_one();

        while target > state.searching_gen {
            match deadline {
                None => self.shared.generation_cond.wait(&mut state),
                Some(deadline) => {
                    if self
                        .shared
                        .generation_cond
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return Ok(target <= state.searching_gen);
                    }
                }
            }
        }
        Ok(true)
    }
}

impl<G: RefCounted + 'static> Drop for ControlledRealTimeReopenThread<G> {
    fn drop(&mut self) {
        self.close();
    }
}

fn run<G: RefCounted>(
    manager: &ReferenceManager<G>,
    tracking: &TrackingGeneration,
    shared: &Shared,
    target_max_stale: Duration,
    target_min_stale: Duration,
) {
    let mut last_reopen_start = Instant::now();
    loop {
        {
            let mut state = shared.state.lock();
            loop {
                if state.finish {
                    return;
                }
                let has_waiting = state.waiting_gen > state.searching_gen;
                let stale = if has_waiting {
                    target_min_stale
                } else {
                    target_max_stale
                };
                let next_reopen = last_reopen_start + stale;
                if Instant::now() >= next_reopen {
                    break;
                }
                shared.reopen_cond.wait_until(&mut state, next_reopen);
            }
        }

        last_reopen_start = Instant::now();
        let start_gen = tracking.get_and_increment_generation();
        shared.state.lock().refresh_start_gen = start_gen;
        trace!(target: "hasta::search", start_gen, "reopen thread refreshing");
        if let Err(err) = manager.maybe_refresh_blocking() {
            warn!(target: "hasta::search", error = %err, "reopen thread stopping after failed refresh");
            // waiters must not block on a thread that is gone
            let mut state = shared.state.lock();
            state.searching_gen = i64::MAX;
            shared.generation_cond.notify_all();
            return;
        }
    }
}
