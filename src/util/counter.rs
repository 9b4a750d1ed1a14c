//! Monotonic millisecond counters for time-limited collection.
//!
//! Reading the wall clock on every collected document is too expensive, so
//! time limits are checked against a [`Counter`] that a background
//! [`TimerThread`] advances at a fixed resolution.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;

/// A monotonically increasing tick source.
pub trait Counter: Send + Sync + Debug {
    /// Current tick value.
    fn get(&self) -> i64;
}

/// A counter advanced explicitly by the caller.
#[derive(Debug, Default)]
pub struct ManualCounter {
    value: AtomicI64,
}

impl ManualCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` and return the new value.
    pub fn add_and_get(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::AcqRel) + delta
    }
}

impl Counter for ManualCounter {
    fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }
}

/// Default tick resolution of [`TimerThread`].
pub const DEFAULT_TIMER_RESOLUTION: Duration = Duration::from_millis(20);

#[derive(Debug)]
struct TimerShared {
    ticks: AtomicI64,
    stop: AtomicBool,
}

/// A background thread that adds its resolution (in milliseconds) to a
/// shared counter after every sleep.
#[derive(Debug)]
pub struct TimerThread {
    shared: Arc<TimerShared>,
    resolution: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// A [`Counter`] view of a [`TimerThread`].
#[derive(Debug, Clone)]
pub struct TimerCounter {
    shared: Arc<TimerShared>,
}

impl Counter for TimerCounter {
    fn get(&self) -> i64 {
        self.shared.ticks.load(Ordering::Acquire)
    }
}

impl TimerThread {
    /// Spawn a timer thread ticking every `resolution`.
    pub fn start(resolution: Duration) -> Result<Self> {
        let shared = Arc::new(TimerShared {
            ticks: AtomicI64::new(0),
            stop: AtomicBool::new(false),
        });
        let worker = Arc::clone(&shared);
        let step = resolution.as_millis().max(1) as i64;
        let handle = std::thread::Builder::new()
            .name("hasta-timer".to_string())
            .spawn(move || {
                while !worker.stop.load(Ordering::Acquire) {
                    std::thread::sleep(resolution);
                    worker.ticks.fetch_add(step, Ordering::AcqRel);
                }
            })?;
        debug!(target: "hasta::timer", resolution_ms = step, "timer thread started");

        Ok(TimerThread {
            shared,
            resolution,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Tick resolution.
    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Elapsed milliseconds as seen by the timer.
    pub fn milliseconds(&self) -> i64 {
        self.shared.ticks.load(Ordering::Acquire)
    }

    /// A counter that reads this timer.
    pub fn counter(&self) -> Arc<dyn Counter> {
        Arc::new(TimerCounter {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop_timer(&self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
            debug!(target: "hasta::timer", "timer thread stopped");
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.stop_timer();
    }
}
