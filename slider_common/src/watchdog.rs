//! # Task Watchdog
//!
//! Liveness supervision for the long-running motion tasks.
//!
//! Each task registers once and receives a [`Heartbeat`]. It feeds the
//! heartbeat at every suspension point: idle queue poll, every step batch,
//! every servo degree, every pause tick. The supervisor loop calls
//! [`TaskWatchdog::check`] and reports tasks whose last feed is older than
//! the configured timeout.
//!
//! Detection only. A stale task is a programming error; nothing is restarted.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Health of one registered task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Heartbeat fed within the timeout.
    Healthy,
    /// Heartbeat older than the timeout (possible hang).
    Stale {
        /// Milliseconds since the last feed.
        age_ms: u64,
    },
}

impl HealthStatus {
    /// `true` for [`HealthStatus::Healthy`].
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

#[derive(Debug)]
struct Slot {
    name: String,
    last_feed_ms: AtomicU64,
    active: AtomicBool,
}

#[derive(Debug)]
struct Inner {
    epoch: Instant,
    timeout: Duration,
    slots: Mutex<Vec<Arc<Slot>>>,
}

impl Inner {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Registry of task heartbeats. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TaskWatchdog {
    inner: Arc<Inner>,
}

impl TaskWatchdog {
    /// Create a watchdog with the given staleness timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                epoch: Instant::now(),
                timeout,
                slots: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Configured staleness timeout.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Subscribe a task. The returned heartbeat starts fed.
    pub fn register(&self, name: impl Into<String>) -> Heartbeat {
        let slot = Arc::new(Slot {
            name: name.into(),
            last_feed_ms: AtomicU64::new(self.inner.now_ms()),
            active: AtomicBool::new(true),
        });
        self.inner.slots.lock().push(Arc::clone(&slot));
        Heartbeat {
            slot,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Health of every subscribed task, in registration order.
    ///
    /// Unsubscribed tasks are pruned.
    pub fn check(&self) -> Vec<(String, HealthStatus)> {
        let now = self.inner.now_ms();
        let timeout_ms = self.inner.timeout.as_millis() as u64;
        let mut slots = self.inner.slots.lock();
        slots.retain(|s| s.active.load(Ordering::Acquire));
        slots
            .iter()
            .map(|s| {
                let age_ms = now.saturating_sub(s.last_feed_ms.load(Ordering::Acquire));
                let status = if age_ms > timeout_ms {
                    HealthStatus::Stale { age_ms }
                } else {
                    HealthStatus::Healthy
                };
                (s.name.clone(), status)
            })
            .collect()
    }

    /// Number of subscribed tasks.
    pub fn task_count(&self) -> usize {
        self.inner
            .slots
            .lock()
            .iter()
            .filter(|s| s.active.load(Ordering::Acquire))
            .count()
    }
}

impl Default for TaskWatchdog {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::consts::DEFAULT_WATCHDOG_TIMEOUT_MS))
    }
}

/// Feed handle owned by one task. Dropping it unsubscribes the task.
#[derive(Debug)]
pub struct Heartbeat {
    slot: Arc<Slot>,
    inner: Arc<Inner>,
}

impl Heartbeat {
    /// Record that the task is alive.
    #[inline]
    pub fn feed(&self) {
        self.slot
            .last_feed_ms
            .store(self.inner.now_ms(), Ordering::Release);
    }

    /// Registered task name.
    pub fn name(&self) -> &str {
        &self.slot.name
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.slot.active.store(false, Ordering::Release);
    }
}
