//! End-stop limit switch monitor.
//!
//! A dedicated task polls both sense lines at a fixed cadence (10 ms by
//! default), converts the raw level with the configured [`DiLogic`] and
//! debounces each line independently. Accepted transitions update the shared
//! [`LimitView`] and, on trigger, invoke the handler subscribed for that line
//! synchronously from the monitor task.
//!
//! The monitor task is the only writer of the limit state. [`LimitMonitor::reset`]
//! is a request that the task executes on its next poll.

use crate::error::MotionError;
use crate::task::{LIMIT_MONITOR_TASK, spawn_task};
use parking_lot::{Mutex, RwLock};
use slider_common::hal::config::LimitConfig;
use slider_common::hal::driver::SenseLine;
use slider_common::io::DiLogic;
use slider_common::status::EndstopStatus;
use slider_common::watchdog::{Heartbeat, TaskWatchdog};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

// ─── Debouncer ──────────────────────────────────────────────────────

/// Accepted transition of one debounced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Released → actuated.
    Triggered,
    /// Actuated → released.
    Released,
}

/// Rate-limiting debouncer for one line.
///
/// A change of the raw state is accepted only if at least `window` has
/// elapsed since the previous accepted transition. Triggered and released
/// transitions are treated identically. A rejected change is not latched:
/// the raw level is simply re-evaluated on the next sample.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    state: bool,
    last_transition: Option<Instant>,
}

impl Debouncer {
    /// Released debouncer with no transition history.
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            state: false,
            last_transition: None,
        }
    }

    /// Feed one raw sample taken at `now`.
    #[inline]
    pub fn update(&mut self, raw_active: bool, now: Instant) -> Option<Edge> {
        if raw_active == self.state {
            return None;
        }
        let settled = self
            .last_transition
            .is_none_or(|last| now.saturating_duration_since(last) >= self.window);
        if !settled {
            return None;
        }
        self.state = raw_active;
        self.last_transition = Some(now);
        Some(if raw_active {
            Edge::Triggered
        } else {
            Edge::Released
        })
    }

    /// Debounced state.
    #[inline]
    pub const fn is_active(&self) -> bool {
        self.state
    }

    /// Time of the last accepted transition.
    pub const fn last_transition(&self) -> Option<Instant> {
        self.last_transition
    }

    /// Back to released with no history.
    pub fn reset(&mut self) {
        self.state = false;
        self.last_transition = None;
    }
}

// ─── Events ─────────────────────────────────────────────────────────

/// Limit events a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitEvent {
    /// Minimum-end switch actuated.
    MinTriggered,
    /// Maximum-end switch actuated.
    MaxTriggered,
}

impl LimitEvent {
    const fn line(self) -> usize {
        match self {
            Self::MinTriggered => MIN,
            Self::MaxTriggered => MAX,
        }
    }
}

/// Handler invoked from the monitor task. Must not block.
pub type LimitHandler = Arc<dyn Fn() + Send + Sync>;

const MIN: usize = 0;
const MAX: usize = 1;
const LINE_NAMES: [&str; 2] = ["min", "max"];

// ─── Shared state ───────────────────────────────────────────────────

struct LimitShared {
    triggered: [AtomicBool; 2],
    last_transition: Mutex<[Option<Instant>; 2]>,
    reset_requested: AtomicBool,
    handlers: RwLock<[Option<LimitHandler>; 2]>,
}

impl LimitShared {
    fn new() -> Self {
        Self {
            triggered: [AtomicBool::new(false), AtomicBool::new(false)],
            last_transition: Mutex::new([None; 2]),
            reset_requested: AtomicBool::new(false),
            handlers: RwLock::new([None, None]),
        }
    }
}

/// Read-only view of the debounced limit state.
#[derive(Clone)]
pub struct LimitView {
    shared: Arc<LimitShared>,
}

impl LimitView {
    /// Minimum-end switch actuated.
    #[inline]
    pub fn min_triggered(&self) -> bool {
        self.shared.triggered[MIN].load(Ordering::Acquire)
    }

    /// Maximum-end switch actuated.
    #[inline]
    pub fn max_triggered(&self) -> bool {
        self.shared.triggered[MAX].load(Ordering::Acquire)
    }

    /// Either switch actuated.
    pub fn any_triggered(&self) -> bool {
        self.min_triggered() || self.max_triggered()
    }

    /// Last accepted transition times, `[min, max]`.
    pub fn last_transitions(&self) -> [Option<Instant>; 2] {
        *self.shared.last_transition.lock()
    }

    /// Snapshot for status export.
    pub fn status(&self) -> EndstopStatus {
        EndstopStatus {
            endstop_min: self.min_triggered(),
            endstop_max: self.max_triggered(),
        }
    }
}

// ─── Monitor ────────────────────────────────────────────────────────

/// Owner of the limit monitor task.
pub struct LimitMonitor {
    shared: Arc<LimitShared>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LimitMonitor {
    /// Spawn the monitor task over the given `(min, max)` sense lines.
    ///
    /// # Errors
    /// `MotionError::TaskSpawn` if the thread cannot be created.
    pub fn spawn(
        config: &LimitConfig,
        lines: (Box<dyn SenseLine>, Box<dyn SenseLine>),
        watchdog: &TaskWatchdog,
    ) -> Result<Self, MotionError> {
        let shared = Arc::new(LimitShared::new());
        let running = Arc::new(AtomicBool::new(true));
        let task = MonitorTask {
            lines: [lines.0, lines.1],
            logic: config.logic,
            debouncers: [
                Debouncer::new(config.debounce()),
                Debouncer::new(config.debounce()),
            ],
            poll_interval: config.poll_interval(),
            shared: Arc::clone(&shared),
            running: Arc::clone(&running),
            heartbeat: watchdog.register(LIMIT_MONITOR_TASK.name),
        };
        info!(
            logic = ?config.logic,
            debounce_ms = config.debounce_ms,
            poll_ms = config.poll_interval_ms,
            "starting limit monitor"
        );
        let handle = spawn_task(LIMIT_MONITOR_TASK, move || task.run())?;
        Ok(Self {
            shared,
            running,
            handle: Some(handle),
        })
    }

    /// Read-only view of the limit state.
    pub fn view(&self) -> LimitView {
        LimitView {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Register the handler for `event`, replacing any previous one.
    pub fn subscribe(&self, event: LimitEvent, handler: LimitHandler) {
        self.shared.handlers.write()[event.line()] = Some(handler);
        debug!(?event, "limit handler registered");
    }

    /// Remove the handler for `event`.
    pub fn unsubscribe(&self, event: LimitEvent) {
        self.shared.handlers.write()[event.line()] = None;
    }

    /// Clear both debounced states on the next poll.
    pub fn reset(&self) {
        self.shared.reset_requested.store(true, Ordering::Release);
    }

    /// Stop the task and wait for it to exit.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(Err(_)) = self.handle.take().map(JoinHandle::join) {
            error!("limit monitor task panicked");
        }
    }
}

impl Drop for LimitMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct MonitorTask {
    lines: [Box<dyn SenseLine>; 2],
    logic: DiLogic,
    debouncers: [Debouncer; 2],
    poll_interval: Duration,
    shared: Arc<LimitShared>,
    running: Arc<AtomicBool>,
    heartbeat: Heartbeat,
}

impl MonitorTask {
    fn run(mut self) {
        let mut next = Instant::now();
        while self.running.load(Ordering::Acquire) {
            self.heartbeat.feed();
            if self.shared.reset_requested.swap(false, Ordering::AcqRel) {
                self.apply_reset();
            }
            self.poll(Instant::now());

            // Absolute pacing; skip missed periods instead of bursting.
            next += self.poll_interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                next = now;
            }
        }
        debug!("limit monitor stopped");
    }

    fn poll(&mut self, now: Instant) {
        for line in [MIN, MAX] {
            let raw = self.logic.is_active(self.lines[line].is_high());
            let Some(edge) = self.debouncers[line].update(raw, now) else {
                continue;
            };
            self.shared.triggered[line].store(edge == Edge::Triggered, Ordering::Release);
            self.shared.last_transition.lock()[line] = Some(now);
            match edge {
                Edge::Triggered => {
                    warn!(line = LINE_NAMES[line], "limit switch triggered");
                    let handler = self.shared.handlers.read()[line].clone();
                    if let Some(handler) = handler {
                        handler();
                    }
                }
                Edge::Released => info!(line = LINE_NAMES[line], "limit switch released"),
            }
        }
    }

    fn apply_reset(&mut self) {
        for debouncer in &mut self.debouncers {
            debouncer.reset();
        }
        for flag in &self.shared.triggered {
            flag.store(false, Ordering::Release);
        }
        *self.shared.last_transition.lock() = [None; 2];
        info!("limit state reset");
    }
}
