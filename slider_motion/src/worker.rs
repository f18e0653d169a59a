//! Generic single-axis worker.
//!
//! One bounded FIFO queue and one dedicated task per axis. The task blocks
//! on the queue with a short timeout so it can feed its heartbeat and run
//! the executor's idle housekeeping between commands.
//!
//! ```text
//!  gateway / sequencer            worker task
//!  ───────────────────            ───────────
//!  AxisPort::submit ──► [ queue (10) ] ──► AxisExecutor::execute
//!        ▲                                        │
//!        └──────────── Completion ◄───────────────┘
//! ```
//!
//! Two cancellation paths:
//!
//! - [`AxisPort::stop`] purges the queue and bumps a generation counter.
//!   Every queued command is stamped with the generation current at
//!   submission, so anything that raced the purge is discarded at intake
//!   with a `debug!` and still wakes its waiter.
//! - [`AxisPort::abort`] marks the command in flight, identified by its
//!   execution id, as aborted and leaves the queue alone.
//!
//! Either way the in-flight command sees its [`CancelToken`] fire at the
//! next step boundary.

use crate::error::MotionError;
use crate::task::{TaskSpec, spawn_task};
use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, bounded,
};
use slider_common::consts::{
    COMMAND_QUEUE_CAPACITY, COMPLETION_POLL_INTERVAL, ENQUEUE_TIMEOUT, WORKER_POLL_INTERVAL,
};
use slider_common::motion::{ServoCommand, StepperCommand};
use slider_common::watchdog::{Heartbeat, TaskWatchdog};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

// ─── Contracts ──────────────────────────────────────────────────────

/// A command that can travel through an axis queue.
pub trait AxisCommand: Send + 'static {
    /// The submitter blocks until the command has been executed.
    fn wait_completion(&self) -> bool;
}

impl AxisCommand for StepperCommand {
    fn wait_completion(&self) -> bool {
        self.wait_completion
    }
}

impl AxisCommand for ServoCommand {
    fn wait_completion(&self) -> bool {
        self.wait_completion
    }
}

/// Axis-specific motion, run on the worker task.
pub trait AxisExecutor: Send + 'static {
    /// Command type accepted by this axis.
    type Command: AxisCommand;

    /// Execute one command to completion or until `cancel` fires.
    ///
    /// Must feed `heartbeat` at least every few hundred milliseconds.
    fn execute(&mut self, cmd: Self::Command, cancel: &CancelToken, heartbeat: &Heartbeat);

    /// Housekeeping between commands, once per idle poll.
    fn idle(&mut self) {}
}

// ─── Shared state ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct WorkerShared {
    moving: AtomicBool,
    generation: AtomicU64,
    /// Id of the last command handed to the executor; ids start at 1.
    current: AtomicU64,
    /// Id of the last aborted command.
    aborted: AtomicU64,
}

struct Envelope<C> {
    cmd: C,
    generation: u64,
    done: Option<Sender<()>>,
}

/// Cooperative abort flag of one in-flight command.
#[derive(Debug, Clone)]
pub struct CancelToken {
    shared: Arc<WorkerShared>,
    generation: u64,
    id: u64,
}

impl CancelToken {
    /// `true` once `stop()` was called after submission or `abort()`
    /// while this command was in flight.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.aborted.load(Ordering::Acquire) == self.id
            || self.shared.generation.load(Ordering::Acquire) != self.generation
    }

    /// Token that never fires. For driving executors directly.
    pub fn never() -> Self {
        Self {
            shared: Arc::new(WorkerShared::default()),
            generation: 0,
            id: 1,
        }
    }
}

/// Completion signal of one tracked command.
///
/// Fires when the command finished, was cancelled or was discarded.
#[derive(Debug)]
pub struct Completion {
    rx: Receiver<()>,
}

impl Completion {
    /// Block until the command is done, polling every 10 ms.
    pub fn wait(self) {
        self.wait_with(|| {});
    }

    /// Block until done, calling `tick` at every poll.
    pub fn wait_with(self, mut tick: impl FnMut()) {
        loop {
            match self.rx.recv_timeout(COMPLETION_POLL_INTERVAL) {
                Err(RecvTimeoutError::Timeout) => tick(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    /// Non-blocking check.
    pub fn is_done(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }
}

// ─── Port ───────────────────────────────────────────────────────────

/// Client handle to an axis queue. Cheap to clone; does not own the task.
pub struct AxisPort<C> {
    axis: &'static str,
    tx: Sender<Envelope<C>>,
    rx: Receiver<Envelope<C>>,
    shared: Arc<WorkerShared>,
}

impl<C> Clone for AxisPort<C> {
    fn clone(&self) -> Self {
        Self {
            axis: self.axis,
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: AxisCommand> AxisPort<C> {
    fn new(axis: &'static str) -> Self {
        let (tx, rx) = bounded(COMMAND_QUEUE_CAPACITY);
        Self {
            axis,
            tx,
            rx,
            shared: Arc::new(WorkerShared::default()),
        }
    }

    /// Enqueue a command, waiting at most 100 ms for queue space.
    ///
    /// Returns `false` if the queue stayed full. With `wait_completion` set
    /// the call returns only after the command was executed or discarded.
    pub fn submit(&self, cmd: C) -> bool {
        if cmd.wait_completion() {
            match self.submit_tracked(cmd) {
                Some(completion) => {
                    completion.wait();
                    true
                }
                None => false,
            }
        } else {
            self.enqueue(cmd, None)
        }
    }

    /// Enqueue a command and return its completion signal.
    ///
    /// `None` if the queue stayed full. Ignores `wait_completion`.
    pub fn submit_tracked(&self, cmd: C) -> Option<Completion> {
        let (done_tx, done_rx) = bounded(1);
        self.enqueue(cmd, Some(done_tx))
            .then_some(Completion { rx: done_rx })
    }

    fn enqueue(&self, cmd: C, done: Option<Sender<()>>) -> bool {
        let envelope = Envelope {
            cmd,
            generation: self.shared.generation.load(Ordering::Acquire),
            done,
        };
        match self.tx.send_timeout(envelope, ENQUEUE_TIMEOUT) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(axis = self.axis, "command queue full, command rejected");
                false
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                warn!(axis = self.axis, "worker gone, command rejected");
                false
            }
        }
    }

    /// Clear pending commands and cancel the one in flight.
    pub fn stop(&self) {
        let mut dropped = 0usize;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        debug!(axis = self.axis, dropped, "axis stop requested");
    }

    /// Cancel the command in flight, if any. Queued commands still run.
    ///
    /// Never blocks; safe from the limit monitor task.
    #[inline]
    pub fn abort(&self) {
        let current = self.shared.current.load(Ordering::Acquire);
        self.shared.aborted.store(current, Ordering::Release);
    }

    /// A command is being executed.
    #[inline]
    pub fn is_moving(&self) -> bool {
        self.shared.moving.load(Ordering::Acquire)
    }

    /// Commands waiting in the queue.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }

    /// Axis name used in logs.
    pub fn axis(&self) -> &'static str {
        self.axis
    }
}

// ─── Worker ─────────────────────────────────────────────────────────

/// Owner of one axis task. Stops and joins the task on drop.
pub struct AxisWorker<C: AxisCommand> {
    port: AxisPort<C>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<C: AxisCommand> AxisWorker<C> {
    /// Spawn the task that runs `executor`.
    ///
    /// # Errors
    /// `MotionError::TaskSpawn` if the thread cannot be created.
    pub fn spawn<E>(spec: TaskSpec, executor: E, watchdog: &TaskWatchdog) -> Result<Self, MotionError>
    where
        E: AxisExecutor<Command = C>,
    {
        let port = AxisPort::new(spec.name);
        let running = Arc::new(AtomicBool::new(true));
        let heartbeat = watchdog.register(spec.name);

        let task_port = port.clone();
        let task_running = Arc::clone(&running);
        let handle = spawn_task(spec, move || {
            run_worker(executor, task_port, task_running, heartbeat)
        })?;

        Ok(Self {
            port,
            running,
            handle: Some(handle),
        })
    }

    /// Client handle to the queue.
    pub fn port(&self) -> AxisPort<C> {
        self.port.clone()
    }

    /// Stop the task and wait for it to exit.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        self.port.stop();
        if let Some(Err(_)) = self.handle.take().map(JoinHandle::join) {
            error!(axis = self.port.axis, "worker task panicked");
        }
    }
}

impl<C: AxisCommand> Drop for AxisWorker<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<E: AxisExecutor>(
    mut executor: E,
    port: AxisPort<E::Command>,
    running: Arc<AtomicBool>,
    heartbeat: Heartbeat,
) {
    info!(axis = port.axis, "worker started");
    while running.load(Ordering::Acquire) {
        heartbeat.feed();
        match port.rx.recv_timeout(WORKER_POLL_INTERVAL) {
            Ok(envelope) => {
                let generation = port.shared.generation.load(Ordering::Acquire);
                if envelope.generation != generation {
                    debug!(axis = port.axis, "command issued before stop discarded");
                    continue;
                }
                let id = port.shared.current.fetch_add(1, Ordering::AcqRel) + 1;
                let cancel = CancelToken {
                    shared: Arc::clone(&port.shared),
                    generation,
                    id,
                };
                port.shared.moving.store(true, Ordering::Release);
                executor.execute(envelope.cmd, &cancel, &heartbeat);
                port.shared.moving.store(false, Ordering::Release);
                if let Some(done) = envelope.done {
                    let _ = done.send(());
                }
            }
            Err(RecvTimeoutError::Timeout) => executor.idle(),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(axis = port.axis, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::SERVO_TASK;
    use parking_lot::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, Copy)]
    struct Job {
        id: u32,
        hold: Duration,
        wait: bool,
    }

    impl AxisCommand for Job {
        fn wait_completion(&self) -> bool {
            self.wait
        }
    }

    fn job(id: u32, hold_ms: u64) -> Job {
        Job {
            id,
            hold: Duration::from_millis(hold_ms),
            wait: false,
        }
    }

    /// Records job ids; holds each job for its duration unless cancelled.
    struct Recorder {
        log: Arc<Mutex<Vec<(u32, bool)>>>,
    }

    impl AxisExecutor for Recorder {
        type Command = Job;

        fn execute(&mut self, cmd: Job, cancel: &CancelToken, heartbeat: &Heartbeat) {
            let deadline = Instant::now() + cmd.hold;
            let mut cancelled = false;
            while Instant::now() < deadline {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                heartbeat.feed();
                thread::sleep(Duration::from_millis(1));
            }
            self.log.lock().push((cmd.id, cancelled));
        }
    }

    fn spawn_recorder() -> (AxisWorker<Job>, Arc<Mutex<Vec<(u32, bool)>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let worker = AxisWorker::spawn(
            SERVO_TASK,
            Recorder {
                log: Arc::clone(&log),
            },
            &TaskWatchdog::default(),
        )
        .unwrap();
        (worker, log)
    }

    fn wait_until(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn commands_run_in_submission_order() {
        let (worker, log) = spawn_recorder();
        let port = worker.port();
        for id in 0..5 {
            assert!(port.submit(job(id, 2)));
        }
        let last = port.submit_tracked(job(5, 0)).unwrap();
        last.wait();
        let ids: Vec<u32> = log.lock().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn full_queue_rejects_after_bounded_wait() {
        let (worker, _log) = spawn_recorder();
        let port = worker.port();
        assert!(port.submit(job(0, 2_000)));
        wait_until(|| port.is_moving());
        for id in 1..=COMMAND_QUEUE_CAPACITY as u32 {
            assert!(port.submit(job(id, 0)), "slot {id} should be free");
        }
        let start = Instant::now();
        assert!(!port.submit(job(99, 0)));
        let waited = start.elapsed();
        assert!(waited >= ENQUEUE_TIMEOUT - Duration::from_millis(5));
        assert!(waited < Duration::from_secs(1));
        assert_eq!(port.pending(), COMMAND_QUEUE_CAPACITY);
        port.stop();
    }

    #[test]
    fn wait_completion_blocks_until_executed() {
        let (worker, log) = spawn_recorder();
        let port = worker.port();
        let start = Instant::now();
        assert!(port.submit(Job {
            id: 7,
            hold: Duration::from_millis(50),
            wait: true,
        }));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(log.lock().as_slice(), &[(7, false)]);
        assert!(!port.is_moving());
    }

    #[test]
    fn stop_cancels_in_flight_and_drops_queue() {
        let (worker, log) = spawn_recorder();
        let port = worker.port();
        let first = port.submit_tracked(job(1, 5_000)).unwrap();
        let queued = port.submit_tracked(job(2, 0)).unwrap();
        wait_until(|| port.is_moving());
        port.stop();
        first.wait();
        queued.wait();
        assert_eq!(log.lock().as_slice(), &[(1, true)]);
        assert_eq!(port.pending(), 0);

        // The axis accepts new work after a stop.
        assert!(port.submit_tracked(job(3, 0)).map(Completion::wait).is_some());
        assert_eq!(log.lock().last(), Some(&(3, false)));
    }

    #[test]
    fn abort_cancels_only_the_command_in_flight() {
        let (worker, log) = spawn_recorder();
        let port = worker.port();
        let first = port.submit_tracked(job(1, 5_000)).unwrap();
        let queued = port.submit_tracked(job(2, 20)).unwrap();
        wait_until(|| port.is_moving());
        port.abort();
        first.wait();
        queued.wait();
        assert_eq!(log.lock().as_slice(), &[(1, true), (2, false)]);
    }

    #[test]
    fn abort_while_idle_does_not_cancel_next_command() {
        let (worker, log) = spawn_recorder();
        let port = worker.port();
        port.abort();
        assert!(port.submit(Job {
            id: 4,
            hold: Duration::from_millis(20),
            wait: true,
        }));
        assert_eq!(log.lock().as_slice(), &[(4, false)]);
    }

    #[test]
    fn shutdown_joins_task() {
        let (mut worker, _log) = spawn_recorder();
        let port = worker.port();
        let start = Instant::now();
        worker.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!port.is_moving());
    }
}
