//! Sequence catalog and orchestration.
//!
//! One sequence runs at a time on the sequencer task. The task works on a
//! copy of the sequence taken at start; the catalog itself is only changed
//! through the API below and refuses edits to the running sequence.
//!
//! Run state machine:
//!
//! ```text
//!  Idle ──execute──► Running ──(passes done | stop)──► Idle
//!                     │  ▲
//!               pause │  │ resume
//!                     ▼  │
//!                    Paused   (checked at movement boundaries)
//! ```
//!
//! `stop()` only requests termination and stops both axes; the task notices
//! at its next check and is the only one to clear `executing`.

use crate::servo::ServoHandle;
use crate::stepper::StepperHandle;
use crate::task::{SEQUENCER_TASK, spawn_task};
use crate::worker::Completion;
use parking_lot::Mutex;
use slider_common::consts::SEQUENCE_POLL_INTERVAL;
use slider_common::motion::{Movement, Sequence, ServoCommand};
use slider_common::status::{SequenceSummary, SequencerStatus};
use slider_common::watchdog::{Heartbeat, TaskWatchdog};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct RunState {
    active_index: Option<usize>,
    executing: bool,
    paused: bool,
    stop_requested: bool,
}

struct Shared {
    catalog: Mutex<Vec<Sequence>>,
    run: Mutex<RunState>,
}

/// Sequence catalog plus the execution task.
pub struct SequenceOrchestrator {
    shared: Arc<Shared>,
    stepper: StepperHandle,
    servo: ServoHandle,
    watchdog: TaskWatchdog,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SequenceOrchestrator {
    /// Orchestrator driving the given axes. No task runs until `execute_sequence`.
    pub fn new(stepper: StepperHandle, servo: ServoHandle, watchdog: TaskWatchdog) -> Self {
        Self {
            shared: Arc::new(Shared {
                catalog: Mutex::new(Vec::new()),
                run: Mutex::new(RunState::default()),
            }),
            stepper,
            servo,
            watchdog,
            task: Mutex::new(None),
        }
    }

    // ─── Catalog ────────────────────────────────────────────────────

    /// Append an empty sequence; returns its index.
    pub fn create_sequence(&self, name: &str) -> usize {
        let mut catalog = self.shared.catalog.lock();
        catalog.push(Sequence::new(name));
        let index = catalog.len() - 1;
        info!(index, name, "sequence created");
        index
    }

    /// Summaries of every sequence, in index order.
    pub fn list_sequences(&self) -> Vec<SequenceSummary> {
        self.shared
            .catalog
            .lock()
            .iter()
            .enumerate()
            .map(|(index, seq)| SequenceSummary {
                index,
                name: seq.name.clone(),
                movement_count: seq.movements.len(),
                loop_forever: seq.loop_forever,
                repeat_count: seq.repeat_count,
            })
            .collect()
    }

    /// Copy of one sequence.
    pub fn get_sequence(&self, index: usize) -> Option<Sequence> {
        self.shared.catalog.lock().get(index).cloned()
    }

    /// Number of sequences.
    pub fn sequence_count(&self) -> usize {
        self.shared.catalog.lock().len()
    }

    /// Append a movement. Rejected for a bad index or the running sequence.
    pub fn add_movement(&self, index: usize, movement: Movement) -> bool {
        self.edit(index, "add_movement", |seq| {
            seq.movements.push(movement);
            true
        })
    }

    /// Remove one movement. Rejected for bad indices or the running sequence.
    pub fn remove_movement(&self, index: usize, movement_index: usize) -> bool {
        self.edit(index, "remove_movement", |seq| {
            if movement_index < seq.movements.len() {
                seq.movements.remove(movement_index);
                true
            } else {
                false
            }
        })
    }

    /// Remove every movement. Rejected for a bad index or the running sequence.
    pub fn clear_sequence(&self, index: usize) -> bool {
        self.edit(index, "clear_sequence", |seq| {
            seq.movements.clear();
            true
        })
    }

    /// Set loop and repeat parameters.
    pub fn set_repeat(&self, index: usize, loop_forever: bool, repeat_count: u32) -> bool {
        self.edit(index, "set_repeat", |seq| {
            seq.loop_forever = loop_forever;
            seq.repeat_count = repeat_count;
            true
        })
    }

    /// Delete a sequence. Rejected while any sequence runs, since indices shift.
    pub fn delete_sequence(&self, index: usize) -> bool {
        let mut catalog = self.shared.catalog.lock();
        let run = self.shared.run.lock();
        if run.executing {
            warn!(index, "delete rejected while a sequence is executing");
            return false;
        }
        if index >= catalog.len() {
            return false;
        }
        let removed = catalog.remove(index);
        info!(index, name = %removed.name, "sequence deleted");
        true
    }

    fn edit(&self, index: usize, op: &str, f: impl FnOnce(&mut Sequence) -> bool) -> bool {
        let mut catalog = self.shared.catalog.lock();
        let run = self.shared.run.lock();
        if run.executing && run.active_index == Some(index) {
            warn!(index, op, "sequence is executing, edit rejected");
            return false;
        }
        drop(run);
        match catalog.get_mut(index) {
            Some(seq) => {
                let ok = f(seq);
                if ok {
                    debug!(index, op, "sequence edited");
                }
                ok
            }
            None => false,
        }
    }

    // ─── Execution ──────────────────────────────────────────────────

    /// Start running a sequence.
    ///
    /// Returns `false` without any state change if a sequence is already
    /// running or `index` is out of range.
    pub fn execute_sequence(&self, index: usize) -> bool {
        let sequence = {
            let catalog = self.shared.catalog.lock();
            let mut run = self.shared.run.lock();
            if run.executing {
                warn!(index, "sequence already executing, request rejected");
                return false;
            }
            let Some(sequence) = catalog.get(index).cloned() else {
                warn!(index, "no such sequence");
                return false;
            };
            run.executing = true;
            run.paused = false;
            run.stop_requested = false;
            run.active_index = Some(index);
            sequence
        };

        let mut task = self.task.lock();
        if let Some(Err(_)) = task.take().map(JoinHandle::join) {
            error!("previous sequencer task panicked");
        }

        let runner = SequenceRun {
            index,
            sequence,
            shared: Arc::clone(&self.shared),
            stepper: self.stepper.clone(),
            servo: self.servo.clone(),
            heartbeat: self.watchdog.register(SEQUENCER_TASK.name),
        };
        match spawn_task(SEQUENCER_TASK, move || runner.run()) {
            Ok(handle) => {
                *task = Some(handle);
                true
            }
            Err(e) => {
                error!("cannot start sequence: {e}");
                let mut run = self.shared.run.lock();
                run.executing = false;
                false
            }
        }
    }

    /// Withhold further movements at the next movement boundary.
    pub fn pause(&self) {
        let mut run = self.shared.run.lock();
        if run.executing && !run.paused {
            run.paused = true;
            info!("sequence paused");
        }
    }

    /// Continue a paused sequence.
    pub fn resume(&self) {
        let mut run = self.shared.run.lock();
        if run.paused {
            run.paused = false;
            info!("sequence resumed");
        }
    }

    /// Request termination and stop both axes.
    pub fn stop(&self) {
        {
            let mut run = self.shared.run.lock();
            if run.executing {
                run.stop_requested = true;
                info!("sequence stop requested");
            }
            run.paused = false;
        }
        self.stepper.stop();
        self.servo.stop();
    }

    /// A sequence task is running.
    pub fn is_executing(&self) -> bool {
        self.shared.run.lock().executing
    }

    /// Movements are being withheld.
    pub fn is_paused(&self) -> bool {
        self.shared.run.lock().paused
    }

    /// Run state snapshot.
    pub fn status(&self) -> SequencerStatus {
        let sequence_count = self.sequence_count();
        let run = self.shared.run.lock();
        SequencerStatus {
            is_executing: run.executing,
            is_paused: run.paused,
            active_sequence: run.active_index,
            sequence_count,
        }
    }

    /// Block until no sequence is executing or `timeout` elapses.
    ///
    /// Returns `true` if idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_executing() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Stop any running sequence and join the task.
    pub fn shutdown(&self) {
        self.stop();
        if let Some(Err(_)) = self.task.lock().take().map(JoinHandle::join) {
            error!("sequencer task panicked");
        }
    }
}

impl Drop for SequenceOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─── Sequencer task ─────────────────────────────────────────────────

struct SequenceRun {
    index: usize,
    sequence: Sequence,
    shared: Arc<Shared>,
    stepper: StepperHandle,
    servo: ServoHandle,
    heartbeat: Heartbeat,
}

impl SequenceRun {
    fn run(self) {
        info!(index = self.index, name = %self.sequence.name, "sequence started");
        let started = Instant::now();
        let mut passes = 0u32;
        let mut stopped = false;

        'passes: while self.sequence.loop_forever || passes < self.sequence.repeat_count {
            for (step, movement) in self.sequence.movements.iter().enumerate() {
                if !self.wait_while_paused() {
                    stopped = true;
                    break 'passes;
                }
                debug!(pass = passes, step, "executing movement");
                self.execute_movement(movement);
                if !self.dwell(movement.pause_after()) {
                    stopped = true;
                    break 'passes;
                }
            }
            passes += 1;
            if self.sequence.movements.is_empty() {
                break;
            }
        }

        {
            let mut run = self.shared.run.lock();
            stopped |= run.stop_requested;
            run.executing = false;
            run.paused = false;
            run.stop_requested = false;
        }
        info!(
            index = self.index,
            passes,
            stopped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sequence finished"
        );
    }

    /// Block while paused. `false` if a stop was requested.
    fn wait_while_paused(&self) -> bool {
        loop {
            let (paused, stop) = {
                let run = self.shared.run.lock();
                (run.paused, run.stop_requested)
            };
            if stop {
                return false;
            }
            if !paused {
                return true;
            }
            self.heartbeat.feed();
            thread::sleep(SEQUENCE_POLL_INTERVAL);
        }
    }

    /// Sleep in stop-aware slices. `false` if a stop was requested.
    fn dwell(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.stop_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            self.heartbeat.feed();
            thread::sleep((deadline - now).min(SEQUENCE_POLL_INTERVAL));
        }
    }

    fn execute_movement(&self, movement: &Movement) {
        let rail = movement
            .moves_rail()
            .then(|| self.stepper.distance_command(movement.distance_mm, movement.speed));
        let head = movement
            .moves_head()
            .then(|| ServoCommand::new(movement.angle, Some(movement.angle_speed)));

        if movement.simultaneous {
            let rail = rail.and_then(|cmd| self.dispatch("stepper", || self.stepper.submit_tracked(cmd)));
            let head = head.and_then(|cmd| self.dispatch("servo", || self.servo.submit_tracked(cmd)));
            // Each axis finishes on its own; a truncated rail does not cancel the head.
            self.await_done(rail);
            self.await_done(head);
        } else {
            if let Some(cmd) = rail {
                let done = self.dispatch("stepper", || self.stepper.submit_tracked(cmd));
                self.await_done(done);
            }
            if let Some(cmd) = head {
                let done = self.dispatch("servo", || self.servo.submit_tracked(cmd));
                self.await_done(done);
            }
        }
    }

    /// Submit outside the run lock. A `stop()` landing during the submission
    /// is caught by the re-check and the axes are stopped again.
    fn dispatch(
        &self,
        axis: &'static str,
        submit: impl FnOnce() -> Option<Completion>,
    ) -> Option<Completion> {
        if self.stop_requested() {
            return None;
        }
        let done = submit();
        if self.stop_requested() {
            // stop() raises the flag before purging the axis queues.
            self.stepper.stop();
            self.servo.stop();
            return None;
        }
        if done.is_none() {
            warn!(axis, "axis queue full, movement skipped for this axis");
        }
        done
    }

    fn stop_requested(&self) -> bool {
        self.shared.run.lock().stop_requested
    }

    fn await_done(&self, done: Option<Completion>) {
        if let Some(done) = done {
            done.wait_with(|| self.heartbeat.feed());
        }
    }
}
