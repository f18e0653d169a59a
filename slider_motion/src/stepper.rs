//! Stepper (rail) axis.
//!
//! Constant-speed pulse trains, one step at a time:
//!
//! 1. before each pulse, consult the limit view (max when moving forward,
//!    min when moving backward) and the cancel token;
//! 2. emit one pulse and commit the position under the state mutex;
//! 3. wait `1_000_000 / speed` µs: spin for short intervals, sleep in
//!    heartbeat-fed slices for long ones;
//! 4. every 100 steps, yield and feed the heartbeat.
//!
//! A truncated move is not an error: the reached position is authoritative.
//!
//! The enable gate is checked at command intake. A disabled axis ignores
//! commands; the ENA output is reconciled by the worker at intake and on
//! every idle poll.

use crate::error::MotionError;
use crate::limit::LimitView;
use crate::task::STEPPER_TASK;
use crate::worker::{AxisExecutor, AxisPort, AxisWorker, CancelToken, Completion};
use parking_lot::Mutex;
use slider_common::consts::{LONG_PULSE_INTERVAL, STEPS_PER_YIELD};
use slider_common::hal::config::StepperConfig;
use slider_common::hal::driver::StepperOutputs;
use slider_common::motion::{
    StepperCommand, distance_from_steps, steps_from_distance, steps_per_second_from_percent,
};
use slider_common::status::StepperStatus;
use slider_common::watchdog::{Heartbeat, TaskWatchdog};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Mutable axis state. Position fields are written by the worker only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperState {
    /// Committed position [steps].
    pub current_position: i64,
    /// Target of the last accepted command [steps].
    pub target_position: i64,
    /// Default speed [steps/s].
    pub speed: u32,
    /// Speed clamp [steps/s].
    pub max_speed: u32,
    /// Enable gate.
    pub enabled: bool,
}

struct StepperShared {
    state: Mutex<StepperState>,
    zero_requested: AtomicBool,
}

impl StepperShared {
    /// Apply a pending zero request. Worker task only.
    fn apply_zero(&self) {
        if self.zero_requested.swap(false, Ordering::AcqRel) {
            let mut state = self.state.lock();
            state.current_position = 0;
            state.target_position = 0;
            info!("stepper position zeroed");
        }
    }
}

/// How a pulse train ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Limit,
    Cancelled,
}

// ─── Executor ───────────────────────────────────────────────────────

struct StepperExecutor {
    outputs: Box<dyn StepperOutputs>,
    shared: Arc<StepperShared>,
    limits: Option<LimitView>,
    pulse_width: Duration,
    output_enabled: Option<bool>,
}

impl StepperExecutor {
    fn sync_enable(&mut self, enabled: bool) {
        if self.output_enabled != Some(enabled) {
            self.outputs.set_enabled(enabled);
            self.output_enabled = Some(enabled);
            debug!(enabled, "stepper ENA output updated");
        }
    }

    fn blocked_by_limit(&self, forward: bool) -> bool {
        self.limits.as_ref().is_some_and(|limits| {
            if forward {
                limits.max_triggered()
            } else {
                limits.min_triggered()
            }
        })
    }

    fn run_steps(
        &mut self,
        steps: u64,
        forward: bool,
        interval: Duration,
        cancel: &CancelToken,
        heartbeat: &Heartbeat,
    ) -> Outcome {
        let increment = if forward { 1 } else { -1 };
        for step in 1..=steps {
            if self.blocked_by_limit(forward) {
                return Outcome::Limit;
            }
            if cancel.is_cancelled() {
                return Outcome::Cancelled;
            }

            self.outputs.pulse(self.pulse_width);
            let mut state = self.shared.state.lock();
            state.current_position = state.current_position.saturating_add(increment);
            drop(state);
            wait_interval(interval, heartbeat);

            if step % STEPS_PER_YIELD == 0 {
                thread::yield_now();
                heartbeat.feed();
            }
        }
        Outcome::Completed
    }
}

/// Inter-pulse delay. Long intervals sleep in slices so the heartbeat stays fed.
fn wait_interval(interval: Duration, heartbeat: &Heartbeat) {
    let deadline = Instant::now() + interval;
    if interval > LONG_PULSE_INTERVAL {
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(LONG_PULSE_INTERVAL));
            heartbeat.feed();
        }
    } else {
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

impl AxisExecutor for StepperExecutor {
    type Command = StepperCommand;

    fn execute(&mut self, cmd: StepperCommand, cancel: &CancelToken, heartbeat: &Heartbeat) {
        self.shared.apply_zero();
        let (enabled, start, target, speed) = {
            let mut state = self.shared.state.lock();
            if state.enabled {
                let target = cmd.resolve_target(state.current_position);
                state.target_position = target;
                let speed = cmd.speed.unwrap_or(state.speed).clamp(1, state.max_speed.max(1));
                (true, state.current_position, target, speed)
            } else {
                (false, state.current_position, state.target_position, 0)
            }
        };
        self.sync_enable(enabled);
        if !enabled {
            warn!(?cmd, "stepper disabled, command ignored");
            return;
        }

        let delta = target.saturating_sub(start);
        if delta == 0 {
            debug!(position = start, "stepper already at target");
            return;
        }
        let forward = delta > 0;
        self.outputs.set_direction(forward);
        let interval = Duration::from_micros(1_000_000 / u64::from(speed));
        debug!(from = start, to = target, speed, "stepper move");

        let outcome = self.run_steps(delta.unsigned_abs(), forward, interval, cancel, heartbeat);
        let reached = self.shared.state.lock().current_position;
        match outcome {
            Outcome::Completed => debug!(position = reached, "stepper move complete"),
            Outcome::Limit => warn!(
                position = reached,
                target,
                "stepper move truncated by limit switch"
            ),
            Outcome::Cancelled => warn!(position = reached, target, "stepper move aborted"),
        }
    }

    fn idle(&mut self) {
        self.shared.apply_zero();
        let enabled = self.shared.state.lock().enabled;
        self.sync_enable(enabled);
    }
}

// ─── Public API ─────────────────────────────────────────────────────

/// Owner of the stepper worker task.
pub struct StepperAxis {
    worker: AxisWorker<StepperCommand>,
    handle: StepperHandle,
}

impl StepperAxis {
    /// Spawn the stepper worker.
    ///
    /// `limits` is consulted before every pulse when present.
    ///
    /// # Errors
    /// `MotionError::TaskSpawn` if the thread cannot be created.
    pub fn spawn(
        config: &StepperConfig,
        outputs: Box<dyn StepperOutputs>,
        limits: Option<LimitView>,
        watchdog: &TaskWatchdog,
    ) -> Result<Self, MotionError> {
        let shared = Arc::new(StepperShared {
            state: Mutex::new(StepperState {
                current_position: 0,
                target_position: 0,
                speed: config.default_speed,
                max_speed: config.max_speed,
                enabled: true,
            }),
            zero_requested: AtomicBool::new(false),
        });
        let executor = StepperExecutor {
            outputs,
            shared: Arc::clone(&shared),
            limits,
            pulse_width: config.pulse_width(),
            output_enabled: None,
        };
        let worker = AxisWorker::spawn(STEPPER_TASK, executor, watchdog)?;
        let handle = StepperHandle {
            port: worker.port(),
            shared,
            steps_per_revolution: config.steps_per_revolution,
            mm_per_revolution: config.mm_per_revolution,
            min_percent_speed: config.min_percent_speed,
        };
        Ok(Self { worker, handle })
    }

    /// Non-owning client handle.
    pub fn handle(&self) -> StepperHandle {
        self.handle.clone()
    }

    /// Stop the axis and join its task.
    pub fn shutdown(&mut self) {
        self.worker.shutdown();
    }
}

/// Client handle to the stepper axis. Cheap to clone.
#[derive(Clone)]
pub struct StepperHandle {
    port: AxisPort<StepperCommand>,
    shared: Arc<StepperShared>,
    steps_per_revolution: u32,
    mm_per_revolution: f64,
    min_percent_speed: u32,
}

impl StepperHandle {
    /// Enqueue a raw command. `false` if the queue stayed full.
    pub fn submit(&self, cmd: StepperCommand) -> bool {
        self.port.submit(cmd)
    }

    /// Enqueue a command and return its completion signal.
    pub fn submit_tracked(&self, cmd: StepperCommand) -> Option<Completion> {
        self.port.submit_tracked(cmd)
    }

    /// Absolute move [steps].
    pub fn move_to(&self, position: i64, speed: Option<u32>) -> bool {
        self.submit(StepperCommand::absolute(position, speed))
    }

    /// Relative move [steps].
    pub fn move_relative(&self, steps: i64, speed: Option<u32>) -> bool {
        self.submit(StepperCommand::relative(steps, speed))
    }

    /// Relative move by `distance_mm` at a percent speed.
    pub fn move_distance(&self, distance_mm: f64, speed_percent: i32) -> bool {
        self.submit(self.distance_command(distance_mm, speed_percent))
    }

    /// Relative command for a distance at a percent speed.
    pub fn distance_command(&self, distance_mm: f64, speed_percent: i32) -> StepperCommand {
        StepperCommand::relative(
            self.steps_from_distance(distance_mm),
            Some(self.percent_to_speed(speed_percent)),
        )
    }

    /// Clear the queue and abort the current move.
    pub fn stop(&self) {
        self.port.stop();
    }

    /// Abort the current move without blocking. Queued commands still run.
    pub fn abort(&self) {
        self.port.abort();
    }

    /// Honor future commands.
    pub fn enable(&self) {
        self.set_enabled(true);
    }

    /// Ignore future commands. An ongoing move is not interrupted.
    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Set the enable gate.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.state.lock().enabled = enabled;
        info!(enabled, "stepper enable gate changed");
    }

    /// Enable gate.
    pub fn is_enabled(&self) -> bool {
        self.shared.state.lock().enabled
    }

    /// Declare the current position as zero. Applied by the worker before
    /// its next command or at its next idle poll.
    pub fn zero(&self) {
        self.shared.zero_requested.store(true, Ordering::Release);
    }

    /// Default speed for commands without one [steps/s]; clamped to max.
    pub fn set_speed(&self, speed: u32) {
        let mut state = self.shared.state.lock();
        state.speed = speed.clamp(1, state.max_speed.max(1));
    }

    /// Speed clamp [steps/s]. Lowers the default speed if needed.
    pub fn set_max_speed(&self, max_speed: u32) {
        let mut state = self.shared.state.lock();
        state.max_speed = max_speed.max(1);
        state.speed = state.speed.min(state.max_speed);
    }

    /// Committed position [steps].
    pub fn position(&self) -> i64 {
        self.shared.state.lock().current_position
    }

    /// Target of the last accepted command [steps].
    pub fn target_position(&self) -> i64 {
        self.shared.state.lock().target_position
    }

    /// A command is being executed.
    pub fn is_moving(&self) -> bool {
        self.port.is_moving()
    }

    /// Copy of the axis state.
    pub fn state(&self) -> StepperState {
        *self.shared.state.lock()
    }

    /// Rail distance to steps, truncating.
    pub fn steps_from_distance(&self, distance_mm: f64) -> i64 {
        steps_from_distance(distance_mm, self.mm_per_revolution, self.steps_per_revolution)
    }

    /// Steps to rail distance.
    pub fn distance_from_steps(&self, steps: i64) -> f64 {
        distance_from_steps(steps, self.mm_per_revolution, self.steps_per_revolution)
    }

    /// Percent speed to steps/s within `[min_percent_speed, max_speed]`.
    pub fn percent_to_speed(&self, percent: i32) -> u32 {
        let max_speed = self.shared.state.lock().max_speed;
        steps_per_second_from_percent(percent, self.min_percent_speed.min(max_speed), max_speed)
    }

    /// Status snapshot.
    pub fn status(&self) -> StepperStatus {
        let state = self.state();
        StepperStatus {
            position: state.current_position,
            position_mm: self.distance_from_steps(state.current_position),
            target_position: state.target_position,
            is_moving: self.is_moving(),
            is_enabled: state.enabled,
            speed: state.speed,
            max_speed: state.max_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;

    /// Counts pulses and records ENA changes.
    struct CountingOutputs {
        pulses: Arc<AtomicI64>,
        forward: bool,
        enabled: Arc<Mutex<Vec<bool>>>,
    }

    impl StepperOutputs for CountingOutputs {
        fn set_direction(&mut self, forward: bool) {
            self.forward = forward;
        }
        fn pulse(&mut self, _width: Duration) {
            self.pulses
                .fetch_add(if self.forward { 1 } else { -1 }, Ordering::Relaxed);
        }
        fn set_enabled(&mut self, enabled: bool) {
            self.enabled.lock().push(enabled);
        }
    }

    fn executor() -> (StepperExecutor, Arc<AtomicI64>, Arc<Mutex<Vec<bool>>>) {
        let pulses = Arc::new(AtomicI64::new(0));
        let enabled = Arc::new(Mutex::new(Vec::new()));
        let config = StepperConfig::default();
        let exec = StepperExecutor {
            outputs: Box::new(CountingOutputs {
                pulses: Arc::clone(&pulses),
                forward: true,
                enabled: Arc::clone(&enabled),
            }),
            shared: Arc::new(StepperShared {
                state: Mutex::new(StepperState {
                    current_position: 0,
                    target_position: 0,
                    speed: config.default_speed,
                    max_speed: config.max_speed,
                    enabled: true,
                }),
                zero_requested: AtomicBool::new(false),
            }),
            limits: None,
            pulse_width: config.pulse_width(),
            output_enabled: None,
        };
        (exec, pulses, enabled)
    }

    #[test]
    fn relative_and_absolute_moves_track_pulses() {
        let (mut exec, pulses, _) = executor();
        let hb = TaskWatchdog::default().register("t");
        let cancel = CancelToken::never();
        exec.execute(StepperCommand::relative(30, Some(2000)), &cancel, &hb);
        exec.execute(StepperCommand::absolute(10, Some(2000)), &cancel, &hb);
        let state = *exec.shared.state.lock();
        assert_eq!(state.current_position, 10);
        assert_eq!(state.target_position, 10);
        assert_eq!(pulses.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn disabled_axis_ignores_commands_and_drops_ena() {
        let (mut exec, pulses, ena) = executor();
        let hb = TaskWatchdog::default().register("t");
        exec.shared.state.lock().enabled = false;
        exec.execute(StepperCommand::relative(5, None), &CancelToken::never(), &hb);
        assert_eq!(pulses.load(Ordering::Relaxed), 0);
        assert_eq!(exec.shared.state.lock().current_position, 0);
        assert_eq!(ena.lock().as_slice(), &[false]);
    }

    #[test]
    fn idle_reconciles_enable_output_once() {
        let (mut exec, _, ena) = executor();
        exec.idle();
        exec.idle();
        exec.shared.state.lock().enabled = false;
        exec.idle();
        assert_eq!(ena.lock().as_slice(), &[true, false]);
    }

    #[test]
    fn zero_request_applies_before_next_command() {
        let (mut exec, _, _) = executor();
        let hb = TaskWatchdog::default().register("t");
        let cancel = CancelToken::never();
        exec.execute(StepperCommand::relative(20, Some(2000)), &cancel, &hb);
        exec.shared.zero_requested.store(true, Ordering::Release);
        exec.execute(StepperCommand::relative(5, Some(2000)), &cancel, &hb);
        assert_eq!(exec.shared.state.lock().current_position, 5);
    }

    #[test]
    fn pulse_interval_follows_speed() {
        let (mut exec, _, _) = executor();
        let hb = TaskWatchdog::default().register("t");
        let start = Instant::now();
        // 20 steps at 1000 steps/s = 20 ms
        exec.execute(StepperCommand::relative(20, Some(1000)), &CancelToken::never(), &hb);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(20), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "{elapsed:?}");
    }

    #[test]
    fn speed_is_clamped_to_max() {
        let (mut exec, _, _) = executor();
        let hb = TaskWatchdog::default().register("t");
        exec.shared.state.lock().max_speed = 4000;
        let start = Instant::now();
        // Requested 1_000_000 steps/s; clamped to 4000 -> 40 steps take >= 10 ms.
        exec.execute(StepperCommand::relative(40, Some(1_000_000)), &CancelToken::never(), &hb);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
