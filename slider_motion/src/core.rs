//! Slider core: component wiring and the gateway-facing API.
//!
//! `SliderCore::start` claims the hardware from a HAL driver, spawns the limit
//! monitor, both axis workers and the interlock, and builds the sequencer.
//! The web gateway only ever talks to this type.

use crate::error::MotionError;
use crate::interlock::InterlockRouter;
use crate::limit::{LimitMonitor, LimitView};
use crate::sequence::SequenceOrchestrator;
use crate::servo::{ServoAxis, ServoHandle};
use crate::status::StatusExport;
use crate::stepper::{StepperAxis, StepperHandle};
use slider_common::config::SliderConfig;
use slider_common::hal::driver::HalDriver;
use slider_common::motion::{Movement, Sequence};
use slider_common::status::{SequenceSummary, SliderStatus};
use slider_common::watchdog::{HealthStatus, TaskWatchdog};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

/// Running motion core.
pub struct SliderCore {
    config: SliderConfig,
    watchdog: TaskWatchdog,
    running: Arc<AtomicBool>,
    stopped: bool,
    monitor: LimitMonitor,
    stepper: StepperAxis,
    servo: ServoAxis,
    sequencer: Arc<SequenceOrchestrator>,
    status: StatusExport,
}

impl SliderCore {
    /// Validate `config`, claim the hardware from `driver` and start every task.
    ///
    /// # Errors
    /// Configuration rejection, HAL claim failure or task spawn failure.
    /// Nothing keeps running when an error is returned.
    pub fn start(config: SliderConfig, driver: &mut dyn HalDriver) -> Result<Self, MotionError> {
        config.validate()?;
        info!(
            service = %config.shared.service_name,
            driver = driver.name(),
            version = driver.version(),
            "starting slider core"
        );

        // Claim every pin before any task starts.
        let limit_lines = driver.limit_lines(&config.limits)?;
        let stepper_outputs = driver.stepper_outputs(&config.stepper)?;
        let servo_output = driver.servo_output(&config.servo)?;

        let watchdog = TaskWatchdog::new(config.tasks.watchdog_timeout());
        let monitor = LimitMonitor::spawn(&config.limits, limit_lines, &watchdog)?;
        let stepper = StepperAxis::spawn(
            &config.stepper,
            stepper_outputs,
            Some(monitor.view()),
            &watchdog,
        )?;
        InterlockRouter::install(&monitor, &stepper.handle());
        let servo = ServoAxis::spawn(&config.servo, servo_output, &watchdog)?;

        let sequencer = Arc::new(SequenceOrchestrator::new(
            stepper.handle(),
            servo.handle(),
            watchdog.clone(),
        ));
        let status = StatusExport::new(
            stepper.handle(),
            servo.handle(),
            monitor.view(),
            Arc::clone(&sequencer),
        );

        info!(
            overtravel_mm = InterlockRouter::worst_case_overtravel_mm(&config.limits, &config.stepper),
            margin_mm = config.limits.endstop_margin_mm,
            "slider core running"
        );

        Ok(Self {
            config,
            watchdog,
            running: Arc::new(AtomicBool::new(true)),
            stopped: false,
            monitor,
            stepper,
            servo,
            sequencer,
            status,
        })
    }

    /// Stop every task and join it. Idempotent.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.running.store(false, Ordering::Release);
        info!("shutting down slider core");
        self.sequencer.shutdown();
        InterlockRouter::remove(&self.monitor);
        self.stepper.shutdown();
        self.servo.shutdown();
        self.monitor.shutdown();
        info!("slider core stopped");
    }

    /// Flag cleared by `shutdown` or by a signal handler.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Core has not been shut down.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Active configuration.
    pub fn config(&self) -> &SliderConfig {
        &self.config
    }

    // ─── Sequences ──────────────────────────────────────────────────

    /// Catalog listing.
    pub fn list_sequences(&self) -> Vec<SequenceSummary> {
        self.sequencer.list_sequences()
    }

    /// Copy of one sequence.
    pub fn get_sequence(&self, index: usize) -> Option<Sequence> {
        self.sequencer.get_sequence(index)
    }

    /// Create an empty sequence; returns its index.
    pub fn create_sequence(&self, name: &str) -> usize {
        self.sequencer.create_sequence(name)
    }

    /// Append a movement to a sequence.
    pub fn add_movement(&self, index: usize, movement: Movement) -> bool {
        self.sequencer.add_movement(index, movement)
    }

    /// Remove one movement from a sequence.
    pub fn remove_movement(&self, index: usize, movement_index: usize) -> bool {
        self.sequencer.remove_movement(index, movement_index)
    }

    /// Remove every movement of a sequence.
    pub fn clear_sequence(&self, index: usize) -> bool {
        self.sequencer.clear_sequence(index)
    }

    /// Set loop and repeat parameters of a sequence.
    pub fn set_repeat(&self, index: usize, loop_forever: bool, repeat_count: u32) -> bool {
        self.sequencer.set_repeat(index, loop_forever, repeat_count)
    }

    /// Delete a sequence.
    pub fn delete_sequence(&self, index: usize) -> bool {
        self.sequencer.delete_sequence(index)
    }

    /// Number of sequences.
    pub fn sequence_count(&self) -> usize {
        self.sequencer.sequence_count()
    }

    /// Start a sequence.
    pub fn execute_sequence(&self, index: usize) -> bool {
        self.sequencer.execute_sequence(index)
    }

    /// Pause at the next movement boundary.
    pub fn pause(&self) {
        self.sequencer.pause();
    }

    /// Resume a paused sequence.
    pub fn resume(&self) {
        self.sequencer.resume();
    }

    /// Stop the sequence and both axes.
    pub fn stop(&self) {
        self.sequencer.stop();
    }

    /// Block until no sequence is executing or `timeout` elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.sequencer.wait_idle(timeout)
    }

    // ─── Manual motion ──────────────────────────────────────────────

    /// Relative rail move by `distance_mm` at `speed_percent`.
    pub fn move_stepper(&self, distance_mm: f64, speed_percent: i32) -> bool {
        self.stepper.handle().move_distance(distance_mm, speed_percent)
    }

    /// Head move to `angle` at `speed_percent`.
    pub fn move_servo(&self, angle: i32, speed_percent: i32) -> bool {
        self.servo.handle().move_to(angle, Some(speed_percent))
    }

    /// Set the rail enable gate.
    pub fn enable_stepper(&self, enabled: bool) {
        self.stepper.handle().set_enabled(enabled);
    }

    /// Declare the current rail position as zero.
    pub fn zero_stepper(&self) {
        self.stepper.handle().zero();
    }

    /// Clear both debounced limit states.
    pub fn reset_limits(&self) {
        self.monitor.reset();
    }

    // ─── Status ─────────────────────────────────────────────────────

    /// Full snapshot.
    pub fn status(&self) -> SliderStatus {
        self.status.snapshot()
    }

    /// Status exporter for JSON rendering.
    pub fn status_export(&self) -> &StatusExport {
        &self.status
    }

    /// Liveness of every task.
    pub fn health(&self) -> Vec<(String, HealthStatus)> {
        self.watchdog.check()
    }

    /// Rail client handle.
    pub fn stepper(&self) -> StepperHandle {
        self.stepper.handle()
    }

    /// Head client handle.
    pub fn servo(&self) -> ServoHandle {
        self.servo.handle()
    }

    /// Limit state view.
    pub fn limits(&self) -> LimitView {
        self.monitor.view()
    }
}

impl Drop for SliderCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
