//! Servo (head) axis.
//!
//! The PWM output is attached lazily on the first command, which drives the
//! head straight to its target. Every later command ramps one degree at a
//! time with a per-degree delay derived from the percent speed.

use crate::error::MotionError;
use crate::task::SERVO_TASK;
use crate::worker::{AxisExecutor, AxisPort, AxisWorker, CancelToken, Completion};
use parking_lot::Mutex;
use slider_common::consts::SERVO_MAX_ANGLE;
use slider_common::hal::config::ServoConfig;
use slider_common::hal::driver::ServoOutput;
use slider_common::motion::{ServoCommand, servo_degree_delay};
use slider_common::status::ServoStatus;
use slider_common::watchdog::{Heartbeat, TaskWatchdog};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Servo axis state. Angles are written by the worker only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoState {
    /// Last written angle [°].
    pub current_angle: i32,
    /// Target of the last accepted command [°].
    pub target_angle: i32,
    /// Speed for commands without one [%].
    pub default_speed: i32,
}

struct ServoExecutor {
    output: Box<dyn ServoOutput>,
    state: Arc<Mutex<ServoState>>,
    min_pulse_us: u32,
    max_pulse_us: u32,
    attached: bool,
}

impl ServoExecutor {
    fn write(&mut self, angle: i32) {
        self.output.write_angle(angle.clamp(0, SERVO_MAX_ANGLE) as u8);
        self.state.lock().current_angle = angle;
    }
}

impl AxisExecutor for ServoExecutor {
    type Command = ServoCommand;

    fn execute(&mut self, cmd: ServoCommand, cancel: &CancelToken, heartbeat: &Heartbeat) {
        let target = cmd.target_angle.clamp(0, SERVO_MAX_ANGLE);
        let (mut angle, speed) = {
            let mut state = self.state.lock();
            state.target_angle = target;
            let speed = cmd.speed.unwrap_or(state.default_speed).clamp(1, 100);
            (state.current_angle, speed)
        };

        if !self.attached {
            if let Err(e) = self.output.attach(self.min_pulse_us, self.max_pulse_us) {
                error!("servo attach failed, command dropped: {e}");
                return;
            }
            self.attached = true;
            self.write(target);
            info!(angle = target, "servo attached");
            return;
        }

        let delay = servo_degree_delay(speed);
        debug!(from = angle, to = target, speed, "servo move");
        while angle != target {
            if cancel.is_cancelled() {
                warn!(angle, target, "servo move aborted");
                return;
            }
            angle += (target - angle).signum();
            self.write(angle);
            heartbeat.feed();
            thread::sleep(delay);
        }
        debug!(angle, "servo move complete");
    }
}

impl Drop for ServoExecutor {
    fn drop(&mut self) {
        if self.attached {
            self.output.detach();
        }
    }
}

/// Owner of the servo worker task.
pub struct ServoAxis {
    worker: AxisWorker<ServoCommand>,
    handle: ServoHandle,
}

impl ServoAxis {
    /// Spawn the servo worker.
    ///
    /// # Errors
    /// `MotionError::TaskSpawn` if the thread cannot be created.
    pub fn spawn(
        config: &ServoConfig,
        output: Box<dyn ServoOutput>,
        watchdog: &TaskWatchdog,
    ) -> Result<Self, MotionError> {
        let state = Arc::new(Mutex::new(ServoState {
            current_angle: config.initial_angle,
            target_angle: config.initial_angle,
            default_speed: config.default_speed,
        }));
        let executor = ServoExecutor {
            output,
            state: Arc::clone(&state),
            min_pulse_us: config.min_pulse_us,
            max_pulse_us: config.max_pulse_us,
            attached: false,
        };
        let worker = AxisWorker::spawn(SERVO_TASK, executor, watchdog)?;
        let handle = ServoHandle {
            port: worker.port(),
            state,
        };
        Ok(Self { worker, handle })
    }

    /// Non-owning client handle.
    pub fn handle(&self) -> ServoHandle {
        self.handle.clone()
    }

    /// Stop the axis, detach the output and join the task.
    pub fn shutdown(&mut self) {
        self.worker.shutdown();
    }
}

/// Client handle to the servo axis. Cheap to clone.
#[derive(Clone)]
pub struct ServoHandle {
    port: AxisPort<ServoCommand>,
    state: Arc<Mutex<ServoState>>,
}

impl ServoHandle {
    /// Enqueue a raw command. `false` if the queue stayed full.
    pub fn submit(&self, cmd: ServoCommand) -> bool {
        self.port.submit(cmd)
    }

    /// Enqueue a command and return its completion signal.
    pub fn submit_tracked(&self, cmd: ServoCommand) -> Option<Completion> {
        self.port.submit_tracked(cmd)
    }

    /// Move to `angle` [°] at `speed` [%], or the default speed.
    pub fn move_to(&self, angle: i32, speed: Option<i32>) -> bool {
        self.submit(ServoCommand::new(angle, speed))
    }

    /// Clear the queue and abort the current ramp.
    pub fn stop(&self) {
        self.port.stop();
    }

    /// Speed for commands without one [%]; clamped to `1..=100`.
    pub fn set_default_speed(&self, speed: i32) {
        self.state.lock().default_speed = speed.clamp(1, 100);
    }

    /// Last written angle [°].
    pub fn current_angle(&self) -> i32 {
        self.state.lock().current_angle
    }

    /// Target of the last accepted command [°].
    pub fn target_angle(&self) -> i32 {
        self.state.lock().target_angle
    }

    /// A command is being executed.
    pub fn is_moving(&self) -> bool {
        self.port.is_moving()
    }

    /// Status snapshot.
    pub fn status(&self) -> ServoStatus {
        let state = *self.state.lock();
        ServoStatus {
            angle: state.current_angle,
            is_moving: self.is_moving(),
            speed: state.default_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slider_common::hal::driver::HalError;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Log {
        attached: Option<(u32, u32)>,
        writes: Vec<u8>,
        detached: bool,
    }

    struct RecordingServo(Arc<Mutex<Log>>);

    impl ServoOutput for RecordingServo {
        fn attach(&mut self, min_pulse_us: u32, max_pulse_us: u32) -> Result<(), HalError> {
            self.0.lock().attached = Some((min_pulse_us, max_pulse_us));
            Ok(())
        }
        fn write_angle(&mut self, angle: u8) {
            self.0.lock().writes.push(angle);
        }
        fn detach(&mut self) {
            self.0.lock().detached = true;
        }
    }

    fn executor() -> (ServoExecutor, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let config = ServoConfig::default();
        let exec = ServoExecutor {
            output: Box::new(RecordingServo(Arc::clone(&log))),
            state: Arc::new(Mutex::new(ServoState {
                current_angle: config.initial_angle,
                target_angle: config.initial_angle,
                default_speed: config.default_speed,
            })),
            min_pulse_us: config.min_pulse_us,
            max_pulse_us: config.max_pulse_us,
            attached: false,
        };
        (exec, log)
    }

    #[test]
    fn first_command_attaches_and_jumps() {
        let (mut exec, log) = executor();
        let hb = TaskWatchdog::default().register("t");
        exec.execute(ServoCommand::new(30, Some(10)), &CancelToken::never(), &hb);
        let log = log.lock();
        assert_eq!(log.attached, Some((500, 2400)));
        assert_eq!(log.writes, vec![30]);
    }

    #[test]
    fn later_commands_ramp_one_degree_at_a_time() {
        let (mut exec, log) = executor();
        let hb = TaskWatchdog::default().register("t");
        let cancel = CancelToken::never();
        exec.execute(ServoCommand::new(10, None), &cancel, &hb);
        exec.execute(ServoCommand::new(14, Some(100)), &cancel, &hb);
        exec.execute(ServoCommand::new(12, Some(100)), &cancel, &hb);
        assert_eq!(log.lock().writes, vec![10, 11, 12, 13, 14, 13, 12]);
        assert_eq!(exec.state.lock().current_angle, 12);
    }

    #[test]
    fn angle_and_speed_are_clamped() {
        let (mut exec, log) = executor();
        let hb = TaskWatchdog::default().register("t");
        let cancel = CancelToken::never();
        exec.execute(ServoCommand::new(178, None), &cancel, &hb);
        let start = Instant::now();
        exec.execute(ServoCommand::new(400, Some(-5)), &cancel, &hb);
        // speed clamped to 1 % -> 20 ms per degree, two degrees
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(log.lock().writes, vec![178, 179, 180]);
        assert_eq!(exec.state.lock().target_angle, 180);
    }

    #[test]
    fn drop_detaches_attached_output() {
        let (mut exec, log) = executor();
        let hb = TaskWatchdog::default().register("t");
        exec.execute(ServoCommand::new(90, None), &CancelToken::never(), &hb);
        drop(exec);
        assert!(log.lock().detached);
    }
}
