//! System-wide constants for the slider workspace.
//!
//! Single source of truth for queue sizes, poll cadences and the default
//! hardware parameters. Configuration defaults are derived from these.

use static_assertions::const_assert;
use std::time::Duration;

// ─── Axis workers ───────────────────────────────────────────────────

/// Capacity of every axis command queue.
pub const COMMAND_QUEUE_CAPACITY: usize = 10;

/// Bounded wait applied when enqueuing into a full command queue.
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_millis(100);

/// Idle poll timeout of an axis worker blocked on its queue.
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Granularity at which a caller waits for command completion.
pub const COMPLETION_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ─── Stepper ────────────────────────────────────────────────────────

/// Steps between forced yields (and watchdog feeds) in the pulse loop.
pub const STEPS_PER_YIELD: u64 = 100;

/// Inter-pulse intervals above this are slept instead of spun.
pub const LONG_PULSE_INTERVAL: Duration = Duration::from_millis(10);

/// Default full steps per motor revolution.
pub const DEFAULT_STEPS_PER_REVOLUTION: u32 = 200;

/// Default rail travel per motor revolution [mm].
pub const DEFAULT_MM_PER_REVOLUTION: f64 = 8.0;

/// Default stepper speed [steps/s].
pub const DEFAULT_STEPPER_SPEED: u32 = 1000;

/// Default stepper speed ceiling [steps/s].
pub const DEFAULT_STEPPER_MAX_SPEED: u32 = 2000;

/// Stepper speed that a 0 % request maps to [steps/s].
pub const DEFAULT_MIN_PERCENT_SPEED: u32 = 100;

/// Minimum STEP pulse high time [µs].
pub const DEFAULT_PULSE_WIDTH_US: u32 = 5;

// ─── Servo ──────────────────────────────────────────────────────────

/// Maximum servo angle [°].
pub const SERVO_MAX_ANGLE: i32 = 180;

/// Servo angle assumed before the first command [°].
pub const DEFAULT_SERVO_ANGLE: i32 = 90;

/// Default servo speed [%].
pub const DEFAULT_SERVO_SPEED: i32 = 50;

/// Per-degree delay at 0 % speed [ms].
pub const SERVO_SLOWEST_DEGREE_DELAY_MS: i64 = 20;

/// Per-degree delay at 100 % speed [ms].
pub const SERVO_FASTEST_DEGREE_DELAY_MS: i64 = 1;

/// One scheduler tick; the smallest delay a ramp step may use.
pub const SCHEDULER_TICK: Duration = Duration::from_millis(1);

// ─── Limit switches ─────────────────────────────────────────────────

/// Default debounce window per limit line.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Default limit line poll interval (100 Hz).
pub const DEFAULT_LIMIT_POLL_MS: u64 = 10;

/// Default mechanical over-travel margin beyond each limit switch [mm].
pub const DEFAULT_ENDSTOP_MARGIN_MM: f64 = 6.0;

// ─── Sequencer ──────────────────────────────────────────────────────

/// Granularity of pause checks, pause-after sleeps and completion waits
/// inside the sequence task.
pub const SEQUENCE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default task watchdog timeout.
pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 10_000;

const_assert!(COMMAND_QUEUE_CAPACITY > 0);
const_assert!(DEFAULT_STEPPER_SPEED <= DEFAULT_STEPPER_MAX_SPEED);
const_assert!(DEFAULT_MIN_PERCENT_SPEED <= DEFAULT_STEPPER_MAX_SPEED);
const_assert!(SERVO_FASTEST_DEGREE_DELAY_MS >= 1);
const_assert!(DEFAULT_LIMIT_POLL_MS < DEFAULT_DEBOUNCE_MS);
