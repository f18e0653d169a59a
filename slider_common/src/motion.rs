//! Motion data model.
//!
//! Axis commands travel through the worker queues; `Movement` and `Sequence`
//! form the choreography catalog of the sequencer. The serde field names of
//! `Movement` and `Sequence` are the ones the web front end already speaks.

use crate::consts::{SCHEDULER_TICK, SERVO_FASTEST_DEGREE_DELAY_MS, SERVO_SLOWEST_DEGREE_DELAY_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─── Axis commands ──────────────────────────────────────────────────

/// Command for the stepper (rail) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperCommand {
    /// Target in steps; an offset from the committed position when `relative`.
    pub target: i64,
    /// Speed [steps/s]. `None` uses the axis default; clamped to `1..=max_speed`.
    pub speed: Option<u32>,
    /// Interpret `target` as an offset.
    pub relative: bool,
    /// Caller blocks until the command has been executed.
    pub wait_completion: bool,
}

impl StepperCommand {
    /// Absolute move to `position` steps.
    pub const fn absolute(position: i64, speed: Option<u32>) -> Self {
        Self {
            target: position,
            speed,
            relative: false,
            wait_completion: false,
        }
    }

    /// Relative move by `steps`.
    pub const fn relative(steps: i64, speed: Option<u32>) -> Self {
        Self {
            target: steps,
            speed,
            relative: true,
            wait_completion: false,
        }
    }

    /// Same command, but the submitter waits for completion.
    pub const fn waiting(mut self) -> Self {
        self.wait_completion = true;
        self
    }

    /// Absolute target given the last committed position. Saturates at the
    /// `i64` range.
    #[inline]
    pub const fn resolve_target(&self, current_position: i64) -> i64 {
        if self.relative {
            current_position.saturating_add(self.target)
        } else {
            self.target
        }
    }
}

/// Command for the servo (head) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoCommand {
    /// Target angle [°]; clamped to `0..=180`.
    pub target_angle: i32,
    /// Speed [%]. `None` uses the axis default; clamped to `1..=100`.
    pub speed: Option<i32>,
    /// Caller blocks until the command has been executed.
    pub wait_completion: bool,
}

impl ServoCommand {
    /// Move to `angle` at `speed` percent.
    pub const fn new(angle: i32, speed: Option<i32>) -> Self {
        Self {
            target_angle: angle,
            speed,
            wait_completion: false,
        }
    }

    /// Same command, but the submitter waits for completion.
    pub const fn waiting(mut self) -> Self {
        self.wait_completion = true;
        self
    }
}

// ─── Choreography ───────────────────────────────────────────────────

/// One choreography step of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Rail travel [mm]; zero leaves the rail untouched.
    #[serde(rename = "distance")]
    pub distance_mm: f64,
    /// Rail speed [%].
    pub speed: i32,
    /// Head angle [°]; negative leaves the head untouched.
    pub angle: i32,
    /// Head speed [%].
    #[serde(rename = "angleSpeed")]
    pub angle_speed: i32,
    /// Drive both axes at once instead of rail first, head second.
    #[serde(default)]
    pub simultaneous: bool,
    /// Dwell after the movement [ms].
    #[serde(rename = "pause", default)]
    pub pause_after_ms: u32,
}

impl Movement {
    /// Whether the rail takes part in this movement.
    #[inline]
    pub fn moves_rail(&self) -> bool {
        self.distance_mm != 0.0
    }

    /// Whether the head takes part in this movement.
    #[inline]
    pub fn moves_head(&self) -> bool {
        self.angle >= 0
    }

    /// Dwell as a `Duration`.
    #[inline]
    pub fn pause_after(&self) -> Duration {
        Duration::from_millis(u64::from(self.pause_after_ms))
    }
}

/// A named, ordered list of movements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Display name.
    pub name: String,
    /// Repeat until stopped, ignoring `repeat_count`.
    #[serde(rename = "loop", default)]
    pub loop_forever: bool,
    /// Number of passes when not looping.
    #[serde(rename = "repeatCount", default = "default_repeat_count")]
    pub repeat_count: u32,
    /// Movements in execution order.
    #[serde(default)]
    pub movements: Vec<Movement>,
}

fn default_repeat_count() -> u32 {
    1
}

impl Sequence {
    /// Empty sequence that runs once.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loop_forever: false,
            repeat_count: default_repeat_count(),
            movements: Vec::new(),
        }
    }
}

// ─── Unit conversions ───────────────────────────────────────────────

/// Integer linear re-mapping with truncating division.
///
/// `map(x, a, b, c, d) = (x - a) * (d - c) / (b - a) + c`
#[inline]
pub const fn map_range(x: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> i64 {
    if in_max == in_min {
        return out_min;
    }
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Rail distance to whole steps, truncating toward zero.
///
/// Out-of-range distances saturate at `i64::MIN`/`i64::MAX`; NaN maps to 0.
#[inline]
pub fn steps_from_distance(distance: f64, distance_per_revolution: f64, steps_per_revolution: u32) -> i64 {
    ((distance / distance_per_revolution) * f64::from(steps_per_revolution)) as i64
}

/// Steps back to rail distance.
#[inline]
pub fn distance_from_steps(steps: i64, distance_per_revolution: f64, steps_per_revolution: u32) -> f64 {
    (steps as f64 / f64::from(steps_per_revolution)) * distance_per_revolution
}

/// Percent speed (0..=100) to a step rate in `[min_speed, max_speed]`.
#[inline]
pub fn steps_per_second_from_percent(percent: i32, min_speed: u32, max_speed: u32) -> u32 {
    let percent = i64::from(percent.clamp(0, 100));
    let sps = map_range(percent, 0, 100, i64::from(min_speed), i64::from(max_speed));
    sps.clamp(1, i64::from(max_speed.max(1))) as u32
}

/// Per-degree delay of the servo ramp for a percent speed.
///
/// Higher speed gives a shorter delay; never below one scheduler tick.
#[inline]
pub fn servo_degree_delay(speed_percent: i32) -> Duration {
    let speed = i64::from(speed_percent.clamp(1, 100));
    let ms = map_range(
        speed,
        0,
        100,
        SERVO_SLOWEST_DEGREE_DELAY_MS,
        SERVO_FASTEST_DEGREE_DELAY_MS,
    );
    Duration::from_millis(ms.max(0) as u64).max(SCHEDULER_TICK)
}
