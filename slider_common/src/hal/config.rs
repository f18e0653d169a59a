//! HAL configuration types.
//!
//! This module contains the pin and geometry configuration of the two axes
//! and the limit switches:
//! - `StepperConfig` - STEP/DIR/ENA pins, rail geometry, speed bounds
//! - `ServoConfig` - PWM pin, pulse range, defaults
//! - `LimitConfig` - sense pins, polarity, debounce and over-travel margin
//!
//! All sections are supplied once at startup; there is no runtime
//! reconfiguration beyond the setters exposed by the axis drivers.

use crate::consts::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_ENDSTOP_MARGIN_MM, DEFAULT_LIMIT_POLL_MS,
    DEFAULT_MIN_PERCENT_SPEED, DEFAULT_MM_PER_REVOLUTION, DEFAULT_PULSE_WIDTH_US,
    DEFAULT_SERVO_ANGLE, DEFAULT_SERVO_SPEED, DEFAULT_STEPPER_MAX_SPEED, DEFAULT_STEPPER_SPEED,
    DEFAULT_STEPS_PER_REVOLUTION, SERVO_MAX_ANGLE,
};
use crate::hal::driver::HalError;
use crate::io::DiLogic;
use crate::motion::distance_from_steps;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stepper axis (linear rail) configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepperConfig {
    /// STEP (pulse) output pin.
    pub pulse_pin: u16,
    /// DIR output pin.
    pub dir_pin: u16,
    /// Optional ENA output pin (active low).
    pub enable_pin: Option<u16>,
    /// Full steps per motor revolution.
    pub steps_per_revolution: u32,
    /// Rail travel per motor revolution [mm].
    pub mm_per_revolution: f64,
    /// Speed used when a command carries none [steps/s].
    pub default_speed: u32,
    /// Upper clamp for every commanded speed [steps/s].
    pub max_speed: u32,
    /// Speed a 0 % request maps to [steps/s].
    pub min_percent_speed: u32,
    /// STEP pulse high time [µs].
    pub pulse_width_us: u32,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            pulse_pin: 4,
            dir_pin: 13,
            enable_pin: Some(12),
            steps_per_revolution: DEFAULT_STEPS_PER_REVOLUTION,
            mm_per_revolution: DEFAULT_MM_PER_REVOLUTION,
            default_speed: DEFAULT_STEPPER_SPEED,
            max_speed: DEFAULT_STEPPER_MAX_SPEED,
            min_percent_speed: DEFAULT_MIN_PERCENT_SPEED,
            pulse_width_us: DEFAULT_PULSE_WIDTH_US,
        }
    }
}

impl StepperConfig {
    /// Validate the stepper configuration.
    pub fn validate(&self) -> Result<(), HalError> {
        if self.steps_per_revolution == 0 {
            return Err(HalError::ConfigError(
                "stepper.steps_per_revolution must be greater than 0".to_string(),
            ));
        }
        if !(self.mm_per_revolution > 0.0) {
            return Err(HalError::ConfigError(format!(
                "stepper.mm_per_revolution must be positive, got {}",
                self.mm_per_revolution
            )));
        }
        if self.max_speed == 0 {
            return Err(HalError::ConfigError(
                "stepper.max_speed must be greater than 0".to_string(),
            ));
        }
        if self.default_speed == 0 || self.default_speed > self.max_speed {
            return Err(HalError::ConfigError(format!(
                "stepper.default_speed {} must be in 1..={}",
                self.default_speed, self.max_speed
            )));
        }
        if self.min_percent_speed > self.max_speed {
            return Err(HalError::ConfigError(format!(
                "stepper.min_percent_speed {} exceeds max_speed {}",
                self.min_percent_speed, self.max_speed
            )));
        }
        if self.pulse_pin == self.dir_pin
            || self.enable_pin == Some(self.pulse_pin)
            || self.enable_pin == Some(self.dir_pin)
        {
            return Err(HalError::ConfigError(
                "stepper pins must be distinct".to_string(),
            ));
        }
        Ok(())
    }

    /// STEP pulse width as a `Duration`.
    pub fn pulse_width(&self) -> Duration {
        Duration::from_micros(u64::from(self.pulse_width_us))
    }
}

/// Servo axis (rotating head) configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServoConfig {
    /// PWM output pin.
    pub pin: u16,
    /// Angle assumed before the first command [°].
    pub initial_angle: i32,
    /// Speed used when a command carries none [%].
    pub default_speed: i32,
    /// Pulse width at 0° [µs].
    pub min_pulse_us: u32,
    /// Pulse width at 180° [µs].
    pub max_pulse_us: u32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            pin: 19,
            initial_angle: DEFAULT_SERVO_ANGLE,
            default_speed: DEFAULT_SERVO_SPEED,
            min_pulse_us: 500,
            max_pulse_us: 2400,
        }
    }
}

impl ServoConfig {
    /// Validate the servo configuration.
    pub fn validate(&self) -> Result<(), HalError> {
        if !(0..=SERVO_MAX_ANGLE).contains(&self.initial_angle) {
            return Err(HalError::ConfigError(format!(
                "servo.initial_angle {} outside 0..={SERVO_MAX_ANGLE}",
                self.initial_angle
            )));
        }
        if !(1..=100).contains(&self.default_speed) {
            return Err(HalError::ConfigError(format!(
                "servo.default_speed {} outside 1..=100",
                self.default_speed
            )));
        }
        if self.min_pulse_us >= self.max_pulse_us {
            return Err(HalError::ConfigError(format!(
                "servo pulse range {}..{} is empty",
                self.min_pulse_us, self.max_pulse_us
            )));
        }
        Ok(())
    }
}

/// Limit switch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitConfig {
    /// Sense pin of the minimum-end switch.
    pub min_pin: u16,
    /// Sense pin of the maximum-end switch.
    pub max_pin: u16,
    /// Contact type of both switches.
    pub logic: DiLogic,
    /// Debounce window per line [ms].
    pub debounce_ms: u64,
    /// Poll interval of the monitor task [ms].
    pub poll_interval_ms: u64,
    /// Mechanical travel available beyond each switch [mm].
    pub endstop_margin_mm: f64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            min_pin: 23,
            max_pin: 15,
            logic: DiLogic::NC,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            poll_interval_ms: DEFAULT_LIMIT_POLL_MS,
            endstop_margin_mm: DEFAULT_ENDSTOP_MARGIN_MM,
        }
    }
}

impl LimitConfig {
    /// Debounce window as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Worst-case latency from switch contact to the stepper observing the
    /// abort: one full debounce window, one poll period and one inter-pulse
    /// interval at `max_speed`.
    pub fn worst_case_latency(&self, max_speed: u32) -> Duration {
        let pulse = Duration::from_nanos(1_000_000_000 / u64::from(max_speed.max(1)));
        self.debounce() + self.poll_interval() + pulse
    }

    /// Rail travel covered during [`worst_case_latency`](Self::worst_case_latency)
    /// at the stepper's maximum speed [mm].
    pub fn worst_case_overtravel_mm(&self, stepper: &StepperConfig) -> f64 {
        let latency_ns = self.worst_case_latency(stepper.max_speed).as_nanos();
        let steps = (latency_ns * u128::from(stepper.max_speed)).div_ceil(1_000_000_000) as i64;
        distance_from_steps(
            steps,
            stepper.mm_per_revolution,
            stepper.steps_per_revolution,
        )
    }

    /// Validate the limit configuration against the stepper it protects.
    pub fn validate(&self, stepper: &StepperConfig) -> Result<(), HalError> {
        if self.min_pin == self.max_pin {
            return Err(HalError::ConfigError(
                "limits.min_pin and limits.max_pin must differ".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(HalError::ConfigError(
                "limits.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        let overtravel = self.worst_case_overtravel_mm(stepper);
        if overtravel > self.endstop_margin_mm {
            return Err(HalError::ConfigError(format!(
                "worst-case over-travel {overtravel:.2} mm (debounce {} ms at {} steps/s) \
                 exceeds end-stop margin {:.2} mm",
                self.debounce_ms, stepper.max_speed, self.endstop_margin_mm
            )));
        }
        Ok(())
    }
}
