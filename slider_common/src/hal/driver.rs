//! HAL driver traits and error types.
//!
//! This module defines:
//! - `StepperOutputs` - STEP/DIR/ENA outputs of the rail driver (TB6600 class)
//! - `ServoOutput` - PWM output of the positional servo
//! - `SenseLine` - one pulled-up digital input
//! - `HalDriver` trait - factory for the above, one per hardware backend
//! - `HalError` enum - error types for HAL operations
//! - `DriverFactory` type alias - factory function type

use crate::hal::config::{LimitConfig, ServoConfig, StepperConfig};
use std::time::Duration;
use thiserror::Error;

/// Error types for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pin could not be claimed or driven
    #[error("Pin {pin} unavailable: {reason}")]
    PinUnavailable {
        /// Pin number as configured.
        pin: u16,
        /// Backend-specific reason.
        reason: String,
    },

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn HalDriver>;

/// Outputs of a STEP/DIR stepper driver stage.
///
/// Owned exclusively by the stepper worker task.
pub trait StepperOutputs: Send {
    /// Drive the DIR line. `true` = increasing position.
    fn set_direction(&mut self, forward: bool);

    /// Emit one STEP pulse of the given high time.
    ///
    /// Must return only after the line is low again; never interrupted.
    fn pulse(&mut self, width: Duration);

    /// Drive the ENA line (active low on the power stage).
    fn set_enabled(&mut self, enabled: bool);
}

/// PWM output of a positional hobby servo.
///
/// Owned exclusively by the servo worker task.
pub trait ServoOutput: Send {
    /// Start generating the 50 Hz PWM signal with the given pulse range.
    fn attach(&mut self, min_pulse_us: u32, max_pulse_us: u32) -> Result<(), HalError>;

    /// Command an absolute angle in degrees (0..=180).
    fn write_angle(&mut self, angle: u8);

    /// Stop the PWM signal.
    fn detach(&mut self);
}

/// One digital input with the internal pull-up enabled.
///
/// Owned exclusively by the limit monitor task.
pub trait SenseLine: Send {
    /// Raw electrical level of the pin.
    fn is_high(&mut self) -> bool;
}

/// Trait defining the interface for HAL backends.
///
/// A backend hands out the pin objects of each component once, at startup.
/// Each object is then moved into the task that owns it.
///
/// # Lifecycle
///
/// 1. `stepper_outputs()` / `servo_output()` / `limit_lines()` - called once
///    each while the core is being constructed
/// 2. The returned objects live for the lifetime of their task
pub trait HalDriver: Send {
    /// Returns the driver's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Claim the STEP/DIR/ENA outputs of the rail axis.
    fn stepper_outputs(
        &mut self,
        config: &StepperConfig,
    ) -> Result<Box<dyn StepperOutputs>, HalError>;

    /// Claim the PWM output of the head axis.
    fn servo_output(&mut self, config: &ServoConfig) -> Result<Box<dyn ServoOutput>, HalError>;

    /// Claim the `(min, max)` limit sense lines.
    fn limit_lines(
        &mut self,
        config: &LimitConfig,
    ) -> Result<(Box<dyn SenseLine>, Box<dyn SenseLine>), HalError>;
}
