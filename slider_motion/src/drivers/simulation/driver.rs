//! Simulation driver implementation.
//!
//! Hands out the pin objects of one [`SimulatedRail`] and one
//! [`SimulatedServo`]. Each component can be claimed once, like a pin.

use super::rail::SimulatedRail;
use super::servo::SimulatedServo;
use slider_common::hal::config::{LimitConfig, ServoConfig, StepperConfig};
use slider_common::hal::driver::{HalDriver, HalError, SenseLine, ServoOutput, StepperOutputs};
use tracing::info;

/// Simulation driver implementing the HalDriver trait.
pub struct SimulationDriver {
    rail: SimulatedRail,
    servo: SimulatedServo,
    claimed: Claims,
}

#[derive(Debug, Default)]
struct Claims {
    stepper: bool,
    servo: bool,
    limits: bool,
}

impl SimulationDriver {
    /// Driver over a default rail (stops at ±5000 steps) and a fresh servo.
    pub fn new() -> Self {
        Self::with_hardware(SimulatedRail::default(), SimulatedServo::new())
    }

    /// Driver over caller-provided simulated hardware.
    pub fn with_hardware(rail: SimulatedRail, servo: SimulatedServo) -> Self {
        Self {
            rail,
            servo,
            claimed: Claims::default(),
        }
    }

    /// Handle to the simulated rail.
    pub fn rail(&self) -> SimulatedRail {
        self.rail.clone()
    }

    /// Handle to the simulated servo.
    pub fn servo(&self) -> SimulatedServo {
        self.servo.clone()
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn claim(flag: &mut bool, pin: u16, what: &str) -> Result<(), HalError> {
    if *flag {
        return Err(HalError::PinUnavailable {
            pin,
            reason: format!("{what} already claimed"),
        });
    }
    *flag = true;
    Ok(())
}

impl HalDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn stepper_outputs(
        &mut self,
        config: &StepperConfig,
    ) -> Result<Box<dyn StepperOutputs>, HalError> {
        claim(&mut self.claimed.stepper, config.pulse_pin, "stepper outputs")?;
        info!(
            pulse_pin = config.pulse_pin,
            dir_pin = config.dir_pin,
            "simulated stepper outputs claimed"
        );
        Ok(Box::new(self.rail.outputs()))
    }

    fn servo_output(&mut self, config: &ServoConfig) -> Result<Box<dyn ServoOutput>, HalError> {
        claim(&mut self.claimed.servo, config.pin, "servo output")?;
        info!(pin = config.pin, "simulated servo output claimed");
        Ok(Box::new(self.servo.output()))
    }

    fn limit_lines(
        &mut self,
        config: &LimitConfig,
    ) -> Result<(Box<dyn SenseLine>, Box<dyn SenseLine>), HalError> {
        claim(&mut self.claimed.limits, config.min_pin, "limit lines")?;
        let (min, max) = self.rail.sense_lines(config.logic);
        info!(logic = ?config.logic, "simulated limit lines claimed");
        Ok((Box::new(min), Box::new(max)))
    }
}
