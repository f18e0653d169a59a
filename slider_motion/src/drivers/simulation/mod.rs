//! Simulation driver module.
//!
//! Software stand-ins for the slider hardware: a rail whose carriage moves
//! one step per STEP pulse and whose end-stop switches actuate at fixed
//! positions, and a servo that records the angles written to it.

mod driver;
mod rail;
mod servo;

pub use driver::SimulationDriver;
pub use rail::{RailOutputs, RailSenseLine, SimulatedRail};
pub use servo::{SimulatedServo, SimulatedServoOutput};

use slider_common::hal::driver::HalDriver;

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn HalDriver> {
    Box::new(SimulationDriver::new())
}
