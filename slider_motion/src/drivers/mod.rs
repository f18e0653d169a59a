//! HAL driver implementations.
//!
//! - [`simulation`] - Simulated rail with end stops and a simulated servo
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `HalDriver` trait from `slider_common::hal::driver`
//! 3. Register the driver in [`register_all_drivers`]

pub mod simulation;

use crate::driver_registry::DriverRegistry;
use tracing::error;

/// Register all built-in drivers.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    if let Err(e) = registry.register("simulation", simulation::create_driver) {
        error!("built-in driver registration failed: {e}");
    }
}
