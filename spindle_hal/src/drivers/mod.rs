//! Output driver implementations.
//!
//! - [`simulation`] - In-memory output for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `SpindleDriver` from `spindle_common::hal::driver`
//! 3. Register it in [`register_all_drivers`]

pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register every built-in driver with `registry`.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register(simulation::DRIVER_NAME, simulation::create_driver);
}
