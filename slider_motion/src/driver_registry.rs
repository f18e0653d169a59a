//! Driver registry for HAL drivers.
//!
//! Constructed at startup, populated with the built-in drivers and queried by
//! name from the command line. No global state.

use slider_common::hal::driver::{DriverFactory, HalDriver, HalError};
use std::collections::BTreeMap;

/// Registry of available HAL drivers.
pub struct DriverRegistry {
    factories: BTreeMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in driver.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Errors
    /// `HalError::ConfigError` if the name is already taken.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) -> Result<(), HalError> {
        if self.factories.contains_key(name) {
            return Err(HalError::ConfigError(format!(
                "driver '{name}' is already registered"
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create a driver instance by name.
    ///
    /// # Errors
    /// `HalError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn HalDriver>, HalError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// Registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_simulation() {
        let reg = DriverRegistry::with_builtin_drivers();
        assert_eq!(reg.list_drivers(), vec!["simulation"]);
        let driver = reg.create_driver("simulation").unwrap();
        assert_eq!(driver.name(), "simulation");
    }

    #[test]
    fn unknown_driver_is_not_found() {
        let reg = DriverRegistry::new();
        assert!(matches!(
            reg.create_driver("gpio"),
            Err(HalError::DriverNotFound(_))
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = DriverRegistry::with_builtin_drivers();
        let err = reg
            .register("simulation", crate::drivers::simulation::create_driver)
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }
}
