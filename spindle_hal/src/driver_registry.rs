//! Driver registry for spindle output drivers.
//!
//! Provides a `DriverRegistry` struct for registering and retrieving driver
//! factories by the name a tool's `driver` key refers to. Constructed at
//! startup and passed to the tool registry by reference.

use spindle_common::hal::driver::{DriverFactory, HalError, SpindleDriver};
use std::collections::HashMap;

/// Registry of available output drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create a driver instance by name.
    ///
    /// # Errors
    /// Returns `HalError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn SpindleDriver>, HalError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
