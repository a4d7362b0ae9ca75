//! Output driver trait and error types.
//!
//! This module defines:
//! - `SpindleDriver` trait - Interface for pluggable output backends
//! - `HalError` enum - Error types for driver operations
//! - `DriverFactory` type alias - Factory function type

use thiserror::Error;

use super::types::{DirectionSignal, OutputChannel};

/// Error types for output driver operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Output written before `attach()`
    #[error("Output not attached: {0}")]
    NotAttached(String),
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn SpindleDriver>;

/// Trait defining the interface for spindle output drivers.
///
/// One driver instance serves one tool: a duty-cycle channel plus the
/// enable and direction lines.
///
/// # Lifecycle
///
/// 1. `attach()` - Bind the duty channel at the tool's frequency
/// 2. `write_duty()` / `write_enable()` / `write_direction()` - Runtime output
/// 3. `detach()` - Release pins when the tool is deconfigured
///
/// Writes must not block; the controller calls them from the command path.
pub trait SpindleDriver: Send {
    /// Returns the driver's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Bind the duty-cycle output to `channel` at `frequency_hz`.
    fn attach(&mut self, channel: OutputChannel, frequency_hz: u32) -> Result<(), HalError>;

    /// Write a raw duty code (0..=channel.max_duty()).
    fn write_duty(&mut self, duty: u32) -> Result<(), HalError>;

    /// Drive the enable line.
    fn write_enable(&mut self, enable: bool) -> Result<(), HalError>;

    /// Drive the direction lines.
    fn write_direction(&mut self, direction: DirectionSignal) -> Result<(), HalError>;

    /// Return all lines to inputs.
    fn detach(&mut self) -> Result<(), HalError>;
}
