//! # Spindle HAL Library
//!
//! Duty-cycle output layer with pluggable driver architecture.
//!
//! # Module Structure
//!
//! - [`channel`] - Process-wide PWM channel pool and resolution calculation
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Output driver implementations
//!
//! # Architecture
//!
//! ```text
//!   OutputChannelAllocator        DriverRegistry
//!   (atomic, no release)          name -> factory
//!            |                          |
//!            | OutputChannel            | Box<dyn SpindleDriver>
//!            v                          v
//!          SpindleDriver::attach(channel, frequency_hz)
//! ```

#![deny(missing_docs)]

pub mod channel;
pub mod driver_registry;
pub mod drivers;

pub use crate::channel::{
    OutputChannelAllocator, allocate_channel, compute_precision, global_allocator,
};
pub use crate::drivers::simulation::{SimulatedOutput, SimulatedOutputHandle};
pub use crate::driver_registry::DriverRegistry;
