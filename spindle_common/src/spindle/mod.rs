//! Spindle shared types.
//!
//! Everything the HAL and the spindle controller exchange lives here:
//! the tool state enum, calibration points, per-tool configuration and the
//! error taxonomy.

pub mod calibration;
pub mod config;
pub mod error;
pub mod state;
