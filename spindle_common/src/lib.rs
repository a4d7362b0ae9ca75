//! Spindle Common Library
//!
//! This crate provides the types shared by every crate of the spindle output
//! workspace: constants, configuration loading, spindle states, calibration
//! points, per-tool configuration, error types and the output driver trait.
//!
//! # Module Structure
//!
//! - [`consts`] - System-wide limits (channel pool, precision, table size)
//! - [`config`] - Configuration loading traits and types
//! - [`spindle`] - Spindle states, calibration points, tool config, errors
//! - [`hal`] - Output driver trait and HAL error type
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use spindle_common::prelude::*;
//!
//! let state = SpindleState::from_u8(2);
//! assert_eq!(state, Some(SpindleState::RotatingForward));
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
pub mod spindle;
