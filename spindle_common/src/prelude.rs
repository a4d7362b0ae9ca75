//! Prelude module for common re-exports.
//!
//! ```rust
//! use spindle_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Spindle Types ──────────────────────────────────────────────────
pub use crate::spindle::calibration::{CalibrationPoint, SpeedMap};
pub use crate::spindle::config::{OutputConfig, SpindleUnitConfig, ToolConfig, ToolKind};
pub use crate::spindle::error::{SpindleError, ToolFault};
pub use crate::spindle::state::SpindleState;

// ─── Output HAL ─────────────────────────────────────────────────────
pub use crate::hal::driver::{DriverFactory, HalError, SpindleDriver};
pub use crate::hal::types::{DirectionSignal, OutputChannel};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_CALIBRATION_POINTS, MAX_TOOLS, PWM_CHANNEL_COUNT, PWM_CLOCK_HZ};
