//! # Spindle Control Library
//!
//! Drives one or more spindle-class tools (routers, VFD spindles, lasers,
//! relay spindles) from commanded speed and state.
//!
//! ## Components
//!
//! 1. **CalibrationMapper** ([`calibration`]): speed → raw output code
//! 2. **TransitionGovernor** ([`governor`]): ramp delays between states
//! 3. **SpindleTool** ([`tool`]): one output stage with its driver
//! 4. **ToolRegistry** ([`selector`]): tool-number based selection
//!
//! Channel allocation and output drivers live in `spindle_hal`.
//!
//! ## Flow
//!
//! ```text
//! set_state(tool_num, state, speed)
//!   → ToolRegistry::select        stop the outgoing tool first
//!   → SpindleTool::set_state      map speed, write outputs
//!   → TransitionGovernor          wait down, wait up, commit {state, speed}
//! ```

pub mod calibration;
pub mod config;
pub mod governor;
pub mod realtime;
pub mod rt;
pub mod selector;
pub mod status;
pub mod tool;

pub use crate::governor::{BlockingDelay, RampDelay, RampPlan, RecordingDelay};
pub use crate::realtime::RealtimeState;
pub use crate::selector::ToolRegistry;
pub use crate::tool::SpindleTool;
