//! Spindle state enum.
//!
//! `#[repr(u8)]` keeps the value packable into the status word the governor
//! publishes (state in the high half, raw speed in the low half).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SpindleError;

/// Physical state of a tool output.
///
/// `Unknown` is the initializer only. It is never a transition target; it
/// makes the first real transition ramp down from full output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SpindleState {
    /// Never commanded since power-up.
    #[default]
    Unknown = 0,
    /// Output off (M5).
    Disabled = 1,
    /// Clockwise rotation (M3).
    RotatingForward = 2,
    /// Counter-clockwise rotation (M4).
    RotatingReverse = 3,
}

impl SpindleState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unknown),
            1 => Some(Self::Disabled),
            2 => Some(Self::RotatingForward),
            3 => Some(Self::RotatingReverse),
            _ => None,
        }
    }

    /// Convert a commanded raw value, rejecting values that are not valid
    /// transition targets.
    pub fn target_from_u8(value: u8) -> Result<Self, SpindleError> {
        match Self::from_u8(value) {
            Some(Self::Unknown) => Err(SpindleError::InvalidTransition(
                "Unknown is not a valid target state".to_string(),
            )),
            Some(state) => Ok(state),
            None => Err(SpindleError::InvalidTransition(format!(
                "malformed spindle state value {value}"
            ))),
        }
    }

    /// Returns true for either rotation direction.
    #[inline]
    pub const fn is_rotating(&self) -> bool {
        matches!(self, Self::RotatingForward | Self::RotatingReverse)
    }

    /// Short label used in logs and status lines.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Disabled => "off",
            Self::RotatingForward => "cw",
            Self::RotatingReverse => "ccw",
        }
    }
}

impl fmt::Display for SpindleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses command-line style state names. `Unknown` cannot be parsed.
impl FromStr for SpindleState {
    type Err = SpindleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "disabled" | "m5" => Ok(Self::Disabled),
            "cw" | "forward" | "m3" => Ok(Self::RotatingForward),
            "ccw" | "reverse" | "m4" => Ok(Self::RotatingReverse),
            other => Err(SpindleError::InvalidTransition(format!(
                "unrecognized spindle state '{other}'"
            ))),
        }
    }
}
