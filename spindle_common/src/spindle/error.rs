//! Spindle error taxonomy.
//!
//! `SpindleError` is what operations return. `ToolFault` is the persistent
//! per-tool fault set: a tool with any fault bit stays Disabled and cannot
//! be selected until it is reconfigured.

use bitflags::bitflags;
use thiserror::Error;

/// Errors surfaced by spindle operations.
///
/// None of these are retried automatically; each leaves the affected tool
/// stopped or unselected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpindleError {
    /// Unusable calibration, output range or ramp timing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The duty-cycle channel pool is exhausted.
    #[error("out of PWM channels: all {capacity} channels are allocated")]
    ResourceExhausted {
        /// Number of channels in the pool.
        capacity: u8,
    },

    /// Target state not accepted (Unknown or malformed).
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The registry holds no tools.
    #[error("no spindles are defined")]
    NoToolsConfigured,

    /// Command issued while the machine is aborting.
    #[error("spindle command blocked during abort")]
    Aborted,

    /// Output driver failed to attach or write.
    #[error("output driver error: {0}")]
    Driver(String),
}

bitflags! {
    /// Per-tool fault flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ToolFault: u8 {
        /// Fewer than two calibration points or a malformed point list.
        const CALIBRATION  = 0x01;
        /// Output range is zero (no PWM frequency / resolution).
        const OUTPUT_RANGE = 0x02;
        /// Ramp timing missing or out of bounds.
        const RAMP_TIMING  = 0x04;
        /// No duty-cycle channel could be allocated.
        const NO_CHANNEL   = 0x08;
        /// Output driver missing or failed to attach.
        const DRIVER       = 0x10;
    }
}

impl ToolFault {
    /// Faults that originate in the tool's configuration.
    pub const CONFIGURATION_MASK: Self = Self::from_bits_truncate(
        Self::CALIBRATION.bits() | Self::OUTPUT_RANGE.bits() | Self::RAMP_TIMING.bits(),
    );

    /// Returns true if no fault is set.
    #[inline]
    pub const fn is_usable(&self) -> bool {
        self.is_empty()
    }

    /// Fault names for status reporting.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }

    /// Error reported when a faulted tool is commanded.
    ///
    /// Channel exhaustion wins over configuration faults so the operator
    /// sees the resource problem first.
    pub fn to_error(&self, tool: &str) -> Option<SpindleError> {
        if self.is_empty() {
            None
        } else if self.contains(Self::NO_CHANNEL) {
            Some(SpindleError::ResourceExhausted {
                capacity: crate::consts::PWM_CHANNEL_COUNT,
            })
        } else if self.contains(Self::DRIVER) && !self.intersects(Self::CONFIGURATION_MASK) {
            Some(SpindleError::Driver(format!("{tool}: output driver unavailable")))
        } else {
            Some(SpindleError::Configuration(format!(
                "{tool}: unusable ({})",
                self.names().join(", ")
            )))
        }
    }
}

impl Default for ToolFault {
    fn default() -> Self {
        Self::empty()
    }
}
