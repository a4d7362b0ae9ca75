//! Output channel and signal types shared between HAL and controller.

use serde::{Deserialize, Serialize};

/// A duty-cycle channel handed out by the channel allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputChannel {
    /// Hardware channel number.
    pub id: u8,
    /// Duty resolution at the configured frequency [bits].
    pub precision_bits: u8,
}

impl OutputChannel {
    /// Largest duty code the channel accepts (the PWM period in counts).
    ///
    /// Zero precision yields a range of zero, which the controller treats
    /// as a configuration error.
    #[inline]
    pub const fn max_duty(&self) -> u32 {
        if self.precision_bits == 0 {
            0
        } else {
            1u32 << self.precision_bits
        }
    }
}

/// Direction line state written by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionSignal {
    /// All direction/forward/reverse lines low.
    #[default]
    Off,
    /// Clockwise.
    Forward,
    /// Counter-clockwise.
    Reverse,
}
