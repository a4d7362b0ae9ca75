//! System-wide constants for the spindle workspace.
//!
//! Single source of truth for all numeric limits. Imported by all crates.

use static_assertions::const_assert;

/// Number of hardware duty-cycle channels in the output peripheral.
pub const PWM_CHANNEL_COUNT: u8 = 8;

/// Channels reserved for the primary spindle (channel 0 and its timer pair).
pub const PWM_RESERVED_CHANNELS: u8 = 2;

/// Channel handed to the primary (first configured) tool.
pub const PWM_PRIMARY_CHANNEL: u8 = 0;

/// Highest duty resolution the output peripheral supports [bits].
pub const PWM_MAX_PRECISION_BITS: u8 = 16;

/// Source clock of the duty-cycle timers [Hz].
pub const PWM_CLOCK_HZ: u32 = 80_000_000;

/// Fixed-point scale of calibration segment slopes (2^16).
pub const SLOPE_FRACTION_BITS: u32 = 16;

/// Maximum number of calibration points per tool.
pub const MAX_CALIBRATION_POINTS: usize = 32;

/// Maximum number of tools in one registry.
pub const MAX_TOOLS: usize = 8;

/// Spindle speed override bounds [%].
pub const SPINDLE_OVERRIDE_MIN: u32 = 10;
pub const SPINDLE_OVERRIDE_DEFAULT: u32 = 100;
pub const SPINDLE_OVERRIDE_MAX: u32 = 200;

/// Default PWM frequency [Hz].
pub const DEFAULT_PWM_HZ: u32 = 5000;

/// Default speed range upper bound of a PWM spindle.
pub const DEFAULT_PWM_MAX_SPEED: u32 = 10_000;

/// Default speed range upper bound of a laser (S-word 0..255).
pub const DEFAULT_LASER_MAX_SPEED: u32 = 255;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/spindle/spindle.toml";

const_assert!(PWM_RESERVED_CHANNELS < PWM_CHANNEL_COUNT);
const_assert!(PWM_PRIMARY_CHANNEL < PWM_RESERVED_CHANNELS);
const_assert!(MAX_CALIBRATION_POINTS >= 4);
const_assert!(SPINDLE_OVERRIDE_MIN <= SPINDLE_OVERRIDE_DEFAULT);
const_assert!(SPINDLE_OVERRIDE_DEFAULT <= SPINDLE_OVERRIDE_MAX);
