//! Spindle configuration structures.
//!
//! All config types use `serde::Deserialize` for TOML loading. Optional
//! fields use `#[serde(default)]` so older files keep loading.
//!
//! Structural problems (empty names, duplicate names, impossible pool sizes)
//! fail `validate()`. Problems that only make one tool unusable (too few
//! calibration points, zero PWM frequency) are left for the tool to detect,
//! so the remaining tools still come up.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    DEFAULT_LASER_MAX_SPEED, DEFAULT_PWM_HZ, DEFAULT_PWM_MAX_SPEED, MAX_TOOLS, PWM_CHANNEL_COUNT,
    PWM_CLOCK_HZ, PWM_RESERVED_CHANNELS,
};

use super::calibration::SpeedMap;

/// Maximum accepted spin-up / spin-down time [ms].
pub const RAMP_MS_MAX: u32 = 120_000;

/// Output stage type of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// TTL PWM spindle, optional direction output.
    #[default]
    Pwm,
    /// PWM laser; power follows feed rate downstream.
    Laser,
    /// 0-10V VFD with forward/reverse lines.
    TenVolt,
    /// Relay spindle: full output or nothing.
    OnOff,
}

impl ToolKind {
    /// Whether the tool needs closed-loop (rate adjusted) interpretation
    /// downstream. Only lasers do.
    #[inline]
    pub const fn is_rate_adjusted(&self) -> bool {
        matches!(self, Self::Laser)
    }

    /// Speed range upper bound used when `max_speed` is not configured.
    pub const fn default_max_speed(&self) -> u32 {
        match self {
            Self::Laser => DEFAULT_LASER_MAX_SPEED,
            _ => DEFAULT_PWM_MAX_SPEED,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pwm => "PWM",
            Self::Laser => "Laser",
            Self::TenVolt => "0-10V",
            Self::OnOff => "OnOff",
        }
    }
}

fn default_pwm_hz() -> u32 {
    DEFAULT_PWM_HZ
}
fn default_true() -> bool {
    true
}
fn default_driver() -> String {
    "simulation".to_string()
}

/// Per-tool configuration (`[[tools]]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Display name, unique within the unit.
    pub name: String,

    /// Output stage type.
    #[serde(default)]
    pub kind: ToolKind,

    /// Lowest tool number (T-word) served by this tool.
    #[serde(default)]
    pub tool_num: u32,

    /// PWM frequency [Hz].
    #[serde(default = "default_pwm_hz")]
    pub pwm_hz: u32,

    /// Time to ramp from stop to full output [ms].
    #[serde(default)]
    pub spinup_ms: u32,

    /// Time to ramp from full output to stop [ms].
    #[serde(default)]
    pub spindown_ms: u32,

    /// Speeds below this map to zero duty when no speed map is given.
    #[serde(default)]
    pub min_speed: u32,

    /// Full-scale speed when no speed map is given.
    #[serde(default)]
    pub max_speed: Option<u32>,

    /// Calibration points (`spindle/speed_map`).
    #[serde(default)]
    pub speed_map: SpeedMap,

    /// Write the off code (instead of the mapped code) while disabled.
    #[serde(default = "default_true")]
    pub zero_speed_with_disable: bool,

    /// Drop the enable line whenever the reported speed is zero.
    #[serde(default)]
    pub disable_with_zero_speed: bool,

    /// A direction line is wired (PWM kind only).
    #[serde(default)]
    pub direction_output: bool,

    /// Output driver name in the driver registry.
    #[serde(default = "default_driver")]
    pub driver: String,
}

impl ToolConfig {
    /// Minimal configuration with defaults for everything but name and kind.
    pub fn new(name: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tool_num: 0,
            pwm_hz: DEFAULT_PWM_HZ,
            spinup_ms: 0,
            spindown_ms: 0,
            min_speed: 0,
            max_speed: None,
            speed_map: SpeedMap::default(),
            zero_speed_with_disable: true,
            disable_with_zero_speed: false,
            direction_output: false,
            driver: default_driver(),
        }
    }

    /// Configured full-scale speed, or the kind's default.
    #[inline]
    pub fn effective_max_speed(&self) -> u32 {
        self.max_speed.unwrap_or(self.kind.default_max_speed())
    }

    /// Whether the tool can rotate in reverse.
    pub fn is_reversible(&self) -> bool {
        match self.kind {
            ToolKind::TenVolt => true,
            ToolKind::Laser => false,
            ToolKind::Pwm | ToolKind::OnOff => self.direction_output,
        }
    }

    /// Structural validation.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("tool name cannot be empty".to_string());
        }
        if self.driver.is_empty() {
            return Err(format!("{}: driver name cannot be empty", self.name));
        }
        if self.min_speed > self.effective_max_speed() {
            return Err(format!(
                "{}: min_speed {} exceeds max_speed {}",
                self.name,
                self.min_speed,
                self.effective_max_speed()
            ));
        }
        Ok(())
    }
}

fn default_clock_hz() -> u32 {
    PWM_CLOCK_HZ
}
fn default_channel_count() -> u8 {
    PWM_CHANNEL_COUNT
}
fn default_reserved_channels() -> u8 {
    PWM_RESERVED_CHANNELS
}

/// Duty-cycle peripheral description (`[output]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Timer source clock [Hz].
    #[serde(default = "default_clock_hz")]
    pub clock_hz: u32,

    /// Number of channels in the pool.
    #[serde(default = "default_channel_count")]
    pub channel_count: u8,

    /// Channels reserved for the primary tool.
    #[serde(default = "default_reserved_channels")]
    pub reserved_channels: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            clock_hz: PWM_CLOCK_HZ,
            channel_count: PWM_CHANNEL_COUNT,
            reserved_channels: PWM_RESERVED_CHANNELS,
        }
    }
}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.clock_hz == 0 {
            return Err("output clock_hz must be greater than 0".to_string());
        }
        if self.channel_count == 0 || self.channel_count > 16 {
            return Err(format!(
                "output channel_count {} out of range [1, 16]",
                self.channel_count
            ));
        }
        if self.reserved_channels == 0 || self.reserved_channels > self.channel_count {
            return Err(format!(
                "output reserved_channels {} out of range [1, {}]",
                self.reserved_channels, self.channel_count
            ));
        }
        Ok(())
    }
}

/// Complete spindle unit configuration file.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "spindle-unit"
///
/// [output]
/// clock_hz = 80000000
///
/// [[tools]]
/// name = "router"
/// kind = "pwm"
/// tool_num = 0
/// pwm_hz = 5000
/// spinup_ms = 2000
/// spindown_ms = 3000
/// speed_map = "0=0% 6000=25% 24000=100%"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpindleUnitConfig {
    #[serde(default)]
    pub shared: SharedConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

impl SpindleUnitConfig {
    /// Validate the whole unit.
    ///
    /// # Validation Rules
    /// 1. `shared` is valid
    /// 2. `output` pool is sane
    /// 3. `tools.len()` <= MAX_TOOLS
    /// 4. every tool passes `ToolConfig::validate`
    /// 5. tool names are unique
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.output.validate().map_err(ConfigError::ValidationError)?;

        if self.tools.len() > MAX_TOOLS {
            return Err(ConfigError::ValidationError(format!(
                "Too many tools: {} (max {})",
                self.tools.len(),
                MAX_TOOLS
            )));
        }

        let mut names = HashSet::new();
        for tool in &self.tools {
            tool.validate().map_err(ConfigError::ValidationError)?;
            if !names.insert(tool.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate tool name '{}'",
                    tool.name
                )));
            }
        }
        Ok(())
    }
}
