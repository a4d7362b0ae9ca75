//! Calibration point lists.
//!
//! A tool's speed map is an ordered list of `(speed, percent)` pairs. In
//! TOML it is written either in the compact text form produced by the
//! settings dump:
//!
//! ```toml
//! speed_map = "0=0% 1000=20% 24000=100%"
//! ```
//!
//! or as an array of tables:
//!
//! ```toml
//! speed_map = [{ speed = 0, percent = 0.0 }, { speed = 24000, percent = 100.0 }]
//! ```
//!
//! Either way it is a plain value list, rebuilt on every configuration change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// One user-configured duty/speed pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Commanded speed (RPM, or S-word units for lasers).
    pub speed: u32,
    /// Output duty at that speed [%], 0..=100.
    pub percent: f32,
}

impl CalibrationPoint {
    pub const fn new(speed: u32, percent: f32) -> Self {
        Self { speed, percent }
    }
}

/// Ordered calibration points of one tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpeedMapRepr", into = "String")]
pub struct SpeedMap(Vec<CalibrationPoint>);

/// Accepted TOML shapes of a speed map.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum SpeedMapRepr {
    /// `"0=0% 1000=20%"`
    Text(String),
    /// `[{ speed = 0, percent = 0.0 }, ...]`
    Points(Vec<CalibrationPoint>),
}

impl SpeedMap {
    pub fn new(points: Vec<CalibrationPoint>) -> Self {
        Self(points)
    }

    #[inline]
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<CalibrationPoint>> for SpeedMap {
    fn from(points: Vec<CalibrationPoint>) -> Self {
        Self(points)
    }
}

impl TryFrom<SpeedMapRepr> for SpeedMap {
    type Error = ConfigError;

    fn try_from(repr: SpeedMapRepr) -> Result<Self, Self::Error> {
        match repr {
            SpeedMapRepr::Text(text) => text.parse(),
            SpeedMapRepr::Points(points) => {
                for p in &points {
                    check_percent(p.percent)?;
                }
                Ok(Self(points))
            }
        }
    }
}

impl From<SpeedMap> for String {
    fn from(map: SpeedMap) -> Self {
        map.to_string()
    }
}

fn check_percent(percent: f32) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(ConfigError::ValidationError(format!(
            "speed map percent {percent} out of range [0, 100]"
        )));
    }
    Ok(())
}

/// Parses `"speed=percent% speed=percent% ..."`. `"None"` and the empty
/// string yield an empty map.
impl FromStr for SpeedMap {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::default());
        }

        let mut points = Vec::new();
        for entry in s.split_whitespace() {
            let (speed, percent) = entry.split_once('=').ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "speed map entry '{entry}' is not speed=percent%"
                ))
            })?;
            let speed: u32 = speed.parse().map_err(|_| {
                ConfigError::ValidationError(format!("bad speed in speed map entry '{entry}'"))
            })?;
            let percent: f32 = percent
                .trim_end_matches('%')
                .parse()
                .map_err(|_| {
                    ConfigError::ValidationError(format!(
                        "bad percent in speed map entry '{entry}'"
                    ))
                })?;
            check_percent(percent)?;
            points.push(CalibrationPoint { speed, percent });
        }
        Ok(Self(points))
    }
}

impl fmt::Display for SpeedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("None");
        }
        let mut separator = "";
        for p in &self.0 {
            write!(f, "{separator}{}={}%", p.speed, p.percent)?;
            separator = " ";
        }
        Ok(())
    }
}
