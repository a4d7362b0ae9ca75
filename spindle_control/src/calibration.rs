//! Calibration mapper: requested speed → raw output code.
//!
//! A tool's calibration points are turned into a piecewise-linear table of
//! [`Segment`]s. Segment `i` starts at `points[i].speed`, carries the raw code
//! for `points[i].percent` and a 16.16 fixed-point slope towards the next
//! point. The last segment is flat and clamps every speed above the highest
//! point.
//!
//! The table lives in a fixed-capacity `heapless::Vec` so rebuilding on a
//! configuration change never allocates.

use heapless::Vec as FixedVec;
use serde::Serialize;
use spindle_common::consts::{MAX_CALIBRATION_POINTS, SLOPE_FRACTION_BITS};
use spindle_common::spindle::calibration::CalibrationPoint;
use spindle_common::spindle::error::SpindleError;
use tracing::debug;

// ─── Segment ────────────────────────────────────────────────────────

/// One linear piece of the calibration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Lowest effective speed covered by this segment.
    pub threshold: u32,
    /// Raw output code at `threshold`.
    pub offset: u32,
    /// Raw codes per speed unit, scaled by 2^16.
    pub slope: u64,
}

/// Result of one speed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MappedSpeed {
    /// Speed after override, the value reported back to the operator.
    pub effective: u32,
    /// Raw output code.
    pub raw: u32,
}

// ─── Table ──────────────────────────────────────────────────────────

/// Piecewise-linear speed table owned by one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalibrationTable {
    segments: FixedVec<Segment, MAX_CALIBRATION_POINTS>,
    max_raw_output: u32,
}

impl CalibrationTable {
    /// Segments in threshold order.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Output range the table was built for.
    #[inline]
    pub const fn max_raw_output(&self) -> u32 {
        self.max_raw_output
    }

    /// Code written for zero speed.
    #[inline]
    pub fn off_code(&self) -> u32 {
        self.segments.first().map_or(0, |s| s.offset)
    }

    /// Look up the raw code for an already-overridden speed.
    pub fn map(&self, effective: u32) -> u32 {
        let segs = &self.segments;
        let Some(first) = segs.first() else {
            return 0;
        };
        if effective == 0 || effective < first.threshold {
            return first.offset;
        }

        let last = segs.len() - 1;
        let mut i = 0;
        while i < last {
            if effective < segs[i + 1].threshold {
                break;
            }
            i += 1;
        }

        let seg = &segs[i];
        if i == last {
            return seg.offset;
        }
        let rise = (u64::from(effective - seg.threshold)).saturating_mul(seg.slope)
            >> SLOPE_FRACTION_BITS;
        let raw = u64::from(seg.offset).saturating_add(rise);
        raw.min(u64::from(self.max_raw_output)) as u32
    }

    /// Apply `override_percent` to `requested` and look up the raw code.
    pub fn map_speed(&self, requested: u32, override_percent: u32) -> MappedSpeed {
        let effective = effective_speed(requested, override_percent);
        MappedSpeed {
            effective,
            raw: self.map(effective),
        }
    }
}

/// `requested * override_percent / 100`, saturating at `u32::MAX`.
#[inline]
pub fn effective_speed(requested: u32, override_percent: u32) -> u32 {
    let scaled = u64::from(requested) * u64::from(override_percent) / 100;
    scaled.min(u64::from(u32::MAX)) as u32
}

fn percent_to_raw(percent: f32, max_raw_output: u32) -> u32 {
    (f64::from(percent) / 100.0 * f64::from(max_raw_output)).round() as u32
}

/// Build a table from calibration points for an output range of
/// `max_raw_output` codes.
///
/// # Errors
/// `SpindleError::Configuration` when fewer than two points are given, more
/// than `MAX_CALIBRATION_POINTS`, the range is zero, a percent is outside
/// 0..=100, or speeds or percents decrease along the list.
pub fn build_table(
    points: &[CalibrationPoint],
    max_raw_output: u32,
) -> Result<CalibrationTable, SpindleError> {
    if points.len() < 2 {
        return Err(SpindleError::Configuration(format!(
            "speed map needs at least 2 points, got {}",
            points.len()
        )));
    }
    if points.len() > MAX_CALIBRATION_POINTS {
        return Err(SpindleError::Configuration(format!(
            "speed map has {} points (max {MAX_CALIBRATION_POINTS})",
            points.len()
        )));
    }
    if max_raw_output == 0 {
        return Err(SpindleError::Configuration(
            "output range is zero".to_string(),
        ));
    }
    for p in points {
        if !(0.0..=100.0).contains(&p.percent) {
            return Err(SpindleError::Configuration(format!(
                "speed map percent {} outside 0..=100",
                p.percent
            )));
        }
    }
    for pair in points.windows(2) {
        if pair[1].speed < pair[0].speed {
            return Err(SpindleError::Configuration(format!(
                "speed map speeds must not decrease ({} after {})",
                pair[1].speed, pair[0].speed
            )));
        }
        if pair[1].percent < pair[0].percent {
            return Err(SpindleError::Configuration(format!(
                "speed map percents must not decrease ({}% after {}%)",
                pair[1].percent, pair[0].percent
            )));
        }
    }

    let mut segments = FixedVec::new();
    for pair in points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let delta_speed = to.speed - from.speed;
        let slope = if delta_speed == 0 {
            0
        } else {
            let delta_percent = f64::from(to.percent) - f64::from(from.percent);
            let per_speed = delta_percent / 100.0 * f64::from(max_raw_output)
                / f64::from(delta_speed);
            (per_speed * f64::from(1u32 << SLOPE_FRACTION_BITS)) as u64
        };
        // Length checked above.
        let _ = segments.push(Segment {
            threshold: from.speed,
            offset: percent_to_raw(from.percent, max_raw_output),
            slope,
        });
    }
    let top = points[points.len() - 1];
    let _ = segments.push(Segment {
        threshold: top.speed,
        offset: percent_to_raw(top.percent, max_raw_output),
        slope: 0,
    });

    debug!(
        segments = segments.len(),
        max_raw_output, "calibration table built"
    );
    Ok(CalibrationTable {
        segments,
        max_raw_output,
    })
}

/// Default points for a tool with no speed map: zero below `min_speed`,
/// a step to the `min_speed` share of full scale, then linear to 100 %
/// at `max_speed`.
///
/// # Errors
/// `SpindleError::Configuration` if `max_speed` is zero.
pub fn synthesize_default_table(
    min_speed: u32,
    max_speed: u32,
) -> Result<Vec<CalibrationPoint>, SpindleError> {
    if max_speed == 0 {
        return Err(SpindleError::Configuration(
            "max speed must be greater than 0".to_string(),
        ));
    }
    let min_percent = (100.0 * f64::from(min_speed) / f64::from(max_speed)) as f32;

    let mut points = Vec::with_capacity(4);
    points.push(CalibrationPoint::new(0, 0.0));
    points.push(CalibrationPoint::new(0, min_percent));
    if min_speed != 0 {
        points.push(CalibrationPoint::new(min_speed, min_percent));
    }
    points.push(CalibrationPoint::new(max_speed, 100.0));
    Ok(points)
}
