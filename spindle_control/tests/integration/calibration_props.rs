//! Property tests for the calibration mapper.

use proptest::prelude::*;
use spindle_common::spindle::calibration::CalibrationPoint;
use spindle_control::calibration::{CalibrationTable, build_table};

/// Non-decreasing speeds paired with non-decreasing percents.
fn table_strategy() -> impl Strategy<Value = CalibrationTable> {
    (
        prop::collection::vec((0u32..100_000, 0.0f32..=100.0), 2..=8),
        1u32..=65_536,
    )
        .prop_map(|(raw, max_raw_output)| {
            let mut speeds: Vec<u32> = raw.iter().map(|(s, _)| *s).collect();
            let mut percents: Vec<f32> = raw.iter().map(|(_, p)| *p).collect();
            speeds.sort_unstable();
            percents.sort_by(|a, b| a.total_cmp(b));
            let points: Vec<CalibrationPoint> = speeds
                .into_iter()
                .zip(percents)
                .map(|(s, p)| CalibrationPoint::new(s, p))
                .collect();
            build_table(&points, max_raw_output).unwrap()
        })
}

proptest! {
    #[test]
    fn mapping_is_monotonic(table in table_strategy(), a in 0u32..150_000, b in 0u32..150_000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(table.map(lo) <= table.map(hi));
    }

    #[test]
    fn zero_maps_to_first_offset(table in table_strategy()) {
        prop_assert_eq!(table.map_speed(0, 100).raw, table.segments()[0].offset);
    }

    #[test]
    fn flat_above_highest_point(table in table_strategy(), extra in 1u32..1_000_000) {
        let top = *table.segments().last().unwrap();
        prop_assert_eq!(table.map(top.threshold.saturating_add(extra)), top.offset);
    }

    #[test]
    fn half_override_matches_half_speed(table in table_strategy(), speed in 0u32..200_000) {
        prop_assert_eq!(
            table.map_speed(speed, 50).raw,
            table.map_speed(speed / 2, 100).raw
        );
    }

    #[test]
    fn never_exceeds_range(table in table_strategy(), speed in any::<u32>(), ovr in 10u32..=200) {
        prop_assert!(table.map_speed(speed, ovr).raw <= table.max_raw_output());
    }
}
