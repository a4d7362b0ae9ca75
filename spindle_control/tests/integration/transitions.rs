//! Integration tests for state transitions through a tool.
//!
//! Ramp delays follow the cost matrix, spin-down is waited before spin-up,
//! and `{state, speed}` only becomes visible after both waits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use spindle_common::consts::PWM_CLOCK_HZ;
use spindle_common::hal::types::{DirectionSignal, OutputChannel};
use spindle_common::spindle::state::SpindleState;
use spindle_control::governor::RampDelay;
use spindle_control::status::ToolStatusCell;
use spindle_control::{RealtimeState, SpindleTool};
use spindle_hal::SimulatedOutput;
use spindle_hal::drivers::simulation::OutputEvent;

use super::common::{bench, pwm_tool};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Unit-range bench: one reversible tool with a 0..1000 code range and a
/// straight 0..1000 speed map.
fn unit_range(spinup_ms: u32, spindown_ms: u32) -> super::common::Bench {
    let mut cfg = pwm_tool("router", 0);
    cfg.spinup_ms = spinup_ms;
    cfg.spindown_ms = spindown_ms;
    cfg.speed_map = "0=0% 1000=100%".parse().unwrap();
    let mut b = bench(vec![cfg]);
    b.registry.set_output_range(0, 1000).unwrap();
    b.registry.set_state(0, SpindleState::Disabled, 0).unwrap();
    b.delay.clear();
    b
}

#[test]
fn spin_up_from_disabled() {
    let mut b = unit_range(1000, 1000);
    let ramp = b
        .registry
        .set_state(0, SpindleState::RotatingForward, 500)
        .unwrap();

    assert_eq!((ramp.down, ramp.up), (0, 500));
    assert_eq!(b.delay.waits(), vec![ms(500)]);
}

#[test]
fn first_command_ramps_down_full_scale() {
    let mut cfg = pwm_tool("router", 0);
    cfg.spindown_ms = 3000;
    let mut b = bench(vec![cfg]);

    let ramp = b.registry.set_state(0, SpindleState::Disabled, 0).unwrap();
    assert_eq!(ramp.down, b.registry.tools()[0].max_raw_output());
    assert_eq!(b.delay.waits(), vec![ms(3000)]);
}

#[test]
fn reversal_waits_down_then_up() {
    let mut b = unit_range(1000, 2000);
    b.registry
        .set_state(0, SpindleState::RotatingForward, 300)
        .unwrap();
    b.delay.clear();
    b.outputs[0].take_events();

    let ramp = b
        .registry
        .set_state(0, SpindleState::RotatingReverse, 300)
        .unwrap();

    assert_eq!((ramp.down, ramp.up), (300, 300));
    assert_eq!(b.delay.waits(), vec![ms(600), ms(300)]);
    // Same code in both directions, so no duty rewrite.
    assert_eq!(
        b.outputs[0].take_events(),
        vec![
            OutputEvent::Direction(DirectionSignal::Reverse),
            OutputEvent::Enable(true),
        ]
    );
}

#[test]
fn same_direction_slowdown_uses_difference() {
    let mut b = unit_range(1000, 1000);
    b.registry
        .set_state(0, SpindleState::RotatingForward, 800)
        .unwrap();
    b.delay.clear();

    let ramp = b
        .registry
        .set_state(0, SpindleState::RotatingForward, 200)
        .unwrap();
    assert_eq!((ramp.down, ramp.up), (600, 0));
    assert_eq!(b.delay.waits(), vec![ms(600)]);
}

#[test]
fn delays_scale_with_ramp_times() {
    let totals: Vec<Duration> = [500u32, 1000, 3000]
        .into_iter()
        .map(|spindown| {
            let mut b = unit_range(1000, spindown);
            b.registry
                .set_state(0, SpindleState::RotatingForward, 400)
                .unwrap();
            b.delay.clear();
            b.registry.set_state(0, SpindleState::Disabled, 0).unwrap();
            b.delay.total()
        })
        .collect();

    assert_eq!(totals, vec![ms(200), ms(400), ms(1200)]);
}

/// Delay source that snapshots the status cell while it "waits".
struct ObservingDelay {
    cell: Arc<ToolStatusCell>,
    seen: Vec<(SpindleState, u32)>,
}

impl RampDelay for ObservingDelay {
    fn wait(&mut self, duration: Duration) {
        if !duration.is_zero() {
            self.seen.push(self.cell.load());
        }
    }
}

#[test]
fn new_state_invisible_during_ramp() {
    let mut tool = SpindleTool::new(
        pwm_tool("standalone", 0),
        Some(OutputChannel {
            id: 4,
            precision_bits: 0,
        }),
        PWM_CLOCK_HZ,
        Box::new(SimulatedOutput::new()),
        Arc::new(RealtimeState::new()),
    );
    let mut delay = ObservingDelay {
        cell: tool.status_cell(),
        seen: Vec::new(),
    };

    tool.set_state(SpindleState::RotatingForward, 5000, &mut delay)
        .unwrap();
    let forward_speed = tool.raw_speed();
    tool.set_state(SpindleState::RotatingReverse, 5000, &mut delay)
        .unwrap();

    // Two waits per transition, each observing the previous commit.
    assert_eq!(
        delay.seen,
        vec![
            (SpindleState::Unknown, 0),
            (SpindleState::Unknown, 0),
            (SpindleState::RotatingForward, forward_speed),
            (SpindleState::RotatingForward, forward_speed),
        ]
    );
    assert_eq!(tool.state(), SpindleState::RotatingReverse);
}

#[test]
fn status_reader_sees_consistent_pairs() {
    let mut b = unit_range(0, 0);
    let cell = b.registry.tools()[0].status_cell();
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let cell = Arc::clone(&cell);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut reads = 0u64;
            while !stop.load(Ordering::Acquire) {
                let pair = cell.load();
                assert!(
                    matches!(
                        pair,
                        (SpindleState::Disabled, 0)
                            | (SpindleState::RotatingForward, 300)
                            | (SpindleState::RotatingReverse, 700)
                    ),
                    "torn status {pair:?}"
                );
                reads += 1;
            }
            reads
        })
    };

    for _ in 0..2000 {
        b.registry
            .set_state(0, SpindleState::RotatingForward, 300)
            .unwrap();
        b.registry
            .set_state(0, SpindleState::RotatingReverse, 700)
            .unwrap();
        b.registry.set_state(0, SpindleState::Disabled, 0).unwrap();
    }
    stop.store(true, Ordering::Release);
    assert!(reader.join().unwrap() > 0);
}
