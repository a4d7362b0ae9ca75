//! Integration tests for tool selection.
//!
//! - Greatest tool number not above the request wins, first tool otherwise.
//! - At most one tool is driven; the outgoing tool is stopped first.
//! - Faulted candidates are refused without disturbing the active tool.
//! - A faulted outgoing tool is parked first; if it cannot be, no switch.

use spindle_common::spindle::error::SpindleError;
use spindle_common::spindle::state::SpindleState;
use spindle_hal::drivers::simulation::OutputEvent;

use std::sync::atomic::Ordering;

use super::common::{bench, pwm_tool, stuck_duty_bench};

#[test]
fn switching_tools_never_leaves_two_enabled() {
    let mut b = bench(vec![pwm_tool("a", 0), pwm_tool("b", 10), pwm_tool("c", 20)]);

    for (tool_num, speed) in [(0, 5000), (10, 8000), (25, 2000), (3, 1000), (12, 9000)] {
        b.registry
            .set_state(tool_num, SpindleState::RotatingForward, speed)
            .unwrap();

        let enabled = b.outputs.iter().filter(|o| o.enabled()).count();
        assert_eq!(enabled, 1, "after selecting T{tool_num}");
        let rotating = b
            .registry
            .tools()
            .iter()
            .filter(|t| t.state().is_rotating())
            .count();
        assert_eq!(rotating, 1);
    }
    assert_eq!(b.registry.active_index(), Some(1));
}

#[test]
fn outgoing_tool_stops_before_switch() {
    let mut b = bench(vec![pwm_tool("a", 0), pwm_tool("b", 10)]);
    b.registry
        .set_state(0, SpindleState::RotatingForward, 10_000)
        .unwrap();
    b.outputs[0].take_events();
    b.outputs[1].take_events();
    b.delay.clear();

    b.registry.select(10).unwrap();

    // Full-speed stop over a 1 s spin-down.
    assert_eq!(b.delay.waits(), vec![std::time::Duration::from_millis(1000)]);
    assert_eq!(
        b.outputs[0].take_events(),
        vec![OutputEvent::Duty(0), OutputEvent::Enable(false)]
    );
    assert!(b.outputs[1].take_events().is_empty());
}

#[test]
fn selecting_active_tool_costs_nothing() {
    let mut b = bench(vec![pwm_tool("a", 0), pwm_tool("b", 10)]);
    b.registry
        .set_state(10, SpindleState::RotatingForward, 4000)
        .unwrap();
    b.delay.clear();

    for requested in [10, 11, 19, 500] {
        assert_eq!(b.registry.select(requested).unwrap(), 1);
    }
    assert!(b.delay.waits().is_empty());
    assert_eq!(b.registry.tools()[1].state(), SpindleState::RotatingForward);
}

#[test]
fn request_below_every_tool_uses_first() {
    let mut b = bench(vec![pwm_tool("a", 5), pwm_tool("b", 10)]);
    assert_eq!(b.registry.select(1).unwrap(), 0);
}

#[test]
fn faulted_candidate_refused_and_active_kept() {
    let mut broken = pwm_tool("broken", 10);
    broken.speed_map = "0=0%".parse().unwrap();
    let mut b = bench(vec![pwm_tool("a", 0), broken]);

    b.registry
        .set_state(0, SpindleState::RotatingForward, 5000)
        .unwrap();
    let err = b
        .registry
        .set_state(10, SpindleState::RotatingForward, 5000)
        .unwrap_err();

    assert!(matches!(err, SpindleError::Configuration(_)));
    assert_eq!(b.registry.active_index(), Some(0));
    assert_eq!(b.registry.tools()[0].state(), SpindleState::RotatingForward);
    assert!(b.outputs[0].enabled());
}

#[test]
fn report_speed_and_rate_follow_active_tool() {
    let mut laser = spindle_common::spindle::config::ToolConfig::new(
        "diode",
        spindle_common::spindle::config::ToolKind::Laser,
    );
    laser.tool_num = 100;
    let mut b = bench(vec![pwm_tool("a", 0), laser]);

    assert_eq!(b.registry.current_report_speed(), 0);
    assert!(!b.registry.is_rate_adjusted());

    b.registry
        .set_state(0, SpindleState::RotatingForward, 6000)
        .unwrap();
    assert_eq!(b.registry.current_report_speed(), 6000);
    assert!(!b.registry.is_rate_adjusted());

    b.registry
        .set_state(100, SpindleState::RotatingForward, 128)
        .unwrap();
    assert_eq!(b.registry.current_report_speed(), 128);
    assert!(b.registry.is_rate_adjusted());
}

#[test]
fn abort_blocks_switch() {
    let mut b = bench(vec![pwm_tool("a", 0), pwm_tool("b", 10)]);
    b.registry
        .set_state(0, SpindleState::RotatingForward, 5000)
        .unwrap();
    b.realtime.request_abort();

    assert_eq!(
        b.registry.set_state(10, SpindleState::RotatingForward, 100),
        Err(SpindleError::Aborted)
    );
    assert_eq!(b.registry.active_index(), Some(0));
}

#[test]
fn faulted_outgoing_tool_parked_before_switch() {
    let (mut b, stuck) = stuck_duty_bench(vec![pwm_tool("a", 0), pwm_tool("b", 10)]);
    b.registry
        .set_state(0, SpindleState::RotatingForward, 5000)
        .unwrap();

    stuck[0].store(true, Ordering::SeqCst);
    assert!(matches!(
        b.registry.set_state(0, SpindleState::RotatingForward, 8000),
        Err(SpindleError::Driver(_))
    ));
    assert!(!b.registry.tools()[0].is_usable());
    // Enable dropped even though the duty line would not take the off code.
    assert!(!b.outputs[0].enabled());
    assert_eq!(b.registry.tools()[0].state(), SpindleState::RotatingForward);

    // Not confirmed stopped: the switch is refused.
    assert!(matches!(
        b.registry.set_state(10, SpindleState::RotatingForward, 5000),
        Err(SpindleError::Driver(_))
    ));
    assert_eq!(b.registry.active_index(), Some(0));
    assert!(!b.outputs[1].enabled());
    assert_eq!(b.registry.tools()[1].state(), SpindleState::Unknown);

    stuck[0].store(false, Ordering::SeqCst);
    b.registry
        .set_state(10, SpindleState::RotatingForward, 5000)
        .unwrap();

    assert_eq!(b.registry.tools()[0].state(), SpindleState::Disabled);
    assert_eq!(b.outputs[0].duty(), 0);
    assert_eq!(b.registry.active_index(), Some(1));
    let enabled: Vec<bool> = b.outputs.iter().map(|o| o.enabled()).collect();
    assert_eq!(enabled, vec![false, true]);
    let rotating = b
        .registry
        .tools()
        .iter()
        .filter(|t| t.state().is_rotating())
        .count();
    assert_eq!(rotating, 1);
}

#[test]
fn stop_active_parks_faulted_tool() {
    let (mut b, stuck) = stuck_duty_bench(vec![pwm_tool("a", 0)]);
    b.registry
        .set_state(0, SpindleState::RotatingForward, 5000)
        .unwrap();
    stuck[0].store(true, Ordering::SeqCst);
    assert!(b.registry.set_state(0, SpindleState::RotatingForward, 9000).is_err());

    stuck[0].store(false, Ordering::SeqCst);
    b.delay.clear();
    b.registry.stop_active().unwrap();

    assert_eq!(b.registry.tools()[0].state(), SpindleState::Disabled);
    assert!(!b.outputs[0].enabled());
    assert!(!b.delay.waits().is_empty());
}
