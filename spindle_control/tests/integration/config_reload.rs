//! Integration tests: configuration file → registry → reconfiguration.

use std::io::Write;
use std::sync::Arc;

use spindle_common::spindle::config::ToolKind;
use spindle_common::spindle::error::{SpindleError, ToolFault};
use spindle_common::spindle::state::SpindleState;
use spindle_control::config::{load_config, load_config_from_str};
use spindle_control::{RealtimeState, RecordingDelay, ToolRegistry};
use spindle_hal::{DriverRegistry, OutputChannelAllocator};
use tempfile::NamedTempFile;

use super::common::UNIT_TOML;

fn build(toml: &str, pool: &OutputChannelAllocator) -> ToolRegistry<RecordingDelay> {
    let cfg = load_config_from_str(toml).unwrap();
    ToolRegistry::from_config(
        &cfg,
        &DriverRegistry::with_builtin(),
        pool,
        RecordingDelay::new(),
        Arc::new(RealtimeState::new()),
    )
    .unwrap()
}

#[test]
fn unit_file_builds_every_tool() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(UNIT_TOML.as_bytes()).unwrap();
    let cfg = load_config(file.path()).unwrap();

    let pool = OutputChannelAllocator::default();
    let reg = ToolRegistry::from_config(
        &cfg,
        &DriverRegistry::with_builtin(),
        &pool,
        RecordingDelay::new(),
        Arc::new(RealtimeState::new()),
    )
    .unwrap();

    let status = reg.statuses();
    assert_eq!(status.len(), 3);
    assert_eq!(status[0].channel, Some(0));
    assert_eq!(status[1].channel, Some(2));
    assert_eq!(status[2].channel, Some(3));
    assert_eq!(status[0].precision_bits, 13);
    assert_eq!(status[2].precision_bits, 11);
    assert!(status.iter().all(|s| s.faults.is_empty()));
    assert!(status.iter().all(|s| s.state == SpindleState::Unknown));
    assert_eq!(status[1].kind, ToolKind::TenVolt);
}

#[test]
fn exhausted_pool_faults_late_tools() {
    // Primary on channel 0, one pool channel, third tool left without.
    let pool = OutputChannelAllocator::new(3, 2);
    let mut reg = build(UNIT_TOML, &pool);

    assert!(reg.tools()[0].is_usable());
    assert!(reg.tools()[1].is_usable());
    assert_eq!(reg.tools()[2].faults(), ToolFault::NO_CHANNEL);
    assert_eq!(reg.statuses()[2].state, SpindleState::Disabled);

    assert_eq!(
        reg.set_state(100, SpindleState::RotatingForward, 100),
        Err(SpindleError::ResourceExhausted { capacity: 8 })
    );
    assert_eq!(reg.active_index(), None);
}

#[test]
fn unknown_driver_rejected() {
    let cfg = load_config_from_str(
        r#"
[[tools]]
name = "router"
driver = "ledc"
"#,
    )
    .unwrap();
    let result = ToolRegistry::from_config(
        &cfg,
        &DriverRegistry::with_builtin(),
        &OutputChannelAllocator::default(),
        RecordingDelay::new(),
        Arc::new(RealtimeState::new()),
    );
    assert!(matches!(result, Err(SpindleError::Driver(_))));
}

#[test]
fn short_speed_map_disables_only_that_tool() {
    let toml = r#"
[[tools]]
name = "good"
tool_num = 0

[[tools]]
name = "bad"
tool_num = 5
speed_map = "0=0%"
"#;
    let pool = OutputChannelAllocator::default();
    let mut reg = build(toml, &pool);

    assert!(reg.tools()[0].is_usable());
    assert!(reg.tools()[1].faults().contains(ToolFault::CALIBRATION));
    assert_eq!(reg.tools()[1].state(), SpindleState::Disabled);
    assert!(reg.set_state(0, SpindleState::RotatingForward, 100).is_ok());
    assert!(matches!(
        reg.set_state(5, SpindleState::RotatingForward, 100),
        Err(SpindleError::Configuration(_))
    ));
}

#[test]
fn reconfigure_repairs_faulted_tool() {
    let toml = r#"
[[tools]]
name = "router"
speed_map = "0=0%"
"#;
    let pool = OutputChannelAllocator::default();
    let mut reg = build(toml, &pool);
    assert!(!reg.tools()[0].is_usable());

    let mut fixed = reg.tools()[0].config().clone();
    fixed.speed_map = "0=0% 24000=100%".parse().unwrap();
    reg.reconfigure(0, fixed).unwrap();

    assert!(reg.tools()[0].is_usable());
    assert!(reg.set_state(0, SpindleState::RotatingForward, 24000).is_ok());
    assert_eq!(reg.statuses()[0].raw_speed, 8192);
}

#[test]
fn reconfigure_stops_rotating_tool() {
    let pool = OutputChannelAllocator::default();
    let mut reg = build(UNIT_TOML, &pool);
    reg.set_state(0, SpindleState::RotatingForward, 12000).unwrap();
    reg.delay().clear();

    let mut slower = reg.tools()[0].config().clone();
    slower.spindown_ms = 4000;
    reg.reconfigure(0, slower).unwrap();

    assert_eq!(reg.tools()[0].state(), SpindleState::Disabled);
    // Stopped with the old 2 s spin-down from half scale.
    assert_eq!(reg.delay().total(), std::time::Duration::from_millis(999));
}
