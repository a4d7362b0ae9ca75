//! Shared fixtures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use spindle_common::consts::PWM_CLOCK_HZ;
use spindle_common::hal::driver::{HalError, SpindleDriver};
use spindle_common::hal::types::{DirectionSignal, OutputChannel};
use spindle_common::spindle::config::{ToolConfig, ToolKind};
use spindle_control::{RealtimeState, RecordingDelay, SpindleTool, ToolRegistry};
use spindle_hal::{SimulatedOutput, SimulatedOutputHandle};

pub const UNIT_TOML: &str = r#"
[shared]
service_name = "mill-test"

[[tools]]
name = "router"
kind = "pwm"
tool_num = 0
pwm_hz = 5000
spinup_ms = 1000
spindown_ms = 2000
direction_output = true
speed_map = "0=0% 24000=100%"

[[tools]]
name = "vfd"
kind = "ten_volt"
tool_num = 20
spinup_ms = 4000
spindown_ms = 4000
max_speed = 18000

[[tools]]
name = "diode"
kind = "laser"
tool_num = 100
pwm_hz = 20000
"#;

/// Registry of hand-built tools with inspectable outputs.
pub struct Bench {
    pub registry: ToolRegistry<RecordingDelay>,
    pub outputs: Vec<SimulatedOutputHandle>,
    pub delay: RecordingDelay,
    pub realtime: Arc<RealtimeState>,
}

pub fn pwm_tool(name: &str, tool_num: u32) -> ToolConfig {
    let mut cfg = ToolConfig::new(name, ToolKind::Pwm);
    cfg.tool_num = tool_num;
    cfg.direction_output = true;
    cfg.spinup_ms = 1000;
    cfg.spindown_ms = 1000;
    cfg
}

/// Simulated output whose duty writes fail while its flag is set.
pub struct StuckDutyOutput {
    inner: SimulatedOutput,
    stuck: Arc<AtomicBool>,
}

impl SpindleDriver for StuckDutyOutput {
    fn name(&self) -> &'static str {
        "stuck_duty"
    }

    fn attach(&mut self, channel: OutputChannel, frequency_hz: u32) -> Result<(), HalError> {
        self.inner.attach(channel, frequency_hz)
    }

    fn write_duty(&mut self, duty: u32) -> Result<(), HalError> {
        if self.stuck.load(Ordering::SeqCst) {
            return Err(HalError::ConfigError(format!("duty line stuck, {duty} not written")));
        }
        self.inner.write_duty(duty)
    }

    fn write_enable(&mut self, enable: bool) -> Result<(), HalError> {
        self.inner.write_enable(enable)
    }

    fn write_direction(&mut self, direction: DirectionSignal) -> Result<(), HalError> {
        self.inner.write_direction(direction)
    }

    fn detach(&mut self) -> Result<(), HalError> {
        self.inner.detach()
    }
}

pub fn bench(configs: Vec<ToolConfig>) -> Bench {
    build_bench(configs, |out| Box::new(out))
}

/// Like [`bench`], with one stuck-duty flag per tool (all clear).
pub fn stuck_duty_bench(configs: Vec<ToolConfig>) -> (Bench, Vec<Arc<AtomicBool>>) {
    let mut flags = Vec::new();
    let b = build_bench(configs, |inner| {
        let stuck = Arc::new(AtomicBool::new(false));
        flags.push(Arc::clone(&stuck));
        Box::new(StuckDutyOutput { inner, stuck })
    });
    (b, flags)
}

fn build_bench<F>(configs: Vec<ToolConfig>, mut wrap: F) -> Bench
where
    F: FnMut(SimulatedOutput) -> Box<dyn SpindleDriver>,
{
    let delay = RecordingDelay::new();
    let realtime = Arc::new(RealtimeState::new());
    let mut registry = ToolRegistry::new(delay.clone(), Arc::clone(&realtime));
    let mut outputs = Vec::new();

    for (i, cfg) in configs.into_iter().enumerate() {
        let out = SimulatedOutput::new();
        outputs.push(out.handle());
        let channel = OutputChannel {
            id: i as u8 * 2,
            precision_bits: 0,
        };
        let tool = SpindleTool::new(
            cfg,
            Some(channel),
            PWM_CLOCK_HZ,
            wrap(out),
            Arc::clone(&realtime),
        );
        registry.push(tool).unwrap();
    }

    Bench {
        registry,
        outputs,
        delay,
        realtime,
    }
}
