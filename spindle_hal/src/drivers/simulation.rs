//! In-memory output driver.
//!
//! `SimulatedOutput` records every write into a shared state block instead of
//! touching pins. A [`SimulatedOutputHandle`] cloned before the driver is boxed
//! lets tests and the CLI inspect what the controller wrote, in order.

use std::sync::Arc;

use parking_lot::Mutex;
use spindle_common::hal::driver::{HalError, SpindleDriver};
use spindle_common::hal::types::{DirectionSignal, OutputChannel};
use tracing::trace;

/// Name under which this driver is registered.
pub const DRIVER_NAME: &str = "simulation";

/// One recorded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    /// Duty code written to the channel.
    Duty(u32),
    /// Enable line driven.
    Enable(bool),
    /// Direction lines driven.
    Direction(DirectionSignal),
}

/// Current line levels plus the write history.
#[derive(Debug, Clone, Default)]
pub struct SimulatedOutputState {
    /// Channel bound by `attach()`, `None` while detached.
    pub channel: Option<OutputChannel>,
    /// Frequency given to `attach()` [Hz].
    pub frequency_hz: u32,
    /// Last duty code written.
    pub duty: u32,
    /// Last enable level written.
    pub enabled: bool,
    /// Last direction written.
    pub direction: DirectionSignal,
    /// Every write since attach, oldest first.
    pub events: Vec<OutputEvent>,
}

impl SimulatedOutputState {
    /// Number of duty writes recorded.
    pub fn duty_writes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, OutputEvent::Duty(_)))
            .count()
    }
}

/// Shared view onto a `SimulatedOutput`.
#[derive(Debug, Clone, Default)]
pub struct SimulatedOutputHandle(Arc<Mutex<SimulatedOutputState>>);

impl SimulatedOutputHandle {
    /// Copy of the current state.
    pub fn snapshot(&self) -> SimulatedOutputState {
        self.0.lock().clone()
    }

    /// Drain the write history.
    pub fn take_events(&self) -> Vec<OutputEvent> {
        std::mem::take(&mut self.0.lock().events)
    }

    /// Last duty code written.
    pub fn duty(&self) -> u32 {
        self.0.lock().duty
    }

    /// Last enable level written.
    pub fn enabled(&self) -> bool {
        self.0.lock().enabled
    }

    /// Last direction written.
    pub fn direction(&self) -> DirectionSignal {
        self.0.lock().direction
    }
}

/// Output driver that keeps line levels in memory.
#[derive(Debug, Default)]
pub struct SimulatedOutput {
    state: SimulatedOutputHandle,
}

impl SimulatedOutput {
    /// Create a detached simulated output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle sharing this output's state.
    pub fn handle(&self) -> SimulatedOutputHandle {
        self.state.clone()
    }

    fn require_attached(state: &SimulatedOutputState) -> Result<OutputChannel, HalError> {
        state
            .channel
            .ok_or_else(|| HalError::NotAttached(DRIVER_NAME.to_string()))
    }
}

impl SpindleDriver for SimulatedOutput {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn attach(&mut self, channel: OutputChannel, frequency_hz: u32) -> Result<(), HalError> {
        if frequency_hz == 0 {
            return Err(HalError::ConfigError("frequency must be > 0".to_string()));
        }
        let mut state = self.state.0.lock();
        state.channel = Some(channel);
        state.frequency_hz = frequency_hz;
        state.duty = 0;
        state.events.clear();
        trace!(
            channel = channel.id,
            bits = channel.precision_bits,
            frequency_hz,
            "simulated output attached"
        );
        Ok(())
    }

    fn write_duty(&mut self, duty: u32) -> Result<(), HalError> {
        let mut state = self.state.0.lock();
        let channel = Self::require_attached(&state)?;
        if duty > channel.max_duty() {
            return Err(HalError::ConfigError(format!(
                "duty {duty} exceeds channel maximum {}",
                channel.max_duty()
            )));
        }
        state.duty = duty;
        state.events.push(OutputEvent::Duty(duty));
        Ok(())
    }

    fn write_enable(&mut self, enable: bool) -> Result<(), HalError> {
        let mut state = self.state.0.lock();
        state.enabled = enable;
        state.events.push(OutputEvent::Enable(enable));
        Ok(())
    }

    fn write_direction(&mut self, direction: DirectionSignal) -> Result<(), HalError> {
        let mut state = self.state.0.lock();
        state.direction = direction;
        state.events.push(OutputEvent::Direction(direction));
        Ok(())
    }

    fn detach(&mut self) -> Result<(), HalError> {
        let mut state = self.state.0.lock();
        state.channel = None;
        state.duty = 0;
        state.enabled = false;
        state.direction = DirectionSignal::Off;
        Ok(())
    }
}

/// Factory function to create a simulated output.
pub fn create_driver() -> Box<dyn SpindleDriver> {
    Box::new(SimulatedOutput::new())
}
