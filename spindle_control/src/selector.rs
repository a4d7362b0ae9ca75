//! Tool registry and spindle selection.
//!
//! The registry owns every configured [`SpindleTool`] plus the index of the
//! active one. Only [`ToolRegistry::select`] changes that index, and it stops
//! the outgoing tool before the incoming one becomes active, so at most one
//! tool is ever driven.
//!
//! Selection picks the tool with the greatest `tool_num` not above the
//! requested tool number, falling back to the first registered tool.

use std::sync::Arc;

use spindle_common::consts::MAX_TOOLS;
use spindle_common::spindle::config::{SpindleUnitConfig, ToolConfig};
use spindle_common::spindle::error::SpindleError;
use spindle_common::spindle::state::SpindleState;
use spindle_hal::{DriverRegistry, OutputChannelAllocator};
use tracing::{error, info, warn};

use crate::governor::{BlockingDelay, RampDelay, RampPlan};
use crate::realtime::RealtimeState;
use crate::status::ToolStatus;
use crate::tool::SpindleTool;

pub struct ToolRegistry<D: RampDelay = BlockingDelay> {
    tools: Vec<SpindleTool>,
    active: Option<usize>,
    delay: D,
    realtime: Arc<RealtimeState>,
}

impl<D: RampDelay> ToolRegistry<D> {
    /// Empty registry.
    pub fn new(delay: D, realtime: Arc<RealtimeState>) -> Self {
        Self {
            tools: Vec::new(),
            active: None,
            delay,
            realtime,
        }
    }

    /// Build every tool of `config`.
    ///
    /// The first tool gets the primary channel; the rest draw from `pool`.
    /// A tool that cannot get a channel is kept but faulted.
    ///
    /// # Errors
    /// `Configuration` if the unit fails validation, `Driver` if a tool
    /// names a driver that is not registered.
    pub fn from_config(
        config: &SpindleUnitConfig,
        drivers: &DriverRegistry,
        pool: &OutputChannelAllocator,
        delay: D,
        realtime: Arc<RealtimeState>,
    ) -> Result<Self, SpindleError> {
        config
            .validate()
            .map_err(|e| SpindleError::Configuration(e.to_string()))?;

        let clock_hz = config.output.clock_hz;
        let mut registry = Self::new(delay, realtime);
        for (position, tool_config) in config.tools.iter().enumerate() {
            let driver = drivers
                .create_driver(&tool_config.driver)
                .map_err(|e| SpindleError::Driver(format!("{}: {e}", tool_config.name)))?;

            let channel = if position == 0 {
                Some(pool.primary_output(tool_config.pwm_hz, clock_hz))
            } else {
                match pool.allocate_output(tool_config.pwm_hz, clock_hz) {
                    Ok(ch) => Some(ch),
                    Err(e) => {
                        error!(tool = %tool_config.name, "{e}");
                        None
                    }
                }
            };

            let tool = SpindleTool::new(
                tool_config.clone(),
                channel,
                clock_hz,
                driver,
                Arc::clone(&registry.realtime),
            );
            registry.push(tool)?;
        }
        Ok(registry)
    }

    /// Append a tool.
    ///
    /// # Errors
    /// `Configuration` once `MAX_TOOLS` tools are registered.
    pub fn push(&mut self, tool: SpindleTool) -> Result<usize, SpindleError> {
        if self.tools.len() >= MAX_TOOLS {
            return Err(SpindleError::Configuration(format!(
                "too many tools (max {MAX_TOOLS})"
            )));
        }
        self.tools.push(tool);
        Ok(self.tools.len() - 1)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[inline]
    pub fn tools(&self) -> &[SpindleTool] {
        &self.tools
    }

    #[inline]
    pub fn tool(&self, position: usize) -> Option<&SpindleTool> {
        self.tools.get(position)
    }

    #[inline]
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_tool(&self) -> Option<&SpindleTool> {
        self.active.and_then(|i| self.tools.get(i))
    }

    #[inline]
    pub fn realtime(&self) -> &Arc<RealtimeState> {
        &self.realtime
    }

    #[inline]
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Position of the tool serving `requested`.
    fn resolve(&self, requested: u32) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, tool) in self.tools.iter().enumerate() {
            if tool.tool_num() > requested {
                continue;
            }
            match best {
                Some(b) if self.tools[b].tool_num() >= tool.tool_num() => {}
                _ => best = Some(i),
            }
        }
        best.or(if self.tools.is_empty() { None } else { Some(0) })
    }

    /// Make the tool serving `requested` active.
    ///
    /// Selecting the active tool again does nothing. Otherwise the previous
    /// tool is stopped through its governor before the switch, or parked
    /// when it is faulted.
    ///
    /// # Errors
    /// - `NoToolsConfigured` on an empty registry
    /// - the candidate's fault error if it is unusable (previous tool untouched)
    /// - any error from stopping or parking the previous tool (selection unchanged)
    pub fn select(&mut self, requested: u32) -> Result<usize, SpindleError> {
        let resolved = self.resolve(requested).ok_or_else(|| {
            error!("No spindles are defined");
            SpindleError::NoToolsConfigured
        })?;
        if self.active == Some(resolved) {
            return Ok(resolved);
        }

        let candidate = &self.tools[resolved];
        if let Some(err) = candidate.faults().to_error(candidate.name()) {
            warn!(tool = %candidate.name(), "cannot select faulted spindle: {err}");
            return Err(err);
        }

        if let Some(previous) = self.active {
            let prev = &mut self.tools[previous];
            if let Err(e) = prev.shut_down(&mut self.delay) {
                error!(
                    tool = %prev.name(),
                    "outgoing spindle not stopped, keeping it selected: {e}"
                );
                return Err(e);
            }
        }

        self.active = Some(resolved);
        info!("Using spindle {}", self.tools[resolved].name());
        Ok(resolved)
    }

    /// Select the tool for `tool_num` and drive it to `target` at `speed`.
    ///
    /// # Errors
    /// `InvalidTransition` for an `Unknown` target before anything is
    /// touched, then everything [`select`](Self::select) and
    /// [`SpindleTool::set_state`] return.
    pub fn set_state(
        &mut self,
        tool_num: u32,
        target: SpindleState,
        speed: u32,
    ) -> Result<RampPlan, SpindleError> {
        if target == SpindleState::Unknown {
            return Err(SpindleError::InvalidTransition(
                "Unknown is not a valid target state".to_string(),
            ));
        }
        let position = self.select(tool_num)?;
        self.tools[position].set_state(target, speed, &mut self.delay)
    }

    /// [`set_state`](Self::set_state) with a raw state code from the
    /// command layer.
    pub fn set_state_raw(
        &mut self,
        tool_num: u32,
        state: u8,
        speed: u32,
    ) -> Result<RampPlan, SpindleError> {
        let target = SpindleState::target_from_u8(state)?;
        self.set_state(tool_num, target, speed)
    }

    /// Stop the active tool, if any. A faulted active tool is parked.
    pub fn stop_active(&mut self) -> Result<Option<RampPlan>, SpindleError> {
        match self.active {
            Some(i) => self.tools[i].shut_down(&mut self.delay).map(Some),
            None => Ok(None),
        }
    }

    /// Overridden speed of the active tool, 0 when none is active.
    pub fn current_report_speed(&self) -> u32 {
        self.active_tool().map_or(0, SpindleTool::report_speed)
    }

    /// Whether the active tool is rate adjusted. False when none is active.
    pub fn is_rate_adjusted(&self) -> bool {
        self.active_tool().is_some_and(SpindleTool::is_rate_adjusted)
    }

    /// Replace the configuration of the tool at `position`.
    ///
    /// # Errors
    /// `Configuration` for a position outside the registry, then whatever
    /// [`SpindleTool::reconfigure`] returns.
    pub fn reconfigure(&mut self, position: usize, config: ToolConfig) -> Result<(), SpindleError> {
        let tool = self.tools.get_mut(position).ok_or_else(|| {
            SpindleError::Configuration(format!("no tool at position {position}"))
        })?;
        tool.reconfigure(config, &mut self.delay)
    }

    /// Change the output range of the tool at `position`.
    ///
    /// # Errors
    /// `Configuration` for a position outside the registry, then whatever
    /// [`SpindleTool::set_output_range`] returns.
    pub fn set_output_range(
        &mut self,
        position: usize,
        max_raw_output: u32,
    ) -> Result<(), SpindleError> {
        let tool = self.tools.get_mut(position).ok_or_else(|| {
            SpindleError::Configuration(format!("no tool at position {position}"))
        })?;
        tool.set_output_range(max_raw_output)
    }

    /// Status of every tool, in registration order.
    pub fn statuses(&self) -> Vec<ToolStatus> {
        self.tools
            .iter()
            .enumerate()
            .map(|(i, t)| t.status(self.active == Some(i)))
            .collect()
    }
}
