//! One configured spindle tool.
//!
//! A `SpindleTool` ties together its configuration, an output driver, the
//! duty-cycle channel it was given, its calibration table and its transition
//! governor. Construction never fails: problems are recorded as
//! [`ToolFault`] bits and the tool stays Disabled until reconfigured.
//!
//! # Output Order
//!
//! `set_state` maps the speed, writes direction (when rotating), writes the
//! duty code, drives the enable line, then waits out the ramp and commits the
//! new state. Duty writes are skipped when the code is unchanged.

use std::sync::Arc;

use spindle_common::hal::driver::{HalError, SpindleDriver};
use spindle_common::hal::types::{DirectionSignal, OutputChannel};
use spindle_common::spindle::config::{RAMP_MS_MAX, ToolConfig, ToolKind};
use spindle_common::spindle::error::{SpindleError, ToolFault};
use spindle_common::spindle::state::SpindleState;
use spindle_hal::compute_precision;
use tracing::{debug, error, info, warn};

use crate::calibration::{CalibrationTable, build_table, effective_speed, synthesize_default_table};
use crate::governor::{RampDelay, RampPlan, RampTiming, TransitionGovernor};
use crate::realtime::RealtimeState;
use crate::status::{ToolStatus, ToolStatusCell};

pub struct SpindleTool {
    config: ToolConfig,
    driver: Box<dyn SpindleDriver>,
    channel: Option<OutputChannel>,
    clock_hz: u32,
    table: Option<CalibrationTable>,
    governor: TransitionGovernor,
    status: Arc<ToolStatusCell>,
    realtime: Arc<RealtimeState>,
    faults: ToolFault,
    last_duty: Option<u32>,
}

impl SpindleTool {
    /// Build a tool on `channel` (`None` when the pool was exhausted).
    ///
    /// The driver is attached and the calibration table built immediately;
    /// any failure is logged and kept as a fault.
    pub fn new(
        config: ToolConfig,
        channel: Option<OutputChannel>,
        clock_hz: u32,
        driver: Box<dyn SpindleDriver>,
        realtime: Arc<RealtimeState>,
    ) -> Self {
        let status = Arc::new(ToolStatusCell::new());
        let mut tool = Self {
            governor: TransitionGovernor::new(Arc::clone(&status), None, 0),
            config,
            driver,
            channel,
            clock_hz,
            table: None,
            status,
            realtime,
            faults: ToolFault::empty(),
            last_duty: None,
        };
        if tool.channel.is_none() {
            tool.faults |= ToolFault::NO_CHANNEL;
        }
        tool.attach();
        tool.rebuild();
        if tool.is_usable() {
            tool.write_idle();
            info!("{}", tool.config_message());
        } else {
            tool.status.commit(SpindleState::Disabled, 0);
        }
        tool
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[inline]
    pub fn tool_num(&self) -> u32 {
        self.config.tool_num
    }

    #[inline]
    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    #[inline]
    pub fn channel(&self) -> Option<OutputChannel> {
        self.channel
    }

    #[inline]
    pub fn table(&self) -> Option<&CalibrationTable> {
        self.table.as_ref()
    }

    #[inline]
    pub fn faults(&self) -> ToolFault {
        self.faults
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.faults.is_usable()
    }

    /// Shared `{state, speed}` cell for status readers.
    pub fn status_cell(&self) -> Arc<ToolStatusCell> {
        Arc::clone(&self.status)
    }

    #[inline]
    pub fn state(&self) -> SpindleState {
        self.status.state()
    }

    #[inline]
    pub fn raw_speed(&self) -> u32 {
        self.status.raw_speed()
    }

    #[inline]
    pub fn report_speed(&self) -> u32 {
        self.status.report_speed()
    }

    #[inline]
    pub fn max_raw_output(&self) -> u32 {
        self.governor.max_raw_output()
    }

    /// Lasers scale power with feed rate downstream.
    #[inline]
    pub fn is_rate_adjusted(&self) -> bool {
        self.config.kind.is_rate_adjusted()
    }

    /// Startup description of the output stage.
    pub fn config_message(&self) -> String {
        match self.channel {
            Some(ch) => format!(
                "{} spindle {} Output:ch{} Freq:{}Hz Res:{}bits",
                self.config.kind.label(),
                self.config.name,
                ch.id,
                self.config.pwm_hz,
                ch.precision_bits
            ),
            None => format!(
                "{} spindle {} Output:none",
                self.config.kind.label(),
                self.config.name
            ),
        }
    }

    pub fn status(&self, active: bool) -> ToolStatus {
        let (state, raw_speed) = self.status.load();
        ToolStatus {
            name: self.config.name.clone(),
            tool_num: self.config.tool_num,
            kind: self.config.kind,
            state,
            raw_speed,
            report_speed: self.status.report_speed(),
            channel: self.channel.map(|c| c.id),
            precision_bits: self.channel.map_or(0, |c| c.precision_bits),
            max_raw_output: self.max_raw_output(),
            rate_adjusted: self.is_rate_adjusted(),
            faults: self.faults.names(),
            active,
        }
    }

    // ─── Commands ───────────────────────────────────────────────────

    /// Map `requested` through the override and the calibration table.
    ///
    /// Records the overridden speed as the report speed. Returns 0 when the
    /// tool has no table.
    pub fn map_speed(&self, requested: u32) -> u32 {
        let effective = effective_speed(requested, self.realtime.spindle_override());
        self.status.set_report_speed(effective);
        self.table.as_ref().map_or(0, |t| t.map(effective))
    }

    /// Drive the tool to `target` at `speed` and wait out the ramp.
    ///
    /// # Errors
    /// - `Aborted` while the abort flag is set (no outputs touched)
    /// - `InvalidTransition` for an `Unknown` target
    /// - the tool's fault error when it is unusable
    /// - `Driver` when a write fails; the tool is then parked if possible
    pub fn set_state(
        &mut self,
        target: SpindleState,
        speed: u32,
        delay: &mut dyn RampDelay,
    ) -> Result<RampPlan, SpindleError> {
        if self.realtime.is_aborted() {
            return Err(SpindleError::Aborted);
        }
        if target == SpindleState::Unknown {
            return Err(SpindleError::InvalidTransition(
                "Unknown is not a valid target state".to_string(),
            ));
        }
        if let Some(err) = self.faults.to_error(&self.config.name) {
            return Err(err);
        }

        let mapped = self.map_speed(speed);
        let (duty, commit_speed) = match target {
            SpindleState::Disabled => {
                self.status.set_report_speed(0);
                let off = self.table.as_ref().map_or(0, |t| t.off_code());
                let duty = if self.config.zero_speed_with_disable { off } else { mapped };
                (duty, 0)
            }
            _ => (self.output_code(mapped), mapped),
        };
        let ramp = self.governor.plan_to(target, commit_speed)?;

        if let Err(e) = self.drive_outputs(target, duty) {
            if let Err(park_err) = self.park(delay) {
                error!(tool = %self.config.name, "spindle could not be parked: {park_err}");
            }
            return Err(e);
        }

        self.governor.complete(&ramp, target, commit_speed, delay);
        self.realtime.request_report();
        debug!(tool = %self.config.name, state = %target, duty, "spindle state set");
        Ok(ramp)
    }

    /// `set_state(Disabled, 0)`.
    pub fn stop(&mut self, delay: &mut dyn RampDelay) -> Result<RampPlan, SpindleError> {
        self.set_state(SpindleState::Disabled, 0, delay)
    }

    /// Force the outputs off and commit `Disabled`, whatever the faults.
    ///
    /// Every output is written even when an earlier write fails. The
    /// spin-down is waited when the governor can still plan it; a tool
    /// without ramp timing or output range is committed at once.
    ///
    /// # Errors
    /// `Aborted` while the abort flag is set, or the first failed write.
    /// The committed state is left as it was on error.
    pub fn park(&mut self, delay: &mut dyn RampDelay) -> Result<RampPlan, SpindleError> {
        if self.realtime.is_aborted() {
            return Err(SpindleError::Aborted);
        }
        self.park_outputs()?;
        self.status.set_report_speed(0);

        let ramp = self
            .governor
            .plan_to(SpindleState::Disabled, 0)
            .unwrap_or_default();
        self.governor.complete(&ramp, SpindleState::Disabled, 0, delay);
        self.realtime.request_report();
        warn!(tool = %self.config.name, faults = ?self.faults, "spindle parked");
        Ok(ramp)
    }

    /// [`stop`](Self::stop) a usable tool, [`park`](Self::park) a faulted one.
    pub fn shut_down(&mut self, delay: &mut dyn RampDelay) -> Result<RampPlan, SpindleError> {
        if self.is_usable() {
            self.stop(delay)
        } else {
            self.park(delay)
        }
    }

    /// Replace the configuration and rebuild.
    ///
    /// A rotating tool is stopped first. A new `pwm_hz` re-sizes the channel
    /// and re-attaches the driver.
    ///
    /// # Errors
    /// The tool's fault error if it is unusable after the rebuild.
    pub fn reconfigure(
        &mut self,
        config: ToolConfig,
        delay: &mut dyn RampDelay,
    ) -> Result<(), SpindleError> {
        if self.state().is_rotating() {
            self.shut_down(delay)?;
        }
        let frequency_changed = config.pwm_hz != self.config.pwm_hz;
        self.config = config;

        if frequency_changed {
            self.faults.remove(ToolFault::DRIVER);
            self.attach();
        }
        self.rebuild();

        match self.faults.to_error(&self.config.name) {
            Some(err) => {
                self.status.commit(SpindleState::Disabled, 0);
                Err(err)
            }
            None => {
                info!("{}", self.config_message());
                Ok(())
            }
        }
    }

    /// Change the output range and rebuild the calibration table.
    ///
    /// # Errors
    /// `Configuration` when `max_raw_output` is zero or above what the
    /// channel resolves (range kept), otherwise the tool's fault error
    /// after the rebuild.
    pub fn set_output_range(&mut self, max_raw_output: u32) -> Result<(), SpindleError> {
        let limit = self.channel.map_or(0, |c| c.max_duty());
        if max_raw_output == 0 || max_raw_output > limit {
            error!(
                tool = %self.config.name,
                max_raw_output,
                limit,
                "output range rejected"
            );
            return Err(SpindleError::Configuration(format!(
                "{}: output range {max_raw_output} outside 1..={limit}",
                self.config.name
            )));
        }
        self.governor.set_max_raw_output(max_raw_output);
        self.rebuild_table(max_raw_output);
        match self.faults.to_error(&self.config.name) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ─── Internals ──────────────────────────────────────────────────

    /// Code actually written for a rotating tool.
    fn output_code(&self, mapped: u32) -> u32 {
        match self.config.kind {
            ToolKind::OnOff if mapped > 0 => self.max_raw_output(),
            ToolKind::OnOff => 0,
            _ => mapped,
        }
    }

    /// Direction, duty, then enable for `target`.
    fn drive_outputs(&mut self, target: SpindleState, duty: u32) -> Result<(), SpindleError> {
        if target.is_rotating() && self.config.is_reversible() {
            let direction = if target == SpindleState::RotatingForward {
                DirectionSignal::Forward
            } else {
                DirectionSignal::Reverse
            };
            self.write(|d| d.write_direction(direction))?;
        }
        self.write_duty(duty)?;

        let mut enable = target.is_rotating();
        if self.config.disable_with_zero_speed && self.status.report_speed() == 0 {
            enable = false;
        }
        self.write(|d| d.write_enable(enable))?;
        if !enable && self.config.kind == ToolKind::TenVolt {
            self.write(|d| d.write_direction(DirectionSignal::Off))?;
        }
        Ok(())
    }

    fn attach(&mut self) {
        let Some(mut channel) = self.channel else {
            return;
        };
        channel.precision_bits = compute_precision(self.config.pwm_hz, self.clock_hz);
        self.channel = Some(channel);
        self.last_duty = None;

        if self.config.pwm_hz == 0 {
            return;
        }
        if let Err(e) = self.driver.attach(channel, self.config.pwm_hz) {
            error!(tool = %self.config.name, "output attach failed: {e}");
            self.faults |= ToolFault::DRIVER;
        }
    }

    /// Recompute range, table and ramp timing from the current config.
    fn rebuild(&mut self) {
        self.faults.remove(ToolFault::CONFIGURATION_MASK);

        let max_raw_output = self.channel.map_or(0, |c| c.max_duty());
        if self.channel.is_some() && (self.config.pwm_hz == 0 || max_raw_output == 0) {
            error!(
                tool = %self.config.name,
                pwm_hz = self.config.pwm_hz,
                "output frequency gives no duty resolution"
            );
            self.faults |= ToolFault::OUTPUT_RANGE;
        }
        self.governor.set_max_raw_output(max_raw_output);
        if max_raw_output > 0 {
            self.rebuild_table(max_raw_output);
        } else {
            self.table = None;
        }

        let timing = RampTiming::new(self.config.spinup_ms, self.config.spindown_ms);
        match timing.validate() {
            Ok(()) => self.governor.set_timing(Some(timing)),
            Err(e) => {
                error!(tool = %self.config.name, "ramp timing rejected (max {RAMP_MS_MAX} ms): {e}");
                self.faults |= ToolFault::RAMP_TIMING;
                self.governor.set_timing(None);
            }
        }
    }

    fn rebuild_table(&mut self, max_raw_output: u32) {
        self.faults.remove(ToolFault::CALIBRATION);
        let built = if self.config.speed_map.is_empty() {
            synthesize_default_table(self.config.min_speed, self.config.effective_max_speed())
                .and_then(|points| build_table(&points, max_raw_output))
        } else {
            build_table(self.config.speed_map.points(), max_raw_output)
        };
        match built {
            Ok(table) => self.table = Some(table),
            Err(e) => {
                error!(tool = %self.config.name, "tool disabled: {e}");
                self.faults |= ToolFault::CALIBRATION;
                self.table = None;
            }
        }
    }

    fn write_idle(&mut self) {
        if let Err(e) = self.park_outputs() {
            warn!(tool = %self.config.name, "could not park outputs: {e}");
        }
    }

    /// Off code, enable low, direction lines low. All three are attempted;
    /// the first failure is returned.
    fn park_outputs(&mut self) -> Result<(), SpindleError> {
        let off = self.table.as_ref().map_or(0, |t| t.off_code());
        let duty = self.write_duty(off);
        let enable = self.write(|d| d.write_enable(false));
        let direction = self.write(|d| d.write_direction(DirectionSignal::Off));
        duty.and(enable).and(direction)
    }

    fn write_duty(&mut self, duty: u32) -> Result<(), SpindleError> {
        if self.last_duty == Some(duty) {
            return Ok(());
        }
        self.write(|d| d.write_duty(duty))?;
        self.last_duty = Some(duty);
        Ok(())
    }

    fn write<F>(&mut self, op: F) -> Result<(), SpindleError>
    where
        F: FnOnce(&mut dyn SpindleDriver) -> Result<(), HalError>,
    {
        op(self.driver.as_mut()).map_err(|e| {
            error!(tool = %self.config.name, "output write failed: {e}");
            self.faults |= ToolFault::DRIVER;
            SpindleError::Driver(e.to_string())
        })
    }
}

impl std::fmt::Debug for SpindleTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpindleTool")
            .field("name", &self.config.name)
            .field("kind", &self.config.kind)
            .field("channel", &self.channel)
            .field("state", &self.state())
            .field("faults", &self.faults)
            .finish()
    }
}
