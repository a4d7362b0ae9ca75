//! Transition governor: ramp delays between spindle states.
//!
//! The governor owns a tool's `{state, raw speed}`. A transition is planned
//! from the cost matrix below, the caller's delay source waits out the
//! spin-down part and then the spin-up part, and only then is the new pair
//! committed to the shared [`ToolStatusCell`].
//!
//! | current → target          | down                 | up                  |
//! |---------------------------|----------------------|---------------------|
//! | Unknown → any             | max output           | target if rotating  |
//! | Disabled → Disabled       | 0                    | 0                   |
//! | Disabled → rotating       | 0                    | target              |
//! | rotating → Disabled       | current              | 0                   |
//! | same direction            | current − target if slower | target − current if faster |
//! | opposite direction        | current              | target              |
//!
//! Delays are `spindown_ms * down / max_raw_output` and
//! `spinup_ms * up / max_raw_output`. Speeds are raw output codes.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use spindle_common::spindle::config::RAMP_MS_MAX;
use spindle_common::spindle::error::SpindleError;
use spindle_common::spindle::state::SpindleState;
use tracing::debug;

use crate::status::ToolStatusCell;

// ─── Ramp Timing ────────────────────────────────────────────────────

/// Full-scale ramp times of one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RampTiming {
    /// Stop → full output [ms].
    pub spinup_ms: u32,
    /// Full output → stop [ms].
    pub spindown_ms: u32,
}

impl RampTiming {
    pub const fn new(spinup_ms: u32, spindown_ms: u32) -> Self {
        Self {
            spinup_ms,
            spindown_ms,
        }
    }

    /// # Errors
    /// `SpindleError::Configuration` if either time exceeds `RAMP_MS_MAX`.
    pub fn validate(&self) -> Result<(), SpindleError> {
        for (label, ms) in [("spinup_ms", self.spinup_ms), ("spindown_ms", self.spindown_ms)] {
            if ms > RAMP_MS_MAX {
                return Err(SpindleError::Configuration(format!(
                    "{label} {ms} exceeds {RAMP_MS_MAX}"
                )));
            }
        }
        Ok(())
    }
}

// ─── Ramp Plan ──────────────────────────────────────────────────────

/// Computed cost of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RampPlan {
    /// Raw codes to ramp down by.
    pub down: u32,
    /// Raw codes to ramp up by.
    pub up: u32,
    /// Wait before the spin-up wait.
    pub down_delay: Duration,
    /// Wait after the spin-down wait.
    pub up_delay: Duration,
}

impl RampPlan {
    #[inline]
    pub fn is_instant(&self) -> bool {
        self.down_delay.is_zero() && self.up_delay.is_zero()
    }

    #[inline]
    pub fn total(&self) -> Duration {
        self.down_delay + self.up_delay
    }
}

/// Plan the transition `current → target`.
///
/// # Errors
/// - `InvalidTransition` if `target` is `Unknown`
/// - `Configuration` if `max_raw_output` is zero
pub fn plan(
    current: SpindleState,
    current_speed: u32,
    target: SpindleState,
    target_speed: u32,
    timing: RampTiming,
    max_raw_output: u32,
) -> Result<RampPlan, SpindleError> {
    use SpindleState::*;

    if target == Unknown {
        return Err(SpindleError::InvalidTransition(
            "Unknown is not a valid target state".to_string(),
        ));
    }
    if max_raw_output == 0 {
        return Err(SpindleError::Configuration(
            "output range is zero".to_string(),
        ));
    }

    let current_speed = current_speed.min(max_raw_output);
    let target_speed = target_speed.min(max_raw_output);

    let (down, up) = match (current, target) {
        (Unknown, t) => (max_raw_output, if t.is_rotating() { target_speed } else { 0 }),
        (Disabled, Disabled) => (0, 0),
        (Disabled, _) => (0, target_speed),
        (_, Disabled) => (current_speed, 0),
        (c, t) if c == t => {
            if target_speed > current_speed {
                (0, target_speed - current_speed)
            } else {
                (current_speed - target_speed, 0)
            }
        }
        _ => (current_speed, target_speed),
    };

    Ok(RampPlan {
        down,
        up,
        down_delay: scaled_delay(timing.spindown_ms, down, max_raw_output),
        up_delay: scaled_delay(timing.spinup_ms, up, max_raw_output),
    })
}

#[inline]
fn scaled_delay(full_scale_ms: u32, codes: u32, max_raw_output: u32) -> Duration {
    let ms = u64::from(full_scale_ms) * u64::from(codes) / u64::from(max_raw_output);
    Duration::from_millis(ms)
}

// ─── Delay Sources ──────────────────────────────────────────────────

/// How the calling thread waits out a ramp.
pub trait RampDelay: Send {
    fn wait(&mut self, duration: Duration);
}

/// Blocks the calling thread with `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingDelay;

impl RampDelay for BlockingDelay {
    fn wait(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Records waits instead of sleeping. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-zero waits, in order.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.waits.lock().iter().sum()
    }

    pub fn clear(&self) {
        self.waits.lock().clear();
    }
}

impl RampDelay for RecordingDelay {
    fn wait(&mut self, duration: Duration) {
        if !duration.is_zero() {
            self.waits.lock().push(duration);
        }
    }
}

// ─── Governor ───────────────────────────────────────────────────────

/// Owns one tool's state and speed.
#[derive(Debug)]
pub struct TransitionGovernor {
    status: Arc<ToolStatusCell>,
    timing: Option<RampTiming>,
    max_raw_output: u32,
}

impl TransitionGovernor {
    pub fn new(
        status: Arc<ToolStatusCell>,
        timing: Option<RampTiming>,
        max_raw_output: u32,
    ) -> Self {
        Self {
            status,
            timing,
            max_raw_output,
        }
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
    pub fn timing(&self) -> Option<RampTiming> {
        self.timing
    }

    #[inline]
    pub fn max_raw_output(&self) -> u32 {
        self.max_raw_output
    }

    pub(crate) fn set_timing(&mut self, timing: Option<RampTiming>) {
        self.timing = timing;
    }

    pub(crate) fn set_max_raw_output(&mut self, max_raw_output: u32) {
        self.max_raw_output = max_raw_output;
    }

    /// Plan a transition from the committed state without side effects.
    ///
    /// # Errors
    /// `Configuration` if ramp timing is undefined, plus everything [`plan`]
    /// rejects.
    pub fn plan_to(&self, target: SpindleState, speed: u32) -> Result<RampPlan, SpindleError> {
        let timing = self.timing.ok_or_else(|| {
            SpindleError::Configuration("ramp timing undefined".to_string())
        })?;
        let (current, current_speed) = self.status.load();
        plan(current, current_speed, target, speed, timing, self.max_raw_output)
    }

    /// Wait out `ramp` and publish `{target, speed}`.
    ///
    /// Spin-down is waited before spin-up. Blocks the caller for
    /// `ramp.total()`; there is no cancellation.
    pub fn complete(
        &mut self,
        ramp: &RampPlan,
        target: SpindleState,
        speed: u32,
        delay: &mut dyn RampDelay,
    ) {
        delay.wait(ramp.down_delay);
        delay.wait(ramp.up_delay);
        self.status.commit(target, speed);
    }

    /// [`plan_to`](Self::plan_to) followed by [`complete`](Self::complete).
    pub fn transition(
        &mut self,
        target: SpindleState,
        speed: u32,
        delay: &mut dyn RampDelay,
    ) -> Result<RampPlan, SpindleError> {
        let ramp = self.plan_to(target, speed)?;
        debug!(
            from = %self.state(),
            to = %target,
            down = ramp.down,
            up = ramp.up,
            down_ms = ramp.down_delay.as_millis() as u64,
            up_ms = ramp.up_delay.as_millis() as u64,
            "spindle ramp"
        );
        self.complete(&ramp, target, speed, delay);
        Ok(ramp)
    }
}
