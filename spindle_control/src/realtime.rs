//! Real-time state shared between the command path and the status path.
//!
//! Holds the spindle speed override, the abort flag and the "report now"
//! request. Everything is atomic; share it as `Arc<RealtimeState>`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use spindle_common::consts::{SPINDLE_OVERRIDE_DEFAULT, SPINDLE_OVERRIDE_MAX, SPINDLE_OVERRIDE_MIN};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct RealtimeState {
    spindle_override: AtomicU32,
    abort: AtomicBool,
    report_pending: AtomicBool,
}

impl RealtimeState {
    pub const fn new() -> Self {
        Self {
            spindle_override: AtomicU32::new(SPINDLE_OVERRIDE_DEFAULT),
            abort: AtomicBool::new(false),
            report_pending: AtomicBool::new(false),
        }
    }

    /// Spindle speed override [%].
    #[inline]
    pub fn spindle_override(&self) -> u32 {
        self.spindle_override.load(Ordering::Acquire)
    }

    /// Set the override, clamped to `SPINDLE_OVERRIDE_MIN..=SPINDLE_OVERRIDE_MAX`.
    /// Returns the value applied.
    pub fn set_spindle_override(&self, percent: u32) -> u32 {
        let applied = percent.clamp(SPINDLE_OVERRIDE_MIN, SPINDLE_OVERRIDE_MAX);
        if applied != percent {
            warn!(requested = percent, applied, "spindle override clamped");
        }
        self.spindle_override.store(applied, Ordering::Release);
        applied
    }

    pub fn request_abort(&self) {
        debug!("abort requested");
        self.abort.store(true, Ordering::Release);
    }

    pub fn clear_abort(&self) {
        self.abort.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Ask the status path to report on its next pass.
    #[inline]
    pub fn request_report(&self) {
        self.report_pending.store(true, Ordering::Release);
    }

    /// Consume a pending report request.
    #[inline]
    pub fn take_report_request(&self) -> bool {
        self.report_pending.swap(false, Ordering::AcqRel)
    }
}

impl Default for RealtimeState {
    fn default() -> Self {
        Self::new()
    }
}
