//! Per-tool status cell and status snapshot.
//!
//! The governor is the only writer of `{state, raw speed}`. Readers on a
//! status context load both with a single atomic read, so they never see the
//! state of one transition paired with the speed of another.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::Serialize;
use spindle_common::spindle::config::ToolKind;
use spindle_common::spindle::state::SpindleState;
use static_assertions::const_assert_eq;

const STATE_SHIFT: u32 = 32;

const_assert_eq!(core::mem::size_of::<SpindleState>(), 1);

#[inline]
const fn pack(state: SpindleState, raw_speed: u32) -> u64 {
    ((state as u64) << STATE_SHIFT) | raw_speed as u64
}

#[inline]
fn unpack(word: u64) -> (SpindleState, u32) {
    let state = SpindleState::from_u8((word >> STATE_SHIFT) as u8).unwrap_or_default();
    (state, word as u32)
}

/// Shared `{state, raw speed}` word plus the reportable speed.
#[derive(Debug)]
pub struct ToolStatusCell {
    word: AtomicU64,
    report_speed: AtomicU32,
}

impl ToolStatusCell {
    /// Fresh cell: `Unknown`, speed 0.
    pub const fn new() -> Self {
        Self {
            word: AtomicU64::new(pack(SpindleState::Unknown, 0)),
            report_speed: AtomicU32::new(0),
        }
    }

    /// Current `{state, raw speed}` pair.
    #[inline]
    pub fn load(&self) -> (SpindleState, u32) {
        unpack(self.word.load(Ordering::Acquire))
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> SpindleState {
        self.load().0
    }

    /// Current raw output code.
    #[inline]
    pub fn raw_speed(&self) -> u32 {
        self.load().1
    }

    /// Publish a completed transition.
    #[inline]
    pub(crate) fn commit(&self, state: SpindleState, raw_speed: u32) {
        self.word.store(pack(state, raw_speed), Ordering::Release);
    }

    /// Speed after override, as last requested.
    #[inline]
    pub fn report_speed(&self) -> u32 {
        self.report_speed.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_report_speed(&self, speed: u32) {
        self.report_speed.store(speed, Ordering::Release);
    }
}

impl Default for ToolStatusCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub tool_num: u32,
    pub kind: ToolKind,
    pub state: SpindleState,
    pub raw_speed: u32,
    pub report_speed: u32,
    pub channel: Option<u8>,
    pub precision_bits: u8,
    pub max_raw_output: u32,
    pub rate_adjusted: bool,
    pub faults: Vec<&'static str>,
    pub active: bool,
}
