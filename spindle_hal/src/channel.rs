//! PWM channel pool.
//!
//! The output peripheral has a fixed number of duty-cycle channels sharing
//! timers in pairs (0/1, 2/3, ...). Channel 0 and its pair partner are
//! reserved for the primary spindle, so general allocation starts at the
//! reserved offset. Allocation is monotonic: channels live as long as the
//! process and there is no release path.
//!
//! The allocator is lock-free (`AtomicU8::fetch_update`) so concurrent
//! initialization code can draw channels without coordination.

use std::sync::atomic::{AtomicU8, Ordering};

use spindle_common::consts::{
    PWM_CHANNEL_COUNT, PWM_MAX_PRECISION_BITS, PWM_PRIMARY_CHANNEL, PWM_RESERVED_CHANNELS,
};
use spindle_common::hal::types::OutputChannel;
use spindle_common::spindle::error::SpindleError;
use tracing::{debug, error};

/// Monotonic allocator over a fixed channel pool.
#[derive(Debug)]
pub struct OutputChannelAllocator {
    next: AtomicU8,
    capacity: u8,
    reserved: u8,
}

impl OutputChannelAllocator {
    /// Create a pool of `capacity` channels whose first `reserved` channels
    /// are kept for the primary tool.
    pub const fn new(capacity: u8, reserved: u8) -> Self {
        Self {
            next: AtomicU8::new(reserved),
            capacity,
            reserved,
        }
    }

    /// Total channels in the pool, reserved ones included.
    #[inline]
    pub const fn capacity(&self) -> u8 {
        self.capacity
    }

    /// Channels still available to `allocate()`.
    pub fn remaining(&self) -> u8 {
        self.capacity
            .saturating_sub(self.next.load(Ordering::Acquire).max(self.reserved))
    }

    /// Channel of the primary tool. Always available, never counted.
    #[inline]
    pub const fn primary(&self) -> u8 {
        PWM_PRIMARY_CHANNEL
    }

    /// Hand out the next unused channel.
    ///
    /// # Errors
    /// `SpindleError::ResourceExhausted` once every non-reserved channel is
    /// taken. The pool stays exhausted for the life of the process.
    pub fn allocate(&self) -> Result<u8, SpindleError> {
        let capacity = self.capacity;
        match self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            }) {
            Ok(id) => {
                debug!(channel = id, "PWM channel allocated");
                Ok(id)
            }
            Err(_) => {
                error!("Error: out of PWM channels ({capacity} in pool)");
                Err(SpindleError::ResourceExhausted { capacity })
            }
        }
    }

    /// Allocate a channel and size its resolution for `frequency_hz`.
    pub fn allocate_output(
        &self,
        frequency_hz: u32,
        clock_hz: u32,
    ) -> Result<OutputChannel, SpindleError> {
        let id = self.allocate()?;
        Ok(OutputChannel {
            id,
            precision_bits: compute_precision(frequency_hz, clock_hz),
        })
    }

    /// The primary channel sized for `frequency_hz`.
    pub fn primary_output(&self, frequency_hz: u32, clock_hz: u32) -> OutputChannel {
        OutputChannel {
            id: self.primary(),
            precision_bits: compute_precision(frequency_hz, clock_hz),
        }
    }
}

impl Default for OutputChannelAllocator {
    fn default() -> Self {
        Self::new(PWM_CHANNEL_COUNT, PWM_RESERVED_CHANNELS)
    }
}

/// Process-wide channel pool.
static PWM_CHANNELS: OutputChannelAllocator =
    OutputChannelAllocator::new(PWM_CHANNEL_COUNT, PWM_RESERVED_CHANNELS);

/// Allocate from the process-wide pool.
pub fn allocate_channel() -> Result<u8, SpindleError> {
    PWM_CHANNELS.allocate()
}

/// The process-wide pool itself.
pub fn global_allocator() -> &'static OutputChannelAllocator {
    &PWM_CHANNELS
}

/// Highest duty resolution achievable at `frequency_hz` [bits].
///
/// Finds the largest `precision` with `(1 << precision) < clock_hz / frequency_hz`,
/// stopping past `PWM_MAX_PRECISION_BITS`, and returns one less. Higher
/// frequencies trade away resolution; a frequency of 0 or one above the
/// clock yields 0 bits.
pub fn compute_precision(frequency_hz: u32, clock_hz: u32) -> u8 {
    if frequency_hz == 0 {
        return 0;
    }
    let period = clock_hz / frequency_hz;

    let mut precision: u8 = 0;
    while (1u32 << precision) < period && precision <= PWM_MAX_PRECISION_BITS {
        precision += 1;
    }
    precision.saturating_sub(1)
}
