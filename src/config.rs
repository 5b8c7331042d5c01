//! Compile-time sizing and runtime scheduling parameters.

use crate::errors::{ScheduleError, ThreadResult, TimerError};
use crate::thread::frame::FRAME_WORDS;

/// Number of threads in the reference configuration.
pub const DEFAULT_THREAD_COUNT: usize = 3;

/// Words of stack reserved per thread in the reference configuration.
pub const DEFAULT_STACK_WORDS: usize = 128;

/// Smallest stack that holds one full frame plus 8-byte alignment slack.
pub const MIN_STACK_WORDS: usize = FRAME_WORDS + 2;

/// Ticks a thread runs before a switch is requested.
pub const DEFAULT_QUANTUM_TICKS: u32 = 5;

/// Period of the tick interrupt (1 kHz).
pub const DEFAULT_TICK_PERIOD_US: u32 = 1_000;

/// Lowest configurable exception priority. Only the implemented upper
/// bits are kept by the NVIC, so 0xFF is the lowest on every part.
pub const LOWEST_SWITCH_PRIORITY: u8 = 0xFF;

/// Runtime parameters handed to [`Kernel::start`](crate::Kernel::start).
///
/// ```ignore
/// let config = SchedulerConfig::new()
///     .quantum_ticks(10)
///     .tick_period_us(500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Ticks per scheduling quantum
    pub quantum_ticks: u32,
    /// Tick period in microseconds
    pub tick_period_us: u32,
    /// Priority written for the switch exception
    pub switch_priority: u8,
}

impl SchedulerConfig {
    /// Reference configuration: 5 ticks of 1 ms, switch at lowest priority.
    pub const fn new() -> Self {
        Self {
            quantum_ticks: DEFAULT_QUANTUM_TICKS,
            tick_period_us: DEFAULT_TICK_PERIOD_US,
            switch_priority: LOWEST_SWITCH_PRIORITY,
        }
    }

    pub const fn quantum_ticks(mut self, ticks: u32) -> Self {
        self.quantum_ticks = ticks;
        self
    }

    pub const fn tick_period_us(mut self, period_us: u32) -> Self {
        self.tick_period_us = period_us;
        self
    }

    pub const fn switch_priority(mut self, priority: u8) -> Self {
        self.switch_priority = priority;
        self
    }

    /// Reject parameters that can never produce a working schedule.
    pub fn validate(&self) -> ThreadResult<()> {
        if self.quantum_ticks == 0 {
            return Err(ScheduleError::InvalidQuantum.into());
        }
        if self.tick_period_us == 0 {
            return Err(TimerError::InvalidConfig.into());
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}
