//! Error handling for the scheduler lifecycle and platform setup.
//!
//! Only configuration and lifecycle misuse is reported. Runtime corruption
//! (stack overflow, a mangled frame, reentrant use of the switch handler) is
//! not detectable from inside the hot path and stays undefined behaviour.

#![allow(clippy::uninlined_format_args)]

use core::fmt;

/// Result type for scheduler operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Top-level error type for scheduler operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// Lifecycle and thread table errors
    Schedule(ScheduleError),
    /// Tick source configuration errors
    Timer(TimerError),
}

/// Errors raised by the lifecycle operations and the stack initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// `start` was called before `init`
    NotInitialized,
    /// `init` was called a second time
    AlreadyInitialized,
    /// `start` was called a second time
    AlreadyRunning,
    /// Thread index outside the thread table
    InvalidThread(usize),
    /// Stack initializer called on a thread that is not in STANDBY
    NotStandby(usize),
    /// A quantum of zero ticks
    InvalidQuantum,
}

/// Errors raised while configuring the periodic tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// Zero period or otherwise unusable configuration
    InvalidConfig,
    /// The tick hardware cannot represent this period (microseconds)
    UnsupportedPeriod(u32),
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::Schedule(e) => write!(f, "Scheduling error: {}", e),
            ThreadError::Timer(e) => write!(f, "Timer error: {}", e),
        }
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::NotInitialized => write!(f, "Scheduler not initialized"),
            ScheduleError::AlreadyInitialized => write!(f, "Scheduler already initialized"),
            ScheduleError::AlreadyRunning => write!(f, "Scheduler already running"),
            ScheduleError::InvalidThread(id) => write!(f, "Invalid thread index: {}", id),
            ScheduleError::NotStandby(id) => write!(f, "Thread {} is not in standby", id),
            ScheduleError::InvalidQuantum => write!(f, "Quantum must be at least one tick"),
        }
    }
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::InvalidConfig => write!(f, "Invalid timer configuration"),
            TimerError::UnsupportedPeriod(us) => write!(f, "Unsupported tick period: {}us", us),
        }
    }
}

impl From<ScheduleError> for ThreadError {
    fn from(error: ScheduleError) -> Self {
        ThreadError::Schedule(error)
    }
}

impl From<TimerError> for ThreadError {
    fn from(error: TimerError) -> Self {
        ThreadError::Timer(error)
    }
}
