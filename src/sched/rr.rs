//! Round-robin next-thread selection.

/// Strict round robin over a fixed population.
///
/// Every quantum advances exactly one slot, whatever the candidate's run
/// state. All threads are built before the scheduler starts, so a
/// STANDBY candidate cannot occur in a correctly started system.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinScheduler;

impl RoundRobinScheduler {
    /// Index of the thread that runs after `current`.
    #[inline]
    pub const fn next_thread(current: usize, thread_count: usize) -> usize {
        (current + 1) % thread_count
    }
}
