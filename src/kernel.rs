//! Scheduler core: lifecycle, tick handler and switch handler.
//!
//! One [`Kernel`] exists per core. Its state moves
//! UNINITIALIZED -> INITIALIZED -> RUNNING and never back, except that a
//! failed tick setup leaves it INITIALIZED. The tick
//! handler counts ticks and, once per quantum, records the next thread and
//! pends the switch exception. The switch handler, running at the lowest
//! priority, saves the outgoing context and restores the incoming one.
//!
//! The two handlers never overlap on a single core: the switch exception
//! sits below the tick in priority, and the tick handler finishes its
//! write of `next` before it sets the pending bit. Thread bodies never
//! touch their own TCB. Nothing here needs a lock.

use crate::arch::{ContextSwitch, Platform, SwitchTrigger};
use crate::config::{SchedulerConfig, DEFAULT_STACK_WORDS, MIN_STACK_WORDS};
use crate::diag_println;
use crate::errors::{ScheduleError, ThreadResult};
use crate::sched::RoundRobinScheduler;
use crate::thread::stack::init_thread_stack;
use crate::thread::{ThreadSpec, ThreadState, ThreadTable};
use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};

/// The scheduler instance the free-standing exception handlers dispatch to.
static GLOBAL_KERNEL: spin::Once<&'static dyn Dispatch> = spin::Once::new();

/// Lifecycle of the scheduler as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Uninitialized = 0,
    Initialized = 1,
    Running = 2,
}

impl SchedulerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => SchedulerState::Initialized,
            2 => SchedulerState::Running,
            _ => SchedulerState::Uninitialized,
        }
    }
}

/// Fixed-population preemptive round-robin scheduler.
///
/// # Type Parameters
///
/// * `N` - Number of threads
/// * `W` - Stack words reserved per thread
///
/// # Example
///
/// ```ignore
/// static KERNEL: Kernel<3> = Kernel::new([
///     ThreadSpec::new("A", thread_a),
///     ThreadSpec::new("B", thread_b),
///     ThreadSpec::new("C", thread_c),
/// ]);
/// ```
pub struct Kernel<const N: usize, const W: usize = DEFAULT_STACK_WORDS> {
    table: ThreadTable<N, W>,
    /// Index of the thread on the core (or about to be, before bootstrap)
    current: AtomicUsize,
    /// Published by the tick handler, consumed by the switch handler
    next: AtomicUsize,
    ticks: AtomicU32,
    quantum: AtomicU32,
    /// Set by the first switch; there is nothing to save before it
    bootstrapped: AtomicBool,
    lifecycle: AtomicU8,
}

impl<const N: usize, const W: usize> Kernel<N, W> {
    /// Build the thread table, one slot per spec, all in STANDBY.
    pub const fn new(specs: [ThreadSpec; N]) -> Self {
        assert!(N > 0, "at least one thread is required");
        assert!(W >= MIN_STACK_WORDS, "thread stack cannot hold a full frame");

        Self {
            table: ThreadTable::new(specs),
            current: AtomicUsize::new(0),
            next: AtomicUsize::new(0),
            ticks: AtomicU32::new(0),
            quantum: AtomicU32::new(SchedulerConfig::new().quantum_ticks),
            bootstrapped: AtomicBool::new(false),
            lifecycle: AtomicU8::new(SchedulerState::Uninitialized as u8),
        }
    }

    /// One-time setup: process stack split, counters, every thread's stack.
    ///
    /// Leaves every thread READY. Must run after board bring-up and before
    /// [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// [`ScheduleError::AlreadyInitialized`] on a second call.
    pub fn init<P: Platform + ?Sized>(&self, platform: &mut P) -> ThreadResult<()> {
        if self
            .lifecycle
            .compare_exchange(
                SchedulerState::Uninitialized as u8,
                SchedulerState::Initialized as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(ScheduleError::AlreadyInitialized.into());
        }

        platform.prepare_process_stack();

        self.ticks.store(0, Ordering::Relaxed);
        self.current.store(0, Ordering::Relaxed);
        self.next.store(0, Ordering::Relaxed);
        self.bootstrapped.store(false, Ordering::Release);

        if let Some(sink) = platform.diagnostics() {
            diag_println!(
                &mut *sink,
                "[sched] init: {} threads, {} stack words each",
                self.table.len(),
                W
            );
        }

        for id in 0..N {
            self.init_thread_stack(id)?;
            let tcb = self.table.tcb(id);
            tcb.set_state(ThreadState::Ready);

            if let Some(sink) = platform.diagnostics() {
                diag_println!(
                    &mut *sink,
                    "[sched] thread {} '{}' sp={:#010x}",
                    id,
                    tcb.name(),
                    tcb.stack_pointer() as usize
                );
            }
        }

        Ok(())
    }

    /// Build the initial frame for one thread.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::InvalidThread`] if `id` is out of range
    /// - [`ScheduleError::NotStandby`] if the thread is not in STANDBY or
    ///   its stack was already built
    pub(crate) fn init_thread_stack(&self, id: usize) -> ThreadResult<()> {
        let tcb = self.table.get(id).ok_or(ScheduleError::InvalidThread(id))?;
        init_thread_stack(id, tcb)?;
        Ok(())
    }

    /// Configure the switch exception and the tick, then force the first
    /// switch so the first thread runs without waiting for a quantum.
    ///
    /// Everything else happens before the tick is armed, and the first
    /// switch is pended right after it. Ticks landing in between are
    /// ignored until that switch has run, so thread 0 always runs first
    /// and gets a full quantum.
    ///
    /// On hardware the pended switch is taken as soon as this returns to
    /// thread mode; see [`launch`](Self::launch) on Cortex-M.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::NotInitialized`] before [`init`](Self::init)
    /// - [`ScheduleError::AlreadyRunning`] on a second call
    /// - configuration or tick errors, after which the scheduler stays
    ///   INITIALIZED
    pub fn start<P: Platform + ?Sized>(
        &self,
        platform: &mut P,
        config: &SchedulerConfig,
    ) -> ThreadResult<()> {
        if let Err(state) = self.lifecycle.compare_exchange(
            SchedulerState::Initialized as u8,
            SchedulerState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(match SchedulerState::from_u8(state) {
                SchedulerState::Uninitialized => ScheduleError::NotInitialized,
                _ => ScheduleError::AlreadyRunning,
            }
            .into());
        }

        if let Err(e) = config.validate() {
            self.lifecycle.store(SchedulerState::Initialized as u8, Ordering::Release);
            return Err(e);
        }

        self.quantum.store(config.quantum_ticks, Ordering::Release);
        self.ticks.store(0, Ordering::Relaxed);
        self.next.store(self.current.load(Ordering::Acquire), Ordering::Release);

        if let Some(sink) = platform.diagnostics() {
            diag_println!(
                &mut *sink,
                "[sched] start: quantum {} ticks of {}us",
                config.quantum_ticks,
                config.tick_period_us
            );
        }

        platform.set_switch_priority(config.switch_priority);
        if let Err(e) = platform.configure_tick(config.tick_period_us) {
            self.lifecycle.store(SchedulerState::Initialized as u8, Ordering::Release);
            return Err(e.into());
        }
        platform.pend_switch();

        Ok(())
    }

    /// Tick interrupt body.
    ///
    /// Once per quantum: marks the current thread READY, publishes the
    /// next index and pends the switch exception. Never switches directly.
    /// Ticks before the first switch are dropped.
    pub fn tick_handler<T: SwitchTrigger + ?Sized>(&self, trigger: &T) {
        if self.state() != SchedulerState::Running || !self.bootstrapped() {
            return;
        }

        let ticks = self.ticks.load(Ordering::Relaxed) + 1;
        if ticks < self.quantum.load(Ordering::Relaxed) {
            self.ticks.store(ticks, Ordering::Relaxed);
            return;
        }

        self.ticks.store(0, Ordering::Relaxed);
        let current = self.current.load(Ordering::Acquire);
        self.table.tcb(current).set_state(ThreadState::Ready);
        self.next
            .store(RoundRobinScheduler::next_thread(current, N), Ordering::Release);
        trigger.pend_switch();
    }

    /// Switch exception body.
    ///
    /// The first call only restores: before it the core runs on the main
    /// stack and PSP holds nothing worth saving. Every later call saves the
    /// outgoing thread into its TCB before restoring the incoming one.
    ///
    /// Returning from the exception is what actually hands the core to the
    /// restored thread; the hardware unstacks R0-R3, R12, LR, PC and xPSR
    /// from the PSP left by `restore_context`.
    ///
    /// # Safety
    ///
    /// Must only be called from the switch exception (or a model of it),
    /// never reentrantly, after [`init`](Self::init).
    pub unsafe fn switch_handler<C: ContextSwitch + ?Sized>(&self, cpu: &mut C) {
        if self.bootstrapped.load(Ordering::Acquire) {
            let outgoing = self.table.tcb(self.current.load(Ordering::Acquire));
            // SAFETY: a thread was running, so PSP addresses its stacked frame
            let sp = unsafe { cpu.save_context() };
            outgoing.set_stack_pointer(sp);
            outgoing.set_state(ThreadState::Ready);
        } else {
            self.bootstrapped.store(true, Ordering::Release);
        }

        let next = self.next.load(Ordering::Acquire);
        self.current.store(next, Ordering::Release);

        let incoming = self.table.tcb(next);
        incoming.set_state(ThreadState::Executing);
        // SAFETY: every thread's stack pointer was set by the stack
        // initializer or by a previous save
        unsafe { cpu.restore_context(incoming.stack_pointer()) };
    }

    /// Whether the first switch has happened.
    pub fn bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    /// Words at the bottom of a thread's stack that have never been written.
    #[cfg(feature = "stack-paint")]
    pub fn stack_headroom(&self, id: usize) -> Option<usize> {
        let tcb = self.table.get(id)?;
        if tcb.stack_pointer().is_null() {
            return None;
        }
        Some(tcb.stack().headroom())
    }

    /// Make this kernel the target of the exception handlers.
    ///
    /// Only the first registration takes effect.
    pub fn register_global(&'static self) {
        GLOBAL_KERNEL.call_once(|| self as &'static dyn Dispatch);
    }

    #[cfg(test)]
    pub(crate) fn table(&self) -> &ThreadTable<N, W> {
        &self.table
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn next(&self) -> usize {
        self.next.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }
}

// SAFETY: stacks are only reached through raw pointers by the single core,
// and the handlers that mutate the table never run concurrently.
unsafe impl<const N: usize, const W: usize> Sync for Kernel<N, W> {}

/// Object-safe view of a kernel for the vector-table handlers, which
/// cannot name `N` and `W`.
#[cfg_attr(not(all(target_arch = "arm", target_os = "none")), allow(dead_code))]
pub(crate) trait Dispatch: Sync {
    fn bootstrapped(&self) -> bool;
    fn on_tick(&self, trigger: &dyn SwitchTrigger);
    /// # Safety
    ///
    /// See [`Kernel::switch_handler`].
    unsafe fn on_switch(&self, cpu: &mut dyn ContextSwitch);
}

impl<const N: usize, const W: usize> Dispatch for Kernel<N, W> {
    fn bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::Acquire)
    }

    fn on_tick(&self, trigger: &dyn SwitchTrigger) {
        self.tick_handler(trigger);
    }

    unsafe fn on_switch(&self, cpu: &mut dyn ContextSwitch) {
        // SAFETY: forwarded contract
        unsafe { self.switch_handler(cpu) }
    }
}

/// The registered kernel, if any.
#[cfg_attr(not(all(target_arch = "arm", target_os = "none")), allow(dead_code))]
pub(crate) fn global() -> Option<&'static dyn Dispatch> {
    GLOBAL_KERNEL.get().copied()
}
