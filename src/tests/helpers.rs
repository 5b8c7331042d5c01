//! Test helper utilities and common functionality.

use std::boxed::Box;

use crate::arch::sim::{SimCpu, SimPlatform};
use crate::config::{SchedulerConfig, DEFAULT_THREAD_COUNT};
use crate::kernel::Kernel;
use crate::thread::frame::code_address;
use crate::thread::{ThreadEntry, ThreadSpec, ThreadState};

// Distinct bodies so each thread has its own entry address.
pub(crate) fn spin_a() -> ! {
    loop {
        core::hint::black_box(0xA_u32);
    }
}

pub(crate) fn spin_b() -> ! {
    loop {
        core::hint::black_box(0xB_u32);
    }
}

pub(crate) fn spin_c() -> ! {
    loop {
        core::hint::black_box(0xC_u32);
    }
}

/// The reference population: three threads A, B, C.
pub(crate) fn three_threads() -> [ThreadSpec; DEFAULT_THREAD_COUNT] {
    [
        ThreadSpec::new("A", spin_a),
        ThreadSpec::new("B", spin_b),
        ThreadSpec::new("C", spin_c),
    ]
}

/// N threads sharing one body, for property tests.
pub(crate) fn uniform_threads<const N: usize>() -> [ThreadSpec; N] {
    [ThreadSpec::new("worker", spin_a); N]
}

/// One kernel wired to a simulated core and platform.
///
/// The kernel is boxed so the stack pointers it records stay valid while
/// the harness itself moves around.
pub(crate) struct SimSystem<const N: usize, const W: usize> {
    pub(crate) kernel: Box<Kernel<N, W>>,
    pub(crate) platform: SimPlatform,
    pub(crate) cpu: SimCpu,
    pub(crate) config: SchedulerConfig,
    switches: usize,
}

impl<const N: usize, const W: usize> SimSystem<N, W> {
    pub(crate) fn new(specs: [ThreadSpec; N]) -> Self {
        Self::with_config(specs, SchedulerConfig::new())
    }

    pub(crate) fn with_config(specs: [ThreadSpec; N], config: SchedulerConfig) -> Self {
        Self {
            kernel: Box::new(Kernel::new(specs)),
            platform: SimPlatform::new(),
            cpu: SimCpu::new(),
            config,
            switches: 0,
        }
    }

    /// init, start, and take the forced first switch.
    pub(crate) fn boot(&mut self) {
        self.kernel.init(&mut self.platform).expect("init");
        self.kernel.start(&mut self.platform, &self.config).expect("start");
        assert!(self.dispatch_switch(), "start must pend the first switch");
    }

    /// Take the switch exception if it is pending, the way the core would
    /// on the way back to thread mode. Returns whether it ran.
    pub(crate) fn dispatch_switch(&mut self) -> bool {
        if !self.platform.take_pending() {
            return false;
        }

        // Before the first switch the core runs on MSP; nothing is stacked
        // on PSP.
        if self.kernel.bootstrapped() {
            unsafe { self.cpu.exception_entry() };
        }
        unsafe {
            self.kernel.switch_handler(&mut self.cpu);
            self.cpu.exception_return();
        }
        self.switches += 1;
        true
    }

    /// One tick interrupt followed by whatever it pended.
    pub(crate) fn tick(&mut self) -> bool {
        self.kernel.tick_handler(&self.platform);
        self.dispatch_switch()
    }

    /// Tick until a switch happens; returns how many ticks it took.
    pub(crate) fn run_quantum(&mut self) -> u32 {
        let mut ticks = 1;
        while !self.tick() {
            ticks += 1;
            assert!(ticks <= self.config.quantum_ticks, "no switch within a quantum");
        }
        ticks
    }

    pub(crate) fn switches(&self) -> usize {
        self.switches
    }

    pub(crate) fn current(&self) -> usize {
        self.kernel.current()
    }

    pub(crate) fn state_of(&self, id: usize) -> ThreadState {
        self.kernel.table().tcb(id).state()
    }

    pub(crate) fn count_in(&self, state: ThreadState) -> usize {
        self.kernel.table().iter().filter(|tcb| tcb.state() == state).count()
    }

    /// PC the core resumed at after the last exception return.
    pub(crate) fn resumed_pc(&self) -> u32 {
        self.cpu.caller_saved.pc
    }
}

/// PC value a thread starts at.
pub(crate) fn entry_pc(entry: ThreadEntry) -> u32 {
    code_address(entry)
}
