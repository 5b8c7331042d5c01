//! Armv7-M port: PendSV performs the switch, SysTick drives the quantum.
//!
//! The vector table is the board's. It must route `SysTick` and `PendSV`
//! to the handlers exported here by symbol name.
//!
//! PendSV is a naked trampoline. The stacking of R4-R11 onto the process
//! stack happens in asm (`save_context`/`restore_context`), because the
//! scheduler logic in between is ordinary Rust and would otherwise be free
//! to reuse those registers first. Callee-saved registers survive the
//! `bl` into Rust, so the thread's values are still in R4-R11 when
//! `save_context` runs.
//!
//! Only the basic 8-word exception frame is handled. Threads must not use
//! the FPU (no lazy-stacked extended frames).

use core::arch::naked_asm;
use core::convert::Infallible;
use core::ptr;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};
use cortex_m::register::psp;

use super::{ContextSwitch, Platform, SwitchTrigger};
use crate::config::SchedulerConfig;
use crate::diag::DiagnosticSink;
use crate::errors::{ThreadResult, TimerError};
use crate::kernel::{global, Dispatch, Kernel};
use crate::thread::thread_trap;
use crate::time::systick_reload;

/// Core peripherals the scheduler drives, plus the board's core clock.
pub struct CortexMPlatform {
    scb: SCB,
    syst: SYST,
    core_clock_hz: u32,
    diag: Option<&'static mut dyn DiagnosticSink>,
}

impl CortexMPlatform {
    /// `core_clock_hz` is the SysTick input clock (the core clock with
    /// `SystClkSource::Core`).
    pub fn new(scb: SCB, syst: SYST, core_clock_hz: u32) -> Self {
        Self {
            scb,
            syst,
            core_clock_hz,
            diag: None,
        }
    }

    /// Route bring-up diagnostics to the board's serial port.
    pub fn with_diagnostics(mut self, sink: &'static mut dyn DiagnosticSink) -> Self {
        self.diag = Some(sink);
        self
    }
}

impl SwitchTrigger for CortexMPlatform {
    fn pend_switch(&self) {
        SCB::set_pendsv();
    }
}

impl Platform for CortexMPlatform {
    fn prepare_process_stack(&mut self) {
        // Handlers keep running on MSP. PSP only becomes meaningful once
        // the first switch loads a thread's frame into it.
        // SAFETY: nothing runs on PSP yet
        unsafe { psp::write(0) };
    }

    fn set_switch_priority(&mut self, priority: u8) {
        // SAFETY: PendSV is not active and nothing depends on its old level
        unsafe { self.scb.set_priority(SystemHandler::PendSV, priority) };
    }

    fn configure_tick(&mut self, period_us: u32) -> Result<(), TimerError> {
        let reload = systick_reload(self.core_clock_hz, period_us)?;

        self.syst.disable_counter();
        self.syst.set_clock_source(SystClkSource::Core);
        self.syst.set_reload(reload);
        self.syst.clear_current();
        self.syst.enable_interrupt();
        self.syst.enable_counter();
        Ok(())
    }

    fn diagnostics(&mut self) -> Option<&mut (dyn DiagnosticSink + 'static)> {
        self.diag.as_deref_mut()
    }
}

/// Pends PendSV without owning the SCB; what the tick handler uses.
pub struct PendSvTrigger;

impl SwitchTrigger for PendSvTrigger {
    fn pend_switch(&self) {
        SCB::set_pendsv();
    }
}

/// [`ContextSwitch`] as seen from inside the PendSV trampoline.
///
/// The asm has already pushed R4-R11 (when there was a running thread) and
/// pops them for whatever `next` ends up being, so "saving" hands back the
/// pointer the asm produced and "restoring" records the pointer for it.
struct StagedFrame {
    saved: *mut u32,
    next: *mut u32,
}

impl ContextSwitch for StagedFrame {
    unsafe fn save_context(&mut self) -> *mut u32 {
        self.saved
    }

    unsafe fn restore_context(&mut self, sp: *mut u32) {
        self.next = sp;
    }
}

/// Push R4-R11 below PSP, write PSP back and return it.
#[unsafe(naked)]
unsafe extern "C" fn save_context() -> *mut u32 {
    naked_asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "msr psp, r0",
        "bx lr",
    )
}

/// Pop R4-R11 from `sp` and leave PSP at the hardware-stacked half.
#[unsafe(naked)]
unsafe extern "C" fn restore_context(sp: *mut u32) {
    naked_asm!(
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "bx lr",
    )
}

extern "C" fn pendsv_bootstrapped() -> u32 {
    global().is_some_and(|kernel| kernel.bootstrapped()) as u32
}

/// Run the scheduler's switch logic; returns the incoming thread's saved
/// stack pointer. `saved` is null on the first switch.
extern "C" fn pendsv_switch(saved: *mut u32) -> *mut u32 {
    let Some(kernel) = global() else {
        // PendSV pended with no registered scheduler: nothing to run.
        thread_trap();
    };

    let mut frame = StagedFrame {
        saved,
        next: ptr::null_mut(),
    };
    // SAFETY: called once per PendSV, never reentrantly
    unsafe { kernel.on_switch(&mut frame) };
    frame.next
}

/// Switch exception. Lowest priority, so it only runs once every other
/// handler has returned.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "push {{r0, lr}}",
        "bl {bootstrapped}",
        "cbz r0, 1f",
        "bl {save}",
        "1:",
        "bl {switch}",
        "bl {restore}",
        "pop {{r0, lr}}",
        // EXC_RETURN: thread mode, process stack, basic frame
        "mvn lr, #2",
        "bx lr",
        bootstrapped = sym pendsv_bootstrapped,
        save = sym save_context,
        switch = sym pendsv_switch,
        restore = sym restore_context,
    )
}

/// Periodic tick.
#[no_mangle]
pub extern "C" fn SysTick() {
    if let Some(kernel) = global() {
        kernel.on_tick(&PendSvTrigger);
    }
}

impl<const N: usize, const W: usize> Kernel<N, W> {
    /// Register this kernel with the exception handlers, start it and park
    /// the caller.
    ///
    /// [`init`](Kernel::init) must already have run. On success this never
    /// returns: the pended first switch is taken as soon as the barriers
    /// complete, and `main`'s context is never resumed.
    ///
    /// # Errors
    ///
    /// Anything [`start`](Kernel::start) reports.
    pub fn launch(
        &'static self,
        platform: &mut CortexMPlatform,
        config: &SchedulerConfig,
    ) -> ThreadResult<Infallible> {
        self.register_global();
        self.start(platform, config)?;

        cortex_m::asm::dsb();
        cortex_m::asm::isb();

        loop {
            cortex_m::asm::wfi();
        }
    }
}
