//! Host-side model of the Cortex-M pieces the scheduler touches.
//!
//! `SimCpu` stands in for the register file: R4-R11, the eight registers
//! the core stacks on exception entry, and PSP. Stacks are the real thread
//! stack buffers, so frames written here are byte-for-byte what the
//! hardware would see. `SimPlatform` records what the scheduler asked of
//! the NVIC and SysTick and keeps the diagnostic log.

use core::ptr;

use portable_atomic::{AtomicBool, Ordering};

use super::{ContextSwitch, Platform, SwitchTrigger};
use crate::diag::DiagnosticSink;
use crate::errors::TimerError;
use crate::thread::frame::{HardwareFrame, SoftwareFrame, HARDWARE_WORDS, SOFTWARE_WORDS};

/// Simulated core registers.
#[derive(Debug)]
pub struct SimCpu {
    /// R4-R11
    pub callee_saved: [u32; SOFTWARE_WORDS],
    /// R0-R3, R12, LR, PC, xPSR as the running thread sees them
    pub caller_saved: HardwareFrame,
    psp: *mut u32,
    saves: usize,
    restores: usize,
}

impl SimCpu {
    pub const fn new() -> Self {
        Self {
            callee_saved: [0; SOFTWARE_WORDS],
            caller_saved: HardwareFrame {
                r0: 0,
                r1: 0,
                r2: 0,
                r3: 0,
                r12: 0,
                lr: 0,
                pc: 0,
                psr: 0,
            },
            psp: ptr::null_mut(),
            saves: 0,
            restores: 0,
        }
    }

    pub fn psp(&self) -> *mut u32 {
        self.psp
    }

    pub fn set_psp(&mut self, psp: *mut u32) {
        self.psp = psp;
    }

    /// Number of `save_context` calls so far.
    pub fn saves(&self) -> usize {
        self.saves
    }

    /// Number of `restore_context` calls so far.
    pub fn restores(&self) -> usize {
        self.restores
    }

    /// What the core does on exception entry from thread mode: stack the
    /// caller-saved half on PSP.
    ///
    /// # Safety
    ///
    /// PSP must have room for eight words below it.
    pub unsafe fn exception_entry(&mut self) {
        let sp = self.psp.wrapping_sub(HARDWARE_WORDS);
        // SAFETY: caller guarantees the eight words below PSP are stack
        unsafe { sp.cast::<HardwareFrame>().write(self.caller_saved) };
        self.psp = sp;
    }

    /// What the core does on exception return to thread mode on PSP:
    /// unstack the caller-saved half and resume at the stacked PC.
    ///
    /// # Safety
    ///
    /// PSP must address a hardware frame.
    pub unsafe fn exception_return(&mut self) {
        // SAFETY: caller guarantees PSP addresses a hardware frame
        self.caller_saved = unsafe { self.psp.cast::<HardwareFrame>().read() };
        self.psp = self.psp.wrapping_add(HARDWARE_WORDS);
    }
}

impl Default for SimCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextSwitch for SimCpu {
    unsafe fn save_context(&mut self) -> *mut u32 {
        let sp = self.psp.wrapping_sub(SOFTWARE_WORDS);
        let frame = SoftwareFrame::from_words(self.callee_saved);
        // SAFETY: PSP addresses a live thread's stack with room below it
        unsafe { sp.cast::<SoftwareFrame>().write(frame) };
        self.psp = sp;
        self.saves += 1;
        sp
    }

    unsafe fn restore_context(&mut self, sp: *mut u32) {
        // SAFETY: sp addresses a complete saved frame
        let frame = unsafe { sp.cast::<SoftwareFrame>().read() };
        self.callee_saved = frame.to_words();
        self.psp = sp.wrapping_add(SOFTWARE_WORDS);
        self.restores += 1;
    }
}

const LOG_CAPACITY: usize = 2048;

/// Fixed-size diagnostic log; output past capacity is dropped.
pub struct SimLog {
    buf: [u8; LOG_CAPACITY],
    len: usize,
}

impl SimLog {
    pub const fn new() -> Self {
        Self {
            buf: [0; LOG_CAPACITY],
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl Default for SimLog {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for SimLog {
    fn send(&mut self, bytes: &[u8]) {
        let room = LOG_CAPACITY - self.len;
        let n = bytes.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
    }
}

/// Records the platform calls made by the scheduler.
pub struct SimPlatform {
    switch_pending: AtomicBool,
    switch_priority: Option<u8>,
    tick_period_us: Option<u32>,
    process_stack_prepared: bool,
    /// Largest period the simulated tick accepts; models a 24-bit counter.
    max_period_us: u32,
    log: SimLog,
}

impl SimPlatform {
    pub const fn new() -> Self {
        Self {
            switch_pending: AtomicBool::new(false),
            switch_priority: None,
            tick_period_us: None,
            process_stack_prepared: false,
            max_period_us: u32::MAX,
            log: SimLog::new(),
        }
    }

    /// Platform whose tick cannot represent periods above `max_period_us`.
    pub const fn with_max_period(max_period_us: u32) -> Self {
        let mut platform = Self::new();
        platform.max_period_us = max_period_us;
        platform
    }

    pub fn is_switch_pending(&self) -> bool {
        self.switch_pending.load(Ordering::Acquire)
    }

    /// Clear the pending bit, as exception entry does, returning whether
    /// it was set.
    pub fn take_pending(&self) -> bool {
        self.switch_pending.swap(false, Ordering::AcqRel)
    }

    pub fn switch_priority(&self) -> Option<u8> {
        self.switch_priority
    }

    pub fn tick_period_us(&self) -> Option<u32> {
        self.tick_period_us
    }

    pub fn process_stack_prepared(&self) -> bool {
        self.process_stack_prepared
    }

    pub fn log(&self) -> &str {
        self.log.as_str()
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SwitchTrigger for SimPlatform {
    fn pend_switch(&self) {
        self.switch_pending.store(true, Ordering::Release);
    }
}

impl Platform for SimPlatform {
    fn prepare_process_stack(&mut self) {
        self.process_stack_prepared = true;
    }

    fn set_switch_priority(&mut self, priority: u8) {
        self.switch_priority = Some(priority);
    }

    fn configure_tick(&mut self, period_us: u32) -> Result<(), TimerError> {
        if period_us == 0 {
            return Err(TimerError::InvalidConfig);
        }
        if period_us > self.max_period_us {
            return Err(TimerError::UnsupportedPeriod(period_us));
        }
        self.tick_period_us = Some(period_us);
        Ok(())
    }

    fn diagnostics(&mut self) -> Option<&mut (dyn DiagnosticSink + 'static)> {
        Some(&mut self.log)
    }
}
