//! Architecture abstraction layer for context switching and the tick source.
//!
//! The scheduler core is ordinary portable code written against these
//! traits. On Armv7-M they are backed by the PendSV/SysTick port in
//! [`armv7m`]; everywhere else by the simulated core in [`sim`], which is
//! what the test suite drives.

use crate::diag::DiagnosticSink;
use crate::errors::TimerError;

/// Moves the software-saved half of a context (R4-R11) between the
/// register bank and a thread's process stack.
///
/// # Safety
///
/// Both operations manipulate registers the compiler does not track and
/// write through a caller-supplied stack pointer without any checks. A
/// bad pointer corrupts memory silently.
pub trait ContextSwitch {
    /// Push R4-R11 below the current process stack pointer, write the
    /// lowered pointer back to PSP and return it.
    ///
    /// # Safety
    ///
    /// PSP must address the hardware-stacked frame of a live thread.
    unsafe fn save_context(&mut self) -> *mut u32;

    /// Pop R4-R11 from `sp` and leave PSP just above them, at the
    /// hardware-stacked half. Control only transfers when the calling
    /// exception handler returns.
    ///
    /// # Safety
    ///
    /// `sp` must address a complete frame produced by `save_context` or by
    /// the stack initializer.
    unsafe fn restore_context(&mut self, sp: *mut u32);
}

/// Sets the pending bit of the switch exception. Callable from the tick
/// interrupt.
pub trait SwitchTrigger {
    fn pend_switch(&self);
}

/// Platform services the scheduler consumes during bring-up.
pub trait Platform: SwitchTrigger {
    /// Establish the MSP/PSP split before any thread exists.
    fn prepare_process_stack(&mut self);

    /// Set the priority of the switch exception.
    fn set_switch_priority(&mut self, priority: u8);

    /// Configure and arm the periodic tick interrupt.
    fn configure_tick(&mut self, period_us: u32) -> Result<(), TimerError>;

    /// Diagnostic output, if the board provides one.
    fn diagnostics(&mut self) -> Option<&mut (dyn DiagnosticSink + 'static)> {
        None
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod armv7m;

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub mod sim;
