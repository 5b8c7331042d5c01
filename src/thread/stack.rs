//! Per-thread stack storage and the stack initializer.

use core::cell::UnsafeCell;

use super::frame::{code_address, StackFrame, FRAME_BYTES};
use super::{Tcb, ThreadState};
use crate::errors::ScheduleError;

/// Pattern written over unused stack words at initialization.
#[cfg(feature = "stack-paint")]
pub const STACK_PAINT_WORD: u32 = 0xDEAD_BEEF;

/// Exception frames must sit on an 8-byte boundary (AAPCS, and the core
/// re-aligns on entry otherwise).
const STACK_ALIGN: usize = 8;

/// A thread's exclusively owned stack buffer.
///
/// The memory is only ever reached through raw pointers: by the stack
/// initializer before the thread first runs, and afterwards by the thread
/// itself and the context switch path.
pub struct ThreadStack<const W: usize> {
    words: UnsafeCell<[u32; W]>,
}

impl<const W: usize> ThreadStack<W> {
    pub const fn new() -> Self {
        Self {
            words: UnsafeCell::new([0; W]),
        }
    }

    /// Lowest address of the buffer.
    pub fn base(&self) -> *mut u32 {
        self.words.get().cast::<u32>()
    }

    /// Highest 8-byte aligned address not past the end of the buffer.
    pub fn aligned_top(&self) -> *mut u32 {
        let end = self.base().wrapping_add(W);
        let excess = end as usize % STACK_ALIGN;
        end.wrapping_byte_sub(excess)
    }

    /// Count painted words from the bottom of the buffer up.
    #[cfg(feature = "stack-paint")]
    pub fn headroom(&self) -> usize {
        let base = self.base();
        (0..W)
            // SAFETY: i < W keeps the read inside the buffer
            .take_while(|&i| unsafe { base.add(i).read_volatile() } == STACK_PAINT_WORD)
            .count()
    }

    #[cfg(feature = "stack-paint")]
    fn paint_below(&self, limit: *mut u32) {
        let mut word = self.base();
        while word < limit {
            // SAFETY: word walks from base up to limit, which lies inside the buffer
            unsafe {
                word.write_volatile(STACK_PAINT_WORD);
                word = word.add(1);
            }
        }
    }
}

impl<const W: usize> Default for ThreadStack<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// Return address installed in every fresh frame. Reaching it means a
/// thread body returned; the core is parked here for good.
pub fn thread_trap() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

/// Build the initial frame of a thread that has never run.
///
/// Places a zeroed [`StackFrame`] immediately below the aligned top of the
/// thread's stack, with PC = entry, LR = [`thread_trap`] and xPSR = Thumb,
/// and records its address as the thread's saved stack pointer. The run
/// state is left alone.
///
/// # Errors
///
/// [`ScheduleError::NotStandby`] if the thread is not in STANDBY or its
/// stack has already been built.
pub(crate) fn init_thread_stack<const W: usize>(
    id: usize,
    tcb: &Tcb<W>,
) -> Result<*mut u32, ScheduleError> {
    if tcb.state() != ThreadState::Standby || !tcb.stack_pointer().is_null() {
        return Err(ScheduleError::NotStandby(id));
    }

    let top = tcb.stack().aligned_top();
    let frame = top.wrapping_byte_sub(FRAME_BYTES).cast::<StackFrame>();
    debug_assert!(frame.cast::<u32>() >= tcb.stack().base());

    // LR keeps the Thumb bit, PC must not carry it.
    let trap = thread_trap as fn() -> ! as usize as u32;
    let initial = StackFrame::initial(code_address(tcb.entry()), trap);

    // SAFETY: W >= MIN_STACK_WORDS, so the frame lies inside the buffer,
    // is 8-byte aligned, and the thread has not started yet.
    unsafe { frame.write(initial) };

    #[cfg(feature = "stack-paint")]
    tcb.stack().paint_below(frame.cast::<u32>());

    let sp = frame.cast::<u32>();
    tcb.set_stack_pointer(sp);
    Ok(sp)
}
