//! Register frame of a suspended thread.
//!
//! On exception entry the core pushes {xPSR, PC, LR, R12, R3, R2, R1, R0}
//! onto the process stack. The switch routine then pushes R11 down to R4
//! below it. A saved stack pointer therefore addresses R4, and after R4-R11
//! are popped it addresses R0, which is exactly where exception return
//! expects the hardware frame.
//!
//! ```text
//!   higher addresses
//!   +------+
//!   | xPSR |  \
//!   |  PC  |   |
//!   |  LR  |   |
//!   | R12  |   | HardwareFrame (stacked by the core)
//!   |  R3  |   |
//!   |  R2  |   |
//!   |  R1  |   |
//!   |  R0  |  /
//!   | R11  |  \
//!   | ...  |   | SoftwareFrame (stacked by save_context)
//!   |  R4  |  /  <- saved stack pointer
//!   +------+
//! ```

use core::mem::{offset_of, size_of};

/// Callee-saved registers moved by the context switch primitive.
pub const SOFTWARE_WORDS: usize = 8;

/// Registers stacked by the core on exception entry.
pub const HARDWARE_WORDS: usize = 8;

/// Whole frame, in words.
pub const FRAME_WORDS: usize = SOFTWARE_WORDS + HARDWARE_WORDS;

/// Whole frame, in bytes.
pub const FRAME_BYTES: usize = FRAME_WORDS * size_of::<u32>();

/// xPSR for a thread that has never run: only the Thumb bit.
pub const INITIAL_PSR: u32 = 1 << 24;

/// R4-R11, lowest address first.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftwareFrame {
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,
}

/// The basic (non-FP) exception frame, lowest address first.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareFrame {
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub psr: u32,
}

/// A complete suspended context as it sits on a thread stack.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackFrame {
    pub software: SoftwareFrame,
    pub hardware: HardwareFrame,
}

// The asm in the switch path and the core's own stacking both depend on
// this exact layout.
const _: () = assert!(size_of::<SoftwareFrame>() == SOFTWARE_WORDS * 4);
const _: () = assert!(size_of::<HardwareFrame>() == HARDWARE_WORDS * 4);
const _: () = assert!(size_of::<StackFrame>() == FRAME_BYTES);
const _: () = assert!(offset_of!(StackFrame, hardware) == SOFTWARE_WORDS * 4);
const _: () = assert!(offset_of!(HardwareFrame, lr) == 5 * 4);
const _: () = assert!(offset_of!(HardwareFrame, pc) == 6 * 4);
const _: () = assert!(offset_of!(HardwareFrame, psr) == 7 * 4);

impl SoftwareFrame {
    pub const fn from_words(w: [u32; SOFTWARE_WORDS]) -> Self {
        Self {
            r4: w[0],
            r5: w[1],
            r6: w[2],
            r7: w[3],
            r8: w[4],
            r9: w[5],
            r10: w[6],
            r11: w[7],
        }
    }

    pub const fn to_words(self) -> [u32; SOFTWARE_WORDS] {
        [self.r4, self.r5, self.r6, self.r7, self.r8, self.r9, self.r10, self.r11]
    }
}

impl StackFrame {
    /// Frame that makes exception return land on `entry` with `trap` as
    /// the return address. Everything else is zero.
    pub const fn initial(entry: u32, trap: u32) -> Self {
        Self {
            software: SoftwareFrame::from_words([0; SOFTWARE_WORDS]),
            hardware: HardwareFrame {
                r0: 0,
                r1: 0,
                r2: 0,
                r3: 0,
                r12: 0,
                lr: trap,
                pc: entry,
                psr: INITIAL_PSR,
            },
        }
    }
}

/// Address stored in a frame's PC slot for a function.
///
/// Thumb function pointers carry bit 0; the stacked PC must be halfword
/// aligned, so the bit is dropped here. LR keeps it.
pub fn code_address(f: fn() -> !) -> u32 {
    (f as usize as u32) & !1
}
