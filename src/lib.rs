#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

//! Preemptive round-robin threads for single-core Cortex-M.
//!
//! A fixed set of threads, each with its own statically allocated stack,
//! share one Armv7-M core. SysTick counts ticks; after every quantum it
//! pends PendSV, and PendSV, at the lowest priority, swaps the outgoing
//! thread's registers for the incoming one's. Threads never yield,
//! terminate or communicate with the scheduler.
//!
//! # Target Platform
//!
//! - **Architecture**: Armv7-M / Armv7E-M (`thumbv7m-none-eabi`,
//!   `thumbv7em-none-eabi`), no FPU context
//! - **Environment**: Bare-metal, single core
//! - **Host**: every other target builds a simulated core ([`arch::sim`])
//!   so the scheduler can be exercised with `cargo test`
//!
//! # Features
//!
//! - `stack-paint`: Fill unused stack words with a marker at
//!   initialization and report per-thread headroom (default)
//!
//! # Quick Start
//!
//! ```ignore
//! use cortex_rr_threads::arch::armv7m::CortexMPlatform;
//! use cortex_rr_threads::config::DEFAULT_THREAD_COUNT;
//! use cortex_rr_threads::{Kernel, SchedulerConfig, ThreadSpec};
//!
//! static KERNEL: Kernel<DEFAULT_THREAD_COUNT> = Kernel::new([
//!     ThreadSpec::new("A", thread_a),
//!     ThreadSpec::new("B", thread_b),
//!     ThreadSpec::new("C", thread_c),
//! ]);
//!
//! fn main() -> ! {
//!     let cp = cortex_m::Peripherals::take().unwrap();
//!     let mut platform = CortexMPlatform::new(cp.SCB, cp.SYST, 20_971_520);
//!
//!     KERNEL.init(&mut platform).unwrap();
//!     match KERNEL.launch(&mut platform, &SchedulerConfig::new()) {
//!         Ok(never) => match never {},
//!         Err(_) => loop {},
//!     }
//! }
//! ```

pub mod arch;
pub mod config;
pub mod diag;
pub mod errors;
pub mod kernel;
pub mod sched;
pub mod thread;
pub mod time;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests;

#[cfg(all(target_arch = "arm", target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    loop {
        core::hint::spin_loop();
    }
}

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{ContextSwitch, Platform, SwitchTrigger};

// Kernel
pub use kernel::{Kernel, SchedulerState};

// Scheduler
pub use sched::RoundRobinScheduler;

// Threads
pub use thread::{thread_trap, ThreadEntry, ThreadSpec, ThreadState};

// Configuration
pub use config::SchedulerConfig;

// Diagnostics
pub use diag::DiagnosticSink;

// Errors
pub use errors::{ScheduleError, ThreadError, ThreadResult, TimerError};
