//! Thread control blocks and the fixed thread table.
//!
//! The table is built once, in a `const` context, from one [`ThreadSpec`]
//! per thread. Its index doubles as the scheduling identity. Only the
//! kernel and the stack initializer touch TCB internals; nothing here is
//! reachable from outside the crate except the spec and state types.

pub mod frame;
pub mod stack;

use portable_atomic::{AtomicPtr, AtomicU8, Ordering};

pub use stack::{thread_trap, ThreadStack};

/// A thread body. Never returns; if it ever did, it would land in
/// [`thread_trap`].
pub type ThreadEntry = fn() -> !;

/// Run state of one thread slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Stack not yet built, not eligible
    Standby = 0,
    /// Holds a valid suspended frame
    Ready = 1,
    /// Mounted on the core
    Executing = 2,
}

impl ThreadState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => ThreadState::Ready,
            2 => ThreadState::Executing,
            _ => ThreadState::Standby,
        }
    }
}

/// Static description of a thread handed to [`Kernel::new`](crate::Kernel::new).
#[derive(Debug, Clone, Copy)]
pub struct ThreadSpec {
    /// Diagnostic name
    pub name: &'static str,
    /// Thread body
    pub entry: ThreadEntry,
}

impl ThreadSpec {
    pub const fn new(name: &'static str, entry: ThreadEntry) -> Self {
        Self { name, entry }
    }
}

/// Thread control block.
pub(crate) struct Tcb<const W: usize> {
    name: &'static str,
    entry: ThreadEntry,
    state: AtomicU8,
    /// Valid only while the thread is not executing.
    stack_pointer: AtomicPtr<u32>,
    stack: ThreadStack<W>,
}

impl<const W: usize> Tcb<W> {
    /// Slot with the trap routine as its body; overwritten by the table.
    const UNUSED: Self = Self {
        name: "",
        entry: thread_trap,
        state: AtomicU8::new(ThreadState::Standby as u8),
        stack_pointer: AtomicPtr::new(core::ptr::null_mut()),
        stack: ThreadStack::new(),
    };

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn entry(&self) -> ThreadEntry {
        self.entry
    }

    pub(crate) fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ThreadState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn stack_pointer(&self) -> *mut u32 {
        self.stack_pointer.load(Ordering::Acquire)
    }

    pub(crate) fn set_stack_pointer(&self, sp: *mut u32) {
        self.stack_pointer.store(sp, Ordering::Release);
    }

    pub(crate) fn stack(&self) -> &ThreadStack<W> {
        &self.stack
    }
}

/// Fixed-length table of TCBs.
pub(crate) struct ThreadTable<const N: usize, const W: usize> {
    tcbs: [Tcb<W>; N],
}

impl<const N: usize, const W: usize> ThreadTable<N, W> {
    pub(crate) const fn new(specs: [ThreadSpec; N]) -> Self {
        let mut tcbs = [const { Tcb::<W>::UNUSED }; N];
        let mut i = 0;
        while i < N {
            tcbs[i].name = specs[i].name;
            tcbs[i].entry = specs[i].entry;
            i += 1;
        }
        Self { tcbs }
    }

    pub(crate) const fn len(&self) -> usize {
        N
    }

    pub(crate) fn get(&self, id: usize) -> Option<&Tcb<W>> {
        self.tcbs.get(id)
    }

    /// Index known to be in range (produced by the selection policy).
    pub(crate) fn tcb(&self, id: usize) -> &Tcb<W> {
        &self.tcbs[id]
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Tcb<W>> {
        self.tcbs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_a() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    fn body_b() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    #[test]
    fn test_table_starts_in_standby() {
        let table: ThreadTable<2, 32> = ThreadTable::new([
            ThreadSpec::new("a", body_a),
            ThreadSpec::new("b", body_b),
        ]);

        assert_eq!(table.len(), 2);
        for tcb in table.iter() {
            assert_eq!(tcb.state(), ThreadState::Standby);
            assert!(tcb.stack_pointer().is_null());
        }
        assert_eq!(table.tcb(0).name(), "a");
        assert_eq!(table.tcb(1).name(), "b");
        assert_eq!(table.tcb(1).entry() as usize, body_b as fn() -> ! as usize);
        assert!(table.get(2).is_none());
    }

    #[test]
    fn test_state_transitions() {
        let table: ThreadTable<1, 32> = ThreadTable::new([ThreadSpec::new("a", body_a)]);
        let tcb = table.tcb(0);

        tcb.set_state(ThreadState::Ready);
        assert_eq!(tcb.state(), ThreadState::Ready);
        tcb.set_state(ThreadState::Executing);
        assert_eq!(tcb.state(), ThreadState::Executing);
        tcb.set_state(ThreadState::Ready);
        assert_eq!(tcb.state(), ThreadState::Ready);
    }
}
