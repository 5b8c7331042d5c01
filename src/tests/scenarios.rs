//! Three threads, quantum of five ticks: the reference configuration.

use super::helpers::{entry_pc, spin_a, spin_b, spin_c, three_threads, SimSystem};
use crate::config::{DEFAULT_STACK_WORDS, DEFAULT_THREAD_COUNT};
use crate::kernel::SchedulerState;
use crate::thread::frame::{StackFrame, FRAME_WORDS};
use crate::thread::ThreadState;

type RefSystem = SimSystem<DEFAULT_THREAD_COUNT, DEFAULT_STACK_WORDS>;

const PATTERN_A: [u32; 8] = [0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xAB];
const PATTERN_B: [u32; 8] = [0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xBB];

#[test]
fn scenario_a_start_runs_thread_zero() {
    let mut sys = RefSystem::new(three_threads());
    sys.boot();

    assert_eq!(sys.kernel.state(), SchedulerState::Running);
    assert!(sys.kernel.bootstrapped());
    assert_eq!(sys.current(), 0);
    assert_eq!(sys.state_of(0), ThreadState::Executing);
    assert_eq!(sys.state_of(1), ThreadState::Ready);
    assert_eq!(sys.state_of(2), ThreadState::Ready);

    // The core is now in thread A at its entry, with the whole initial
    // frame consumed.
    assert_eq!(sys.resumed_pc(), entry_pc(spin_a));
    assert_eq!(sys.cpu.callee_saved, [0; 8]);
    assert_eq!(sys.cpu.caller_saved.psr, 1 << 24);
    let sp0 = sys.kernel.table().tcb(0).stack_pointer();
    assert_eq!(sys.cpu.psp(), sp0.wrapping_add(FRAME_WORDS));
    assert_eq!(sys.cpu.saves(), 0);
}

#[test]
fn scenario_b_below_threshold_no_switch() {
    let mut sys = RefSystem::new(three_threads());
    sys.boot();

    for _ in 0..4 {
        sys.kernel.tick_handler(&sys.platform);
    }

    assert!(!sys.platform.is_switch_pending());
    assert_eq!(sys.kernel.ticks(), 4);
    assert_eq!(sys.state_of(0), ThreadState::Executing);
}

#[test]
fn scenario_c_fifth_tick_requests_switch() {
    let mut sys = RefSystem::new(three_threads());
    sys.boot();

    for _ in 0..5 {
        sys.kernel.tick_handler(&sys.platform);
    }

    assert_eq!(sys.kernel.ticks(), 0);
    assert_eq!(sys.state_of(0), ThreadState::Ready);
    assert_eq!(sys.kernel.next(), 1);
    assert!(sys.platform.is_switch_pending());
    // Requested, not performed.
    assert_eq!(sys.current(), 0);
    assert_eq!(sys.switches(), 1);
}

#[test]
fn scenario_d_switch_saves_zero_and_restores_one() {
    let mut sys = RefSystem::new(three_threads());
    sys.boot();

    // Thread A does some work before it is preempted.
    sys.cpu.callee_saved = PATTERN_A;
    sys.cpu.caller_saved.r0 = 0xAAAA_0000;
    let psp_a = sys.cpu.psp();

    for _ in 0..5 {
        sys.kernel.tick_handler(&sys.platform);
    }
    assert!(sys.dispatch_switch());

    let saved = sys.kernel.table().tcb(0).stack_pointer();
    assert_eq!(saved, psp_a.wrapping_sub(FRAME_WORDS));
    let frame = unsafe { saved.cast::<StackFrame>().read() };
    assert_eq!(frame.software.to_words(), PATTERN_A);
    assert_eq!(frame.hardware.r0, 0xAAAA_0000);
    assert_eq!(frame.hardware.pc, entry_pc(spin_a));

    assert_eq!(sys.state_of(0), ThreadState::Ready);
    assert_eq!(sys.state_of(1), ThreadState::Executing);
    assert_eq!(sys.state_of(2), ThreadState::Ready);
    assert_eq!(sys.current(), 1);

    // B starts fresh from its initial frame.
    assert_eq!(sys.resumed_pc(), entry_pc(spin_b));
    assert_eq!(sys.cpu.callee_saved, [0; 8]);
    assert_eq!(sys.cpu.caller_saved.r0, 0);
    assert_eq!((sys.cpu.saves(), sys.cpu.restores()), (1, 2));
}

#[test]
fn scenario_e_three_cycles_visit_0_1_2_0() {
    let mut sys = RefSystem::new(three_threads());
    sys.boot();

    let mut seen = std::vec![sys.current()];
    for _ in 0..3 {
        assert_eq!(sys.run_quantum(), 5);
        seen.push(sys.current());
    }

    assert_eq!(seen, [0, 1, 2, 0]);
    assert_eq!(sys.resumed_pc(), entry_pc(spin_a));
}

#[test]
fn preempted_thread_resumes_where_it_left_off() {
    let mut sys = RefSystem::new(three_threads());
    sys.boot();

    sys.cpu.callee_saved = PATTERN_A;
    sys.cpu.caller_saved.r12 = 0x1200_00AA;
    sys.cpu.caller_saved.pc = entry_pc(spin_a) + 0x10;
    sys.run_quantum();

    sys.cpu.callee_saved = PATTERN_B;
    sys.cpu.caller_saved.pc = entry_pc(spin_b) + 0x20;
    sys.run_quantum();

    assert_eq!(sys.resumed_pc(), entry_pc(spin_c));
    sys.run_quantum();

    assert_eq!(sys.current(), 0);
    assert_eq!(sys.cpu.callee_saved, PATTERN_A);
    assert_eq!(sys.cpu.caller_saved.r12, 0x1200_00AA);
    assert_eq!(sys.resumed_pc(), entry_pc(spin_a) + 0x10);

    sys.run_quantum();
    assert_eq!(sys.cpu.callee_saved, PATTERN_B);
    assert_eq!(sys.resumed_pc(), entry_pc(spin_b) + 0x20);
}

#[test]
fn custom_quantum_is_honoured() {
    let config = crate::SchedulerConfig::new().quantum_ticks(2).tick_period_us(500);
    let mut sys = RefSystem::with_config(three_threads(), config);
    sys.boot();

    assert_eq!(sys.platform.tick_period_us(), Some(500));
    assert_eq!(sys.run_quantum(), 2);
    assert_eq!(sys.current(), 1);
}

#[test]
fn single_thread_switches_to_itself() {
    let mut sys: SimSystem<1, 64> = SimSystem::new([crate::ThreadSpec::new("solo", spin_c)]);
    sys.boot();

    sys.cpu.callee_saved = PATTERN_B;
    sys.run_quantum();

    assert_eq!(sys.current(), 0);
    assert_eq!(sys.state_of(0), ThreadState::Executing);
    assert_eq!(sys.cpu.callee_saved, PATTERN_B);
    assert_eq!(sys.resumed_pc(), entry_pc(spin_c));
}
