//! Undo History Tests.
//!
//! Every cycle is journaled, so undoing it must restore registers, locks, memory, caches,
//! console output, pipeline contents and statistics exactly. The tests record the observable
//! state after each cycle, then undo back to the start comparing at every step.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use mipsim_core::common::constants::{DATA_BASE, TEXT_BASE};
use mipsim_core::common::reg::RegId;
use mipsim_core::config::{CacheConfig, Config, PipelineKind, ReplacementPolicy, WritePolicy};
use mipsim_core::core::pipeline::latches::SlotView;
use mipsim_core::core::units::cache::CacheStats;
use mipsim_core::sim::simulator::{Finish, StepOutcome};
use mipsim_core::soc::memory::Memory;
use mipsim_core::{ProgramImage, Simulator};

use crate::common::asm::*;
use crate::common::harness::{TestContext, config, image};

/// Loop storing, loading, multiplying and printing, then drawing a random number,
/// allocating heap and exiting with 1.
fn workload() -> ProgramImage {
    let mut text = vec![
        lui(S0, 0x1001),
        addiu(T0, ZERO, 3),
        // loop:
        sw(T0, 0, S0),
        lw(T1, 0, S0),
        addu(T2, T2, T1),
        mult(T2, T0),
        mflo(T3),
        addu(A0, T3, ZERO),
        addiu(V0, ZERO, 1),
        syscall(),
        addiu(T0, T0, -1),
        bne(T0, ZERO, -10),
        nop(),
        sw(T2, 4, S0),
        addiu(A1, ZERO, 5),
    ];
    text.extend(call(40));
    text.extend(call(41));
    text.push(addu(T4, A0, ZERO));
    text.push(addiu(A0, ZERO, 8));
    text.extend(call(9));
    text.extend(exit_with(1));
    image(&text)
}

fn workload_config(kind: PipelineKind, delay_slots: bool, cached: bool) -> Config {
    let mut config = config(kind);
    config.general.delay_slots = delay_slots;
    if cached {
        config.caches.push(CacheConfig {
            write_policy: WritePolicy::WriteBack,
            block_words: 2,
            blocks: 2,
            ways: 2,
            policy: ReplacementPolicy::Lru,
        });
    }
    config
}

/// Everything a user can see between two cycles.
#[derive(Debug, PartialEq)]
struct Observed {
    cycle: u64,
    pc: u32,
    registers: Vec<(RegId, u32)>,
    pipeline: Vec<SlotView>,
    caches: Vec<CacheStats>,
    console: String,
    memory: Vec<u32>,
    retired: u64,
    stalls: u64,
    flushes: u64,
    finished: Option<Finish>,
}

fn observe(sim: &Simulator) -> Observed {
    let snapshot = sim.snapshot();
    let memory = &sim.cpu().system.memory;
    Observed {
        cycle: snapshot.cycle,
        pc: snapshot.pc,
        registers: snapshot.registers,
        pipeline: snapshot.pipeline,
        caches: snapshot.caches,
        console: sim.console_output(),
        memory: (0..4).map(|i| memory.peek_word(DATA_BASE + i * 4)).collect(),
        retired: snapshot.stats.instructions_retired,
        stalls: snapshot.stats.stalls(),
        flushes: snapshot.stats.flushes,
        finished: snapshot.finished,
    }
}

/// Steps up to `cycles` cycles and returns how many ran.
fn advance(sim: &mut Simulator, cycles: u64) -> u64 {
    let mut executed = 0;
    while executed < cycles && sim.finished().is_none() {
        let _ = sim.step().expect("step");
        executed += 1;
    }
    executed
}

// ══════════════════════════════════════════════════════════
// 1. Exactness
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::single_cycle(PipelineKind::SingleCycle, false, false)]
#[case::single_cycle_delay_slots(PipelineKind::SingleCycle, true, true)]
#[case::multi_cycle(PipelineKind::MultiCycle, false, true)]
#[case::multi_cycle_delay_slots(PipelineKind::MultiCycle, true, false)]
#[case::classic(PipelineKind::Classic, false, false)]
#[case::classic_cached(PipelineKind::Classic, false, true)]
#[case::classic_delay_slots(PipelineKind::Classic, true, true)]
#[case::multi_unit(PipelineKind::MultiUnit, false, true)]
#[case::multi_unit_delay_slots(PipelineKind::MultiUnit, true, false)]
fn undo_retraces_every_cycle(
    #[case] kind: PipelineKind,
    #[case] delay_slots: bool,
    #[case] cached: bool,
) {
    let mut ctx = TestContext::new(&workload_config(kind, delay_slots, cached), &workload());
    let mut trail = vec![observe(&ctx.sim)];
    loop {
        let outcome = ctx.sim.step().expect("step");
        trail.push(observe(&ctx.sim));
        if let StepOutcome::Finished(finish) = outcome {
            assert_eq!(finish, Finish::Exit(1));
            break;
        }
    }
    assert_eq!(ctx.sim.console_output(), "9106");
    assert_eq!(ctx.sim.undo_depth(), trail.len() - 1);

    let _ = trail.pop();
    while let Some(expected) = trail.pop() {
        assert!(ctx.sim.undo_last_step(), "history ended early");
        assert_eq!(observe(&ctx.sim), expected);
    }
    assert!(!ctx.sim.undo_last_step());
    assert_eq!(ctx.sim.cpu().pc(), TEXT_BASE);
}

#[test]
fn replay_after_undo_is_identical() {
    let config = workload_config(PipelineKind::Classic, false, true);
    let mut ctx = TestContext::new(&config, &workload());
    assert_eq!(ctx.run_to_end(), Finish::Exit(1));
    let first = observe(&ctx.sim);

    for _ in 0..25 {
        assert!(ctx.sim.undo_last_step());
    }
    assert_eq!(ctx.sim.finished(), None);
    assert_eq!(ctx.run_to_end(), Finish::Exit(1));
    assert_eq!(observe(&ctx.sim), first);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Undoing `back` of `forward` cycles lands where running `forward - back` cycles does.
    #[test]
    fn undo_matches_shorter_run(forward in 1u64..80, back in 0u64..80) {
        let config = workload_config(PipelineKind::Classic, false, true);
        let mut sim = Simulator::new(&config, &workload()).expect("loads");
        let ran = advance(&mut sim, forward);
        let back = back.min(ran);
        for _ in 0..back {
            prop_assert!(sim.undo_last_step());
        }

        let mut fresh = Simulator::new(&config, &workload()).expect("loads");
        let _ = advance(&mut fresh, ran - back);
        prop_assert_eq!(observe(&sim), observe(&fresh));
    }
}

// ══════════════════════════════════════════════════════════
// 2. History limits and reset
// ══════════════════════════════════════════════════════════

#[test]
fn history_keeps_the_most_recent_cycles() {
    let mut config = Config::default();
    config.general.max_changes = 3;
    let mut ctx = TestContext::new(&config, &workload());

    ctx.step(10);
    assert_eq!(ctx.sim.undo_depth(), 3);
    for _ in 0..3 {
        assert!(ctx.sim.undo_last_step());
    }
    assert!(!ctx.sim.undo_last_step());
    assert_eq!(ctx.sim.cycles(), 7);
}

#[test]
fn disabled_undo_keeps_no_history() {
    let mut config = Config::default();
    config.general.undo_enabled = false;
    let mut ctx = TestContext::new(&config, &workload());

    ctx.step(5);
    assert_eq!(ctx.sim.undo_depth(), 0);
    assert!(!ctx.sim.undo_last_step());
    assert_eq!(ctx.sim.cycles(), 5);
}

#[test]
fn undoing_the_final_cycle_resumes_the_program() {
    let mut ctx = TestContext::new(&Config::default(), &workload());
    assert_eq!(ctx.run_to_end(), Finish::Exit(1));
    assert!(ctx.sim.step().is_err());

    assert!(ctx.sim.undo_last_step());
    assert_eq!(ctx.sim.finished(), None);
    assert_eq!(ctx.sim.cpu().system.exit_code, None);
    assert_eq!(ctx.sim.step().expect("resumes"), StepOutcome::Finished(Finish::Exit(1)));
}

#[test]
fn reset_returns_to_loaded_state() {
    let mut ctx = TestContext::new(&Config::default(), &workload());
    let initial = observe(&ctx.sim);
    assert_eq!(ctx.run_to_end(), Finish::Exit(1));

    ctx.sim.reset();
    assert_eq!(observe(&ctx.sim), initial);
    assert_eq!(ctx.sim.undo_depth(), 0);
    assert_eq!(ctx.run_to_end(), Finish::Exit(1));
}

#[test]
fn cancelled_cycle_leaves_state_untouched() {
    let mut ctx = TestContext::new(&Config::default(), &workload());
    ctx.step(4);
    let before = observe(&ctx.sim);

    let token = ctx.sim.cancel_token();
    token.cancel();
    assert_eq!(ctx.sim.step().expect("step"), StepOutcome::Cancelled);
    assert_eq!(observe(&ctx.sim), before);
    assert_eq!(ctx.sim.undo_depth(), 4);

    token.reset();
    assert_eq!(ctx.sim.step().expect("step"), StepOutcome::Executed);
    assert_eq!(ctx.sim.cycles(), 5);
}
