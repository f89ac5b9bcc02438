//! Multi-Cycle Organisation Tests.
//!
//! One instruction is in flight and it spends one cycle in each stage, so timing is five
//! cycles per instruction regardless of dependencies.

use pretty_assertions::assert_eq;
use rstest::rstest;

use mipsim_core::common::constants::DATA_BASE;
use mipsim_core::config::{Config, PipelineKind};
use mipsim_core::core::pipeline::PipelineDispatch;
use mipsim_core::isa::privileged::cause::InterruptCause;
use mipsim_core::sim::loader::DataSegment;
use mipsim_core::sim::simulator::Finish;
use mipsim_core::soc::memory::Memory;

use crate::common::asm::*;
use crate::common::harness::{TestContext, config, image};

fn multi_cycle(delay_slots: bool) -> Config {
    let mut config = config(PipelineKind::MultiCycle);
    config.general.delay_slots = delay_slots;
    config
}

// ══════════════════════════════════════════════════════════
// 1. Timing
// ══════════════════════════════════════════════════════════

#[test]
fn five_cycles_per_instruction() {
    let mut program = image(&[
        lui(S0, 0x1001),
        lw(T0, 0, S0),
        addu(T1, T0, T0),
        sw(T1, 4, S0),
    ]);
    program.data = DataSegment::new(DATA_BASE, 21u32.to_le_bytes().to_vec());
    let mut ctx = TestContext::new(&multi_cycle(false), &program);

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(T1), 42);
    assert_eq!(ctx.sim.cpu().system.memory.peek_word(DATA_BASE + 4), 42);

    let stats = ctx.sim.stats();
    assert_eq!(stats.cycles, 20);
    assert_eq!(stats.instructions_retired, 4);
    assert_eq!(stats.stalls(), 0);
}

#[test]
fn occupancy_walks_through_the_stages() {
    let mut ctx = TestContext::new(
        &multi_cycle(false),
        &image(&[addiu(T0, ZERO, 1), addiu(T1, ZERO, 2)]),
    );

    for label in ["IF", "ID", "EX", "MEM"] {
        ctx.step(1);
        let view = ctx.sim.pipeline().occupancy();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].location, label);
        assert_eq!(view[0].pc, TestContext::text_address(0));
    }
    assert_eq!(ctx.gpr(T0), 0);

    ctx.step(1);
    assert!(ctx.sim.pipeline().occupancy().is_empty());
    assert_eq!(ctx.gpr(T0), 1);

    ctx.step(1);
    let view = ctx.sim.pipeline().occupancy();
    assert_eq!(view[0].location, "IF");
    assert_eq!(view[0].pc, TestContext::text_address(1));
}

#[test]
fn exit_finishes_after_write_back() {
    let mut text = exit_with(5).to_vec();
    text.push(addiu(T0, ZERO, 1));
    let mut ctx = TestContext::new(&multi_cycle(false), &image(&text));

    assert_eq!(ctx.run_to_end(), Finish::Exit(5));
    assert_eq!(ctx.sim.stats().cycles, 15);
    assert_eq!(ctx.gpr(T0), 0);
}

// ══════════════════════════════════════════════════════════
// 2. Control transfers and exceptions
// ══════════════════════════════════════════════════════════

/// `beq` over one instruction; with delay slots the skipped slot runs anyway.
#[rstest]
#[case::immediate(false, 0, 10)]
#[case::delayed(true, 1, 15)]
fn taken_branch(#[case] delay_slots: bool, #[case] slot_value: u32, #[case] cycles: u64) {
    let text = [
        beq(ZERO, ZERO, 1),
        addiu(T0, ZERO, 1),
        addiu(T1, ZERO, 2),
    ];
    let mut ctx = TestContext::new(&multi_cycle(delay_slots), &image(&text));

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(T0), slot_value);
    assert_eq!(ctx.gpr(T1), 2);
    assert_eq!(ctx.sim.stats().cycles, cycles);
}

#[test]
fn delay_slot_keeps_the_jump_pending() {
    let text = [
        j(TestContext::text_address(3)),
        addiu(T0, ZERO, 1),
        addiu(T1, ZERO, 2),
        addiu(T2, ZERO, 3),
    ];
    let mut ctx = TestContext::new(&multi_cycle(true), &image(&text));

    // The jump has committed and its delay slot is not fetched yet.
    ctx.step(5);
    assert!(ctx.sim.pipeline().occupancy().is_empty());
    assert!(!ctx.sim.pipeline().is_empty());
    assert_eq!(ctx.sim.pipeline().oldest(), Some((TestContext::text_address(1), true)));

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!((ctx.gpr(T0), ctx.gpr(T1), ctx.gpr(T2)), (1, 0, 3));
}

#[test]
fn overflow_without_handler_is_fatal() {
    let text = [lui(T0, 0x7FFF), ori(T0, T0, 0xFFFF), addi(T1, T0, 1)];
    let mut ctx = TestContext::new(&multi_cycle(false), &image(&text));

    match ctx.run_to_end() {
        Finish::Fatal { trap, pc } => {
            assert_eq!(trap.cause, InterruptCause::ArithmeticOverflow);
            assert_eq!(pc, TestContext::text_address(2));
        }
        other => panic!("expected a fatal exception, got {other:?}"),
    }
    assert_eq!(ctx.gpr(T1), 0);
    assert_eq!(ctx.sim.stats().cycles, 15);
}

#[test]
fn dispatch_reports_kind() {
    let pipeline = PipelineDispatch::new(&multi_cycle(false));
    assert_eq!(pipeline.kind(), PipelineKind::MultiCycle);
    assert!(pipeline.is_empty());
}
