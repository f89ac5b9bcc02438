//! Single-Cycle Organisation Tests.

use pretty_assertions::assert_eq;
use rstest::rstest;

use mipsim_core::config::{Config, PipelineKind};
use mipsim_core::sim::simulator::Finish;

use crate::common::asm::*;
use crate::common::harness::{TestContext, config, image};

fn single_cycle(delay_slots: bool) -> Config {
    let mut config = config(PipelineKind::SingleCycle);
    config.general.delay_slots = delay_slots;
    config
}

#[test]
fn one_instruction_per_cycle_without_stalls() {
    let text = [
        addiu(T0, ZERO, 3),
        addu(T1, T0, T0),
        lui(S0, 0x1001),
        sw(T1, 0, S0),
        lw(T2, 0, S0),
        addu(T3, T2, T2),
    ];
    let mut ctx = TestContext::new(&single_cycle(false), &image(&text));

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.sim.stats().cycles, 6);
    assert_eq!(ctx.sim.stats().instructions_retired, 6);
    assert_eq!(ctx.sim.stats().stalls(), 0);
    assert_eq!(ctx.gpr(T3), 12);
    assert!(ctx.sim.pipeline().occupancy().is_empty());
}

#[test]
fn exit_finishes_in_the_same_cycle() {
    let mut text = exit_with(5).to_vec();
    text.push(addiu(T0, ZERO, 1));
    let mut ctx = TestContext::new(&single_cycle(false), &image(&text));

    assert_eq!(ctx.run_to_end(), Finish::Exit(5));
    assert_eq!(ctx.sim.stats().cycles, 3);
    assert_eq!(ctx.gpr(T0), 0);
}

/// `beq` over one instruction; with delay slots the skipped slot runs anyway.
#[rstest]
#[case::immediate(false, 0, 2)]
#[case::delayed(true, 1, 3)]
fn taken_branch(#[case] delay_slots: bool, #[case] slot_value: u32, #[case] cycles: u64) {
    let text = [
        beq(ZERO, ZERO, 1),
        addiu(T0, ZERO, 1),
        addiu(T1, ZERO, 2),
    ];
    let mut ctx = TestContext::new(&single_cycle(delay_slots), &image(&text));

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(T0), slot_value);
    assert_eq!(ctx.gpr(T1), 2);
    assert_eq!(ctx.sim.stats().cycles, cycles);
}

#[test]
fn pending_jump_is_visible_until_delay_slot_runs() {
    let text = [
        j(TestContext::text_address(3)),
        addiu(T0, ZERO, 1),
        addiu(T1, ZERO, 1),
        addiu(T2, ZERO, 1),
    ];
    let mut ctx = TestContext::new(&single_cycle(true), &image(&text));

    ctx.step(1);
    assert!(!ctx.sim.pipeline().is_empty());
    assert_eq!(ctx.sim.pipeline().oldest(), Some((TestContext::text_address(1), true)));

    ctx.step(1);
    assert!(ctx.sim.pipeline().is_empty());
    assert_eq!(ctx.sim.cpu().pc(), TestContext::text_address(3));

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!((ctx.gpr(T0), ctx.gpr(T1), ctx.gpr(T2)), (1, 0, 1));
}

#[test]
fn jal_links_past_the_delay_slot() {
    let text = [
        jal(TestContext::text_address(5)),
        addiu(T0, ZERO, 1),
        addiu(T1, ZERO, 1),
        j(TestContext::text_address(7)),
        nop(),
        jr(RA),
        nop(),
    ];
    let mut ctx = TestContext::new(&single_cycle(true), &image(&text));

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(RA), TestContext::text_address(2));
    assert_eq!(ctx.gpr(T0), 1);
    assert_eq!(ctx.gpr(T1), 1);
}
