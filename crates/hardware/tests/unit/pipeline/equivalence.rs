//! Architectural equivalence of the pipeline organisations.
//!
//! Timing differs between organisations and forwarding settings, but the committed state of
//! a program must not. Random straight-line programs over a handful of registers (with
//! loads and stores to a scratch area) are run on every configuration and their final
//! register files compared.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use mipsim_core::common::reg::RegId;
use mipsim_core::config::{Config, PipelineKind};
use mipsim_core::sim::simulator::Finish;

use crate::common::asm::*;
use crate::common::harness::{TestContext, config, image};

#[derive(Clone, Debug)]
enum Op {
    Addiu(u32, u32, i32),
    Addu(u32, u32, u32),
    Subu(u32, u32, u32),
    Slt(u32, u32, u32),
    Sll(u32, u32, u32),
    Ori(u32, u32, u32),
    Mul(u32, u32, u32),
    MultLo(u32, u32, u32),
    Store(u32, i32),
    Load(u32, i32),
}

impl Op {
    fn encode(&self, out: &mut Vec<u32>) {
        match *self {
            Self::Addiu(rt, rs, imm) => out.push(addiu(rt, rs, imm)),
            Self::Addu(rd, rs, rt) => out.push(addu(rd, rs, rt)),
            Self::Subu(rd, rs, rt) => out.push(subu(rd, rs, rt)),
            Self::Slt(rd, rs, rt) => out.push(slt(rd, rs, rt)),
            Self::Sll(rd, rt, shamt) => out.push(sll(rd, rt, shamt)),
            Self::Ori(rt, rs, imm) => out.push(ori(rt, rs, imm)),
            Self::Mul(rd, rs, rt) => out.push(mul(rd, rs, rt)),
            Self::MultLo(rd, rs, rt) => out.extend([mult(rs, rt), mflo(rd)]),
            Self::Store(rt, offset) => out.push(sw(rt, offset, S0)),
            Self::Load(rt, offset) => out.push(lw(rt, offset, S0)),
        }
    }
}

fn reg() -> impl Strategy<Value = u32> {
    prop_oneof![Just(ZERO), T0..=T4]
}

fn offset() -> impl Strategy<Value = i32> {
    (0..8i32).prop_map(|slot| slot * 4)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (reg(), reg(), -64i32..64).prop_map(|(rt, rs, imm)| Op::Addiu(rt, rs, imm)),
        (reg(), reg(), reg()).prop_map(|(rd, rs, rt)| Op::Addu(rd, rs, rt)),
        (reg(), reg(), reg()).prop_map(|(rd, rs, rt)| Op::Subu(rd, rs, rt)),
        (reg(), reg(), reg()).prop_map(|(rd, rs, rt)| Op::Slt(rd, rs, rt)),
        (reg(), reg(), 0u32..32).prop_map(|(rd, rt, sh)| Op::Sll(rd, rt, sh)),
        (reg(), reg(), 0u32..0x1_0000).prop_map(|(rt, rs, imm)| Op::Ori(rt, rs, imm)),
        (reg(), reg(), reg()).prop_map(|(rd, rs, rt)| Op::Mul(rd, rs, rt)),
        (reg(), reg(), reg()).prop_map(|(rd, rs, rt)| Op::MultLo(rd, rs, rt)),
        (reg(), offset()).prop_map(|(rt, off)| Op::Store(rt, off)),
        (reg(), offset()).prop_map(|(rt, off)| Op::Load(rt, off)),
    ]
}

fn assemble(ops: &[Op]) -> Vec<u32> {
    let mut text = vec![lui(S0, 0x1001)];
    for op in ops {
        op.encode(&mut text);
    }
    text
}

fn configurations() -> Vec<(&'static str, Config)> {
    let mut out = Vec::new();
    for (name, kind) in [
        ("single", PipelineKind::SingleCycle),
        ("multi_cycle", PipelineKind::MultiCycle),
        ("classic", PipelineKind::Classic),
        ("multi", PipelineKind::MultiUnit),
    ] {
        for forwarding in [true, false] {
            let mut config = config(kind);
            config.general.forwarding = forwarding;
            out.push((name, config));
        }
    }
    out
}

/// Committed registers visible to the program.
fn architectural_state(ctx: &TestContext) -> Vec<u32> {
    let mut state: Vec<u32> = (0..32).map(|n| ctx.gpr(n)).collect();
    state.push(ctx.reg(RegId::HI));
    state.push(ctx.reg(RegId::LO));
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn organisations_agree_on_final_state(ops in prop::collection::vec(op(), 1..24)) {
        let text = assemble(&ops);
        let mut reference: Option<(&str, Vec<u32>)> = None;

        for (name, config) in configurations() {
            let mut ctx = TestContext::new(&config, &image(&text));
            prop_assert_eq!(ctx.run_to_end(), Finish::Drained);
            prop_assert_eq!(ctx.sim.stats().instructions_retired, text.len() as u64);

            let state = architectural_state(&ctx);
            match &reference {
                None => reference = Some((name, state)),
                Some((first, expected)) => {
                    prop_assert_eq!(&state, expected, "{} differs from {}", name, first);
                }
            }
        }
    }
}

#[test]
fn forwarding_only_changes_timing() {
    let text = [
        addiu(T0, ZERO, 1),
        addu(T1, T0, T0),
        addu(T2, T1, T1),
        addu(T3, T2, T2),
    ];
    let mut results = Vec::new();
    for forwarding in [true, false] {
        let mut config = config(PipelineKind::Classic);
        config.general.forwarding = forwarding;
        let mut ctx = TestContext::new(&config, &image(&text));
        assert_eq!(ctx.run_to_end(), Finish::Drained);
        results.push((ctx.gpr(T3), ctx.sim.stats().stalls_raw, ctx.sim.stats().cycles));
    }

    assert_eq!(results[0].0, 8);
    assert_eq!(results[1].0, 8);
    assert_eq!(results[0].1, 0);
    assert!(results[1].1 > 0);
    assert!(results[1].2 > results[0].2);
}
