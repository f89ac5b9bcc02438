//! Decoding and disassembly of the encodings produced by the test assembler, plus a
//! custom instruction set plugged into the simulator.

use pretty_assertions::assert_eq;
use rstest::rstest;

use mipsim_core::common::error::Trap;
use mipsim_core::config::UnitKind;
use mipsim_core::core::cpu::execution::{InstructionExecution, InstructionSet};
use mipsim_core::isa::BuiltinIsa;
use mipsim_core::isa::abi::register_by_name;
use mipsim_core::isa::decode::{Operation, lookup};
use mipsim_core::isa::disasm::disassemble;
use mipsim_core::isa::privileged::cause::InterruptCause;
use mipsim_core::sim::simulator::Finish;
use mipsim_core::stats::InstructionClass;
use mipsim_core::{Config, Simulator};

use crate::common::asm::*;
use crate::common::harness::{TestContext, image};

#[rstest]
#[case(nop(), "nop")]
#[case(addiu(T0, ZERO, -5), "addiu $t0, $zero, -5")]
#[case(addu(T2, T0, T1), "addu $t2, $t0, $t1")]
#[case(sll(T0, T1, 3), "sll $t0, $t1, 3")]
#[case(ori(T0, T1, 0xFF), "ori $t0, $t1, 0xff")]
#[case(lui(S0, 0x1001), "lui $s0, 0x1001")]
#[case(sw(T1, 8, S0), "sw $t1, 8($s0)")]
#[case(lb(T1, -1, A0), "lb $t1, -1($a0)")]
#[case(bne(T0, ZERO, -3), "bne $t0, $zero, -3")]
#[case(j(0x0040_0010), "j 0x00400010")]
#[case(jr(RA), "jr $ra")]
#[case(mult(T1, T2), "mult $t1, $t2")]
#[case(mul(T2, T1, T0), "mul $t2, $t1, $t0")]
#[case(mflo(T3), "mflo $t3")]
#[case(mtc0(T0, 12), "mtc0 $t0, $12 (Status)")]
#[case(eret(), "eret")]
#[case(syscall(), "syscall")]
fn disassembles_assembled_words(#[case] word: u32, #[case] text: &str) {
    assert_eq!(disassemble(word), text);
}

#[rstest]
#[case(addiu(T0, T0, 1), Operation::Addiu, InstructionClass::Alu, UnitKind::Integer)]
#[case(lw(T0, 0, S0), Operation::Lw, InstructionClass::Load, UnitKind::LoadStore)]
#[case(sw(T0, 0, S0), Operation::Sw, InstructionClass::Store, UnitKind::LoadStore)]
#[case(beq(T0, T1, 2), Operation::Beq, InstructionClass::Branch, UnitKind::Integer)]
#[case(jal(0x0040_0000), Operation::Jal, InstructionClass::Branch, UnitKind::Integer)]
#[case(mult(T0, T1), Operation::Mult, InstructionClass::Alu, UnitKind::Multiply)]
#[case(mul(T0, T1, T2), Operation::Mul, InstructionClass::Alu, UnitKind::Multiply)]
#[case(div(T0, T1), Operation::Div, InstructionClass::Alu, UnitKind::Divide)]
#[case(mfc0(T0, 13), Operation::Mfc0, InstructionClass::System, UnitKind::Integer)]
#[case(brk(), Operation::Break, InstructionClass::System, UnitKind::Integer)]
fn classifies_operations(
    #[case] word: u32,
    #[case] operation: Operation,
    #[case] class: InstructionClass,
    #[case] unit: UnitKind,
) {
    let entry = lookup(word).expect("known encoding");
    assert_eq!(entry.operation, operation);
    assert_eq!(operation.class(), class);
    assert_eq!(operation.unit(), unit);

    let execution = BuiltinIsa.decode(word).expect("decodes");
    assert_eq!(execution.mnemonic(), operation.mnemonic());
    assert_eq!(execution.unit_kind(), unit);
}

#[test]
fn reserved_encodings_are_rejected() {
    for word in [0xFC00_0000, 0x0000_0001, 0x7000_0000] {
        let trap = BuiltinIsa.decode(word).expect_err("reserved");
        assert_eq!(trap.cause, InterruptCause::ReservedInstruction);
    }
}

#[test]
fn register_names_resolve() {
    assert_eq!(register_by_name("$t0"), Some(T0));
    assert_eq!(register_by_name("ra"), Some(RA));
    assert_eq!(register_by_name("$32"), None);
}

/// Decoder without `addu`, to check that the simulator uses the instruction set it is given.
#[derive(Clone, Copy, Debug)]
struct WithoutAddu;

impl InstructionSet for WithoutAddu {
    fn decode(&self, word: u32) -> Result<Box<dyn InstructionExecution>, Trap> {
        if lookup(word).is_some_and(|e| e.operation == Operation::Addu) {
            return Err(Trap::reserved_instruction());
        }
        BuiltinIsa.decode(word)
    }

    fn boxed_clone(&self) -> Box<dyn InstructionSet> {
        Box::new(*self)
    }
}

#[test]
fn simulator_uses_the_configured_instruction_set() {
    let text = [addiu(T0, ZERO, 1), addu(T1, T0, T0), addiu(T2, ZERO, 1)];
    let sim = Simulator::new(&Config::default(), &image(&text))
        .expect("loads")
        .with_isa(Box::new(WithoutAddu));
    let mut ctx = TestContext { sim };

    match ctx.run_to_end() {
        Finish::Fatal { trap, pc } => {
            assert_eq!(trap.cause, InterruptCause::ReservedInstruction);
            assert_eq!(pc, TestContext::text_address(1));
        }
        other => panic!("expected a reserved instruction, got {other:?}"),
    }
    assert_eq!(ctx.gpr(T0), 1);
    assert_eq!(ctx.gpr(T2), 0);
}
