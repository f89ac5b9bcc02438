//! Instruction Disassembler for MIPS32.
//!
//! Converts instruction encodings into assembler syntax for pipeline displays, trace events
//! and test diagnostics. Branch offsets are printed as signed word offsets, jump targets as
//! absolute index values shifted into byte addresses.
//!
//! # Usage
//!
//! ```
//! use mipsim_core::isa::disasm::disassemble;
//! assert_eq!(disassemble(0x2401_0005), "addiu $at, $zero, 5");
//! assert_eq!(disassemble(0x0000_0000), "nop");
//! ```

use crate::common::reg::RegId;
use crate::isa::decode::{Operation, lookup};
use crate::isa::instruction::Decoded;

fn gpr(n: u32) -> String {
    RegId::gpr(n).to_string()
}

fn cop0(n: u32) -> String {
    RegId::cop0(n).map_or_else(|| format!("${n}"), |r| format!("${n} ({})", r.name()))
}

/// Disassembles `word`, or returns `unknown` for reserved encodings.
pub fn disassemble(word: u32) -> String {
    match lookup(word) {
        Some(entry) => format(entry.operation, &Decoded::new(word)),
        None => format!("unknown ({word:#010x})"),
    }
}

/// Formats `op` with the operand fields in `f`.
pub fn format(op: Operation, f: &Decoded) -> String {
    use Operation as O;
    let m = op.mnemonic();
    let offset = f.simm as i32;
    match op {
        O::Sll if f.raw == 0 => "nop".to_owned(),
        O::Sll | O::Srl | O::Sra => {
            format!("{m} {}, {}, {}", gpr(f.rd), gpr(f.rt), f.shamt)
        }
        O::Sllv | O::Srlv | O::Srav => {
            format!("{m} {}, {}, {}", gpr(f.rd), gpr(f.rt), gpr(f.rs))
        }
        O::Jr | O::Mthi | O::Mtlo => format!("{m} {}", gpr(f.rs)),
        O::Jalr => format!("{m} {}, {}", gpr(f.rd), gpr(f.rs)),
        O::Mfhi | O::Mflo => format!("{m} {}", gpr(f.rd)),
        O::Mult | O::Multu | O::Div | O::Divu => format!("{m} {}, {}", gpr(f.rs), gpr(f.rt)),
        O::Add
        | O::Addu
        | O::Sub
        | O::Subu
        | O::And
        | O::Or
        | O::Xor
        | O::Nor
        | O::Slt
        | O::Sltu
        | O::Mul => format!("{m} {}, {}, {}", gpr(f.rd), gpr(f.rs), gpr(f.rt)),
        O::Bltz | O::Bgez | O::Blez | O::Bgtz => format!("{m} {}, {offset}", gpr(f.rs)),
        O::Beq | O::Bne => format!("{m} {}, {}, {offset}", gpr(f.rs), gpr(f.rt)),
        O::Addi | O::Addiu | O::Slti | O::Sltiu => {
            format!("{m} {}, {}, {offset}", gpr(f.rt), gpr(f.rs))
        }
        O::Andi | O::Ori | O::Xori => {
            format!("{m} {}, {}, {:#x}", gpr(f.rt), gpr(f.rs), f.imm)
        }
        O::Lui => format!("{m} {}, {:#x}", gpr(f.rt), f.imm),
        O::Lb | O::Lh | O::Lw | O::Lbu | O::Lhu | O::Sb | O::Sh | O::Sw => {
            format!("{m} {}, {offset}({})", gpr(f.rt), gpr(f.rs))
        }
        O::J | O::Jal => format!("{m} {:#010x}", f.target << 2),
        O::Mfc0 | O::Mtc0 => format!("{m} {}, {}", gpr(f.rt), cop0(f.rd)),
        O::Syscall | O::Break | O::Eret => m.to_owned(),
    }
}
