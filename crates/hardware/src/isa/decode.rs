//! MIPS32 Instruction Decoder.
//!
//! Decoding is table driven. Each entry pairs a `(mask, value)` match predicate with the
//! operation it selects and its encoding format; the first matching entry wins. The table
//! covers the integer subset, `MUL` from SPECIAL2 and the COP0 moves and `ERET`. Words that
//! match no entry raise a reserved-instruction exception.

use crate::common::error::Trap;
use crate::config::UnitKind;
use crate::core::cpu::execution::{InstructionExecution, InstructionSet};
use crate::isa::exec::BasicExecution;
use crate::isa::instruction::Format;
use crate::stats::InstructionClass;

/// Primary opcodes (bits 26-31).
pub mod opcodes {
    /// R-format ALU, shifts, jumps through registers and traps.
    pub const SPECIAL: u32 = 0x00;
    /// `BLTZ`/`BGEZ`, selected by `rt`.
    pub const REGIMM: u32 = 0x01;
    /// Jump.
    pub const J: u32 = 0x02;
    /// Jump and link.
    pub const JAL: u32 = 0x03;
    /// Branch on equal.
    pub const BEQ: u32 = 0x04;
    /// Branch on not equal.
    pub const BNE: u32 = 0x05;
    /// Branch on less than or equal to zero.
    pub const BLEZ: u32 = 0x06;
    /// Branch on greater than zero.
    pub const BGTZ: u32 = 0x07;
    /// Add immediate with overflow trap.
    pub const ADDI: u32 = 0x08;
    /// Add immediate.
    pub const ADDIU: u32 = 0x09;
    /// Set on less than immediate.
    pub const SLTI: u32 = 0x0A;
    /// Set on less than immediate, unsigned compare.
    pub const SLTIU: u32 = 0x0B;
    /// And immediate.
    pub const ANDI: u32 = 0x0C;
    /// Or immediate.
    pub const ORI: u32 = 0x0D;
    /// Xor immediate.
    pub const XORI: u32 = 0x0E;
    /// Load upper immediate.
    pub const LUI: u32 = 0x0F;
    /// Coprocessor 0.
    pub const COP0: u32 = 0x10;
    /// `MUL` and friends.
    pub const SPECIAL2: u32 = 0x1C;
    /// Load byte.
    pub const LB: u32 = 0x20;
    /// Load half-word.
    pub const LH: u32 = 0x21;
    /// Load word.
    pub const LW: u32 = 0x23;
    /// Load byte unsigned.
    pub const LBU: u32 = 0x24;
    /// Load half-word unsigned.
    pub const LHU: u32 = 0x25;
    /// Store byte.
    pub const SB: u32 = 0x28;
    /// Store half-word.
    pub const SH: u32 = 0x29;
    /// Store word.
    pub const SW: u32 = 0x2B;
}

/// Function codes of the SPECIAL opcode (bits 0-5).
pub mod funct {
    /// Shift left logical.
    pub const SLL: u32 = 0x00;
    /// Shift right logical.
    pub const SRL: u32 = 0x02;
    /// Shift right arithmetic.
    pub const SRA: u32 = 0x03;
    /// Shift left logical variable.
    pub const SLLV: u32 = 0x04;
    /// Shift right logical variable.
    pub const SRLV: u32 = 0x06;
    /// Shift right arithmetic variable.
    pub const SRAV: u32 = 0x07;
    /// Jump register.
    pub const JR: u32 = 0x08;
    /// Jump and link register.
    pub const JALR: u32 = 0x09;
    /// System call.
    pub const SYSCALL: u32 = 0x0C;
    /// Breakpoint.
    pub const BREAK: u32 = 0x0D;
    /// Move from HI.
    pub const MFHI: u32 = 0x10;
    /// Move to HI.
    pub const MTHI: u32 = 0x11;
    /// Move from LO.
    pub const MFLO: u32 = 0x12;
    /// Move to LO.
    pub const MTLO: u32 = 0x13;
    /// Signed multiply.
    pub const MULT: u32 = 0x18;
    /// Unsigned multiply.
    pub const MULTU: u32 = 0x19;
    /// Signed divide.
    pub const DIV: u32 = 0x1A;
    /// Unsigned divide.
    pub const DIVU: u32 = 0x1B;
    /// Add with overflow trap.
    pub const ADD: u32 = 0x20;
    /// Add.
    pub const ADDU: u32 = 0x21;
    /// Subtract with overflow trap.
    pub const SUB: u32 = 0x22;
    /// Subtract.
    pub const SUBU: u32 = 0x23;
    /// And.
    pub const AND: u32 = 0x24;
    /// Or.
    pub const OR: u32 = 0x25;
    /// Xor.
    pub const XOR: u32 = 0x26;
    /// Nor.
    pub const NOR: u32 = 0x27;
    /// Set on less than.
    pub const SLT: u32 = 0x2A;
    /// Set on less than unsigned.
    pub const SLTU: u32 = 0x2B;
    /// `MUL` under SPECIAL2.
    pub const MUL: u32 = 0x02;
    /// `ERET` under COP0 with the CO bit set.
    pub const ERET: u32 = 0x18;
}

/// Built-in operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Operation {
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Jr,
    Jalr,
    Syscall,
    Break,
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Mult,
    Multu,
    Div,
    Divu,
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Mul,
    Bltz,
    Bgez,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
    J,
    Jal,
    Mfc0,
    Mtc0,
    Eret,
}

impl Operation {
    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Sll => "sll",
            Self::Srl => "srl",
            Self::Sra => "sra",
            Self::Sllv => "sllv",
            Self::Srlv => "srlv",
            Self::Srav => "srav",
            Self::Jr => "jr",
            Self::Jalr => "jalr",
            Self::Syscall => "syscall",
            Self::Break => "break",
            Self::Mfhi => "mfhi",
            Self::Mthi => "mthi",
            Self::Mflo => "mflo",
            Self::Mtlo => "mtlo",
            Self::Mult => "mult",
            Self::Multu => "multu",
            Self::Div => "div",
            Self::Divu => "divu",
            Self::Add => "add",
            Self::Addu => "addu",
            Self::Sub => "sub",
            Self::Subu => "subu",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Nor => "nor",
            Self::Slt => "slt",
            Self::Sltu => "sltu",
            Self::Mul => "mul",
            Self::Bltz => "bltz",
            Self::Bgez => "bgez",
            Self::Beq => "beq",
            Self::Bne => "bne",
            Self::Blez => "blez",
            Self::Bgtz => "bgtz",
            Self::Addi => "addi",
            Self::Addiu => "addiu",
            Self::Slti => "slti",
            Self::Sltiu => "sltiu",
            Self::Andi => "andi",
            Self::Ori => "ori",
            Self::Xori => "xori",
            Self::Lui => "lui",
            Self::Lb => "lb",
            Self::Lh => "lh",
            Self::Lw => "lw",
            Self::Lbu => "lbu",
            Self::Lhu => "lhu",
            Self::Sb => "sb",
            Self::Sh => "sh",
            Self::Sw => "sw",
            Self::J => "j",
            Self::Jal => "jal",
            Self::Mfc0 => "mfc0",
            Self::Mtc0 => "mtc0",
            Self::Eret => "eret",
        }
    }

    /// Category for the instruction mix.
    pub const fn class(self) -> InstructionClass {
        match self {
            Self::Lb | Self::Lh | Self::Lw | Self::Lbu | Self::Lhu => InstructionClass::Load,
            Self::Sb | Self::Sh | Self::Sw => InstructionClass::Store,
            Self::Jr
            | Self::Jalr
            | Self::Bltz
            | Self::Bgez
            | Self::Beq
            | Self::Bne
            | Self::Blez
            | Self::Bgtz
            | Self::J
            | Self::Jal => InstructionClass::Branch,
            Self::Syscall | Self::Break | Self::Mfc0 | Self::Mtc0 | Self::Eret => {
                InstructionClass::System
            }
            _ => InstructionClass::Alu,
        }
    }

    /// Functional unit the operation needs in the multi-unit pipeline.
    pub const fn unit(self) -> UnitKind {
        match self.class() {
            InstructionClass::Load | InstructionClass::Store => UnitKind::LoadStore,
            _ => match self {
                Self::Mult | Self::Multu | Self::Mul => UnitKind::Multiply,
                Self::Div | Self::Divu => UnitKind::Divide,
                _ => UnitKind::Integer,
            },
        }
    }

    /// Returns `true` for branches, jumps and `ERET`.
    pub const fn is_control_transfer(self) -> bool {
        matches!(self.class(), InstructionClass::Branch) || matches!(self, Self::Eret)
    }
}

/// One row of the decode table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Bits that take part in the match.
    pub mask: u32,
    /// Required value of the masked bits.
    pub value: u32,
    /// Selected operation.
    pub operation: Operation,
    /// Encoding format.
    pub format: Format,
}

impl Entry {
    /// Returns `true` if `word` encodes this entry's operation.
    pub const fn matches(&self, word: u32) -> bool {
        word & self.mask == self.value
    }
}

const OPCODE_MASK: u32 = 0xFC00_0000;
const SPECIAL_MASK: u32 = OPCODE_MASK | 0x3F;
const REGIMM_MASK: u32 = OPCODE_MASK | (0x1F << 16);
const COP0_MOVE_MASK: u32 = OPCODE_MASK | (0x1F << 21);

const fn r(funct: u32, operation: Operation) -> Entry {
    Entry {
        mask: SPECIAL_MASK,
        value: funct,
        operation,
        format: Format::R,
    }
}

const fn i(opcode: u32, operation: Operation) -> Entry {
    Entry {
        mask: OPCODE_MASK,
        value: opcode << 26,
        operation,
        format: Format::I,
    }
}

const fn j(opcode: u32, operation: Operation) -> Entry {
    Entry {
        mask: OPCODE_MASK,
        value: opcode << 26,
        operation,
        format: Format::J,
    }
}

const fn regimm(rt: u32, operation: Operation) -> Entry {
    Entry {
        mask: REGIMM_MASK,
        value: (opcodes::REGIMM << 26) | (rt << 16),
        operation,
        format: Format::I,
    }
}

const fn cop0(mask: u32, value: u32, operation: Operation) -> Entry {
    Entry {
        mask,
        value,
        operation,
        format: Format::Cop0,
    }
}

/// Decode table of the built-in instruction set.
pub const TABLE: &[Entry] = &[
    r(funct::SLL, Operation::Sll),
    r(funct::SRL, Operation::Srl),
    r(funct::SRA, Operation::Sra),
    r(funct::SLLV, Operation::Sllv),
    r(funct::SRLV, Operation::Srlv),
    r(funct::SRAV, Operation::Srav),
    r(funct::JR, Operation::Jr),
    r(funct::JALR, Operation::Jalr),
    r(funct::SYSCALL, Operation::Syscall),
    r(funct::BREAK, Operation::Break),
    r(funct::MFHI, Operation::Mfhi),
    r(funct::MTHI, Operation::Mthi),
    r(funct::MFLO, Operation::Mflo),
    r(funct::MTLO, Operation::Mtlo),
    r(funct::MULT, Operation::Mult),
    r(funct::MULTU, Operation::Multu),
    r(funct::DIV, Operation::Div),
    r(funct::DIVU, Operation::Divu),
    r(funct::ADD, Operation::Add),
    r(funct::ADDU, Operation::Addu),
    r(funct::SUB, Operation::Sub),
    r(funct::SUBU, Operation::Subu),
    r(funct::AND, Operation::And),
    r(funct::OR, Operation::Or),
    r(funct::XOR, Operation::Xor),
    r(funct::NOR, Operation::Nor),
    r(funct::SLT, Operation::Slt),
    r(funct::SLTU, Operation::Sltu),
    Entry {
        mask: SPECIAL_MASK,
        value: (opcodes::SPECIAL2 << 26) | funct::MUL,
        operation: Operation::Mul,
        format: Format::R,
    },
    regimm(0x00, Operation::Bltz),
    regimm(0x01, Operation::Bgez),
    i(opcodes::BEQ, Operation::Beq),
    i(opcodes::BNE, Operation::Bne),
    i(opcodes::BLEZ, Operation::Blez),
    i(opcodes::BGTZ, Operation::Bgtz),
    i(opcodes::ADDI, Operation::Addi),
    i(opcodes::ADDIU, Operation::Addiu),
    i(opcodes::SLTI, Operation::Slti),
    i(opcodes::SLTIU, Operation::Sltiu),
    i(opcodes::ANDI, Operation::Andi),
    i(opcodes::ORI, Operation::Ori),
    i(opcodes::XORI, Operation::Xori),
    i(opcodes::LUI, Operation::Lui),
    i(opcodes::LB, Operation::Lb),
    i(opcodes::LH, Operation::Lh),
    i(opcodes::LW, Operation::Lw),
    i(opcodes::LBU, Operation::Lbu),
    i(opcodes::LHU, Operation::Lhu),
    i(opcodes::SB, Operation::Sb),
    i(opcodes::SH, Operation::Sh),
    i(opcodes::SW, Operation::Sw),
    j(opcodes::J, Operation::J),
    j(opcodes::JAL, Operation::Jal),
    cop0(COP0_MOVE_MASK, opcodes::COP0 << 26, Operation::Mfc0),
    cop0(
        COP0_MOVE_MASK,
        (opcodes::COP0 << 26) | (0x04 << 21),
        Operation::Mtc0,
    ),
    cop0(
        u32::MAX,
        (opcodes::COP0 << 26) | (1 << 25) | funct::ERET,
        Operation::Eret,
    ),
];

/// Finds the table entry of `word`.
pub fn lookup(word: u32) -> Option<&'static Entry> {
    TABLE.iter().find(|entry| entry.matches(word))
}

/// Decoder of the built-in instruction set.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinIsa;

impl InstructionSet for BuiltinIsa {
    fn decode(&self, word: u32) -> Result<Box<dyn InstructionExecution>, Trap> {
        let entry = lookup(word).ok_or_else(Trap::reserved_instruction)?;
        Ok(Box::new(BasicExecution::new(entry.operation, word)))
    }

    fn boxed_clone(&self) -> Box<dyn InstructionSet> {
        Box::new(*self)
    }
}
