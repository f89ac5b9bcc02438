//! Instruction encoding and decoding utilities.
//!
//! Provides bit extraction functions and structures for decoding
//! MIPS32 instruction fields from 32-bit instruction encodings.

/// Bit shift of the primary opcode field (bits 26-31).
pub const OPCODE_SHIFT: u32 = 26;
/// Bit mask for a register field after shifting (5 bits).
pub const REG_MASK: u32 = 0x1F;
/// Bit mask for the function field (bits 0-5).
pub const FUNCT_MASK: u32 = 0x3F;
/// Bit mask for the 16-bit immediate (bits 0-15).
pub const IMM_MASK: u32 = 0xFFFF;
/// Bit mask for the 26-bit jump target (bits 0-25).
pub const TARGET_MASK: u32 = 0x03FF_FFFF;

/// Trait for extracting instruction fields from encoded instructions.
///
/// Provides methods to extract all standard MIPS32 instruction fields
/// from a 32-bit instruction encoding.
pub trait InstructionBits {
    /// Extracts the primary opcode field (bits 26-31).
    fn opcode(&self) -> u32;

    /// Extracts the `rs` source register field (bits 21-25).
    ///
    /// Also carries the COP0 sub-opcode (`MF`, `MT`, `CO`).
    fn rs(&self) -> u32;

    /// Extracts the `rt` register field (bits 16-20).
    ///
    /// Destination of I-type instructions, second source of R-type ones and the
    /// sub-opcode of `REGIMM` branches.
    fn rt(&self) -> u32;

    /// Extracts the `rd` destination register field (bits 11-15).
    fn rd(&self) -> u32;

    /// Extracts the shift amount field (bits 6-10).
    fn shamt(&self) -> u32;

    /// Extracts the function field (bits 0-5).
    fn funct(&self) -> u32;

    /// Extracts the 16-bit immediate, zero-extended.
    fn imm(&self) -> u32;

    /// Extracts the 16-bit immediate, sign-extended.
    fn simm(&self) -> u32;

    /// Extracts the 26-bit jump target index.
    fn target(&self) -> u32;
}

impl InstructionBits for u32 {
    #[inline(always)]
    fn opcode(&self) -> u32 {
        self >> OPCODE_SHIFT
    }

    #[inline(always)]
    fn rs(&self) -> u32 {
        (self >> 21) & REG_MASK
    }

    #[inline(always)]
    fn rt(&self) -> u32 {
        (self >> 16) & REG_MASK
    }

    #[inline(always)]
    fn rd(&self) -> u32 {
        (self >> 11) & REG_MASK
    }

    #[inline(always)]
    fn shamt(&self) -> u32 {
        (self >> 6) & REG_MASK
    }

    #[inline(always)]
    fn funct(&self) -> u32 {
        self & FUNCT_MASK
    }

    #[inline(always)]
    fn imm(&self) -> u32 {
        self & IMM_MASK
    }

    /// Sign-extends bit 15 through the upper half-word.
    #[inline(always)]
    fn simm(&self) -> u32 {
        (*self as u16 as i16) as i32 as u32
    }

    #[inline(always)]
    fn target(&self) -> u32 {
        self & TARGET_MASK
    }
}

/// Encoding format of a MIPS32 instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Register format: `op | rs | rt | rd | shamt | funct`.
    R,
    /// Immediate format: `op | rs | rt | imm16`.
    I,
    /// Jump format: `op | target26`.
    J,
    /// Coprocessor 0 format: `COP0 | sub | rt | rd | 0 | funct`.
    Cop0,
}

/// Decoded instruction structure containing all extracted fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Raw 32-bit instruction encoding.
    pub raw: u32,
    /// `rs` field.
    pub rs: u32,
    /// `rt` field.
    pub rt: u32,
    /// `rd` field.
    pub rd: u32,
    /// Shift amount.
    pub shamt: u32,
    /// Sign-extended immediate.
    pub simm: u32,
    /// Zero-extended immediate.
    pub imm: u32,
    /// Jump target index.
    pub target: u32,
}

impl Decoded {
    /// Extracts every field of `raw`.
    pub fn new(raw: u32) -> Self {
        Self {
            raw,
            rs: raw.rs(),
            rt: raw.rt(),
            rd: raw.rd(),
            shamt: raw.shamt(),
            simm: raw.simm(),
            imm: raw.imm(),
            target: raw.target(),
        }
    }
}
