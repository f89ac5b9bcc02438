//! Minimal MIPS32 assembler for test programs.
//!
//! Register operands are plain numbers (`T0` is 8). Branch offsets are in instructions,
//! relative to the instruction after the branch; jump targets are byte addresses.

use mipsim_core::isa::decode::{funct, opcodes};

pub const ZERO: u32 = 0;
pub const V0: u32 = 2;
pub const A0: u32 = 4;
pub const A1: u32 = 5;
pub const A2: u32 = 6;
pub const T0: u32 = 8;
pub const T1: u32 = 9;
pub const T2: u32 = 10;
pub const T3: u32 = 11;
pub const T4: u32 = 12;
pub const S0: u32 = 16;
pub const S1: u32 = 17;
pub const K0: u32 = 26;
pub const RA: u32 = 31;

fn r(rs: u32, rt: u32, rd: u32, shamt: u32, function: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | (shamt << 6) | function
}

fn i(opcode: u32, rs: u32, rt: u32, imm: i32) -> u32 {
    (opcode << 26) | (rs << 21) | (rt << 16) | (imm as u32 & 0xFFFF)
}

pub fn nop() -> u32 {
    0
}

pub fn addu(rd: u32, rs: u32, rt: u32) -> u32 {
    r(rs, rt, rd, 0, funct::ADDU)
}

pub fn add(rd: u32, rs: u32, rt: u32) -> u32 {
    r(rs, rt, rd, 0, funct::ADD)
}

pub fn subu(rd: u32, rs: u32, rt: u32) -> u32 {
    r(rs, rt, rd, 0, funct::SUBU)
}

pub fn slt(rd: u32, rs: u32, rt: u32) -> u32 {
    r(rs, rt, rd, 0, funct::SLT)
}

pub fn sll(rd: u32, rt: u32, shamt: u32) -> u32 {
    r(0, rt, rd, shamt, funct::SLL)
}

pub fn mult(rs: u32, rt: u32) -> u32 {
    r(rs, rt, 0, 0, funct::MULT)
}

pub fn div(rs: u32, rt: u32) -> u32 {
    r(rs, rt, 0, 0, funct::DIV)
}

/// `mul rd, rs, rt` (SPECIAL2).
pub fn mul(rd: u32, rs: u32, rt: u32) -> u32 {
    (opcodes::SPECIAL2 << 26) | r(rs, rt, rd, 0, funct::MUL)
}

pub fn mflo(rd: u32) -> u32 {
    r(0, 0, rd, 0, funct::MFLO)
}

pub fn mfhi(rd: u32) -> u32 {
    r(0, 0, rd, 0, funct::MFHI)
}

pub fn jr(rs: u32) -> u32 {
    r(rs, 0, 0, 0, funct::JR)
}

pub fn syscall() -> u32 {
    funct::SYSCALL
}

pub fn brk() -> u32 {
    funct::BREAK
}

pub fn addiu(rt: u32, rs: u32, imm: i32) -> u32 {
    i(opcodes::ADDIU, rs, rt, imm)
}

pub fn addi(rt: u32, rs: u32, imm: i32) -> u32 {
    i(opcodes::ADDI, rs, rt, imm)
}

pub fn ori(rt: u32, rs: u32, imm: u32) -> u32 {
    i(opcodes::ORI, rs, rt, imm as i32)
}

pub fn lui(rt: u32, imm: u32) -> u32 {
    i(opcodes::LUI, 0, rt, imm as i32)
}

pub fn lw(rt: u32, offset: i32, base: u32) -> u32 {
    i(opcodes::LW, base, rt, offset)
}

pub fn sw(rt: u32, offset: i32, base: u32) -> u32 {
    i(opcodes::SW, base, rt, offset)
}

pub fn lb(rt: u32, offset: i32, base: u32) -> u32 {
    i(opcodes::LB, base, rt, offset)
}

pub fn beq(rs: u32, rt: u32, offset: i32) -> u32 {
    i(opcodes::BEQ, rs, rt, offset)
}

pub fn bne(rs: u32, rt: u32, offset: i32) -> u32 {
    i(opcodes::BNE, rs, rt, offset)
}

pub fn j(target: u32) -> u32 {
    (opcodes::J << 26) | ((target >> 2) & 0x03FF_FFFF)
}

pub fn jal(target: u32) -> u32 {
    (opcodes::JAL << 26) | ((target >> 2) & 0x03FF_FFFF)
}

pub fn mfc0(rt: u32, rd: u32) -> u32 {
    (opcodes::COP0 << 26) | (rt << 16) | (rd << 11)
}

pub fn mtc0(rt: u32, rd: u32) -> u32 {
    (opcodes::COP0 << 26) | (0x04 << 21) | (rt << 16) | (rd << 11)
}

pub fn eret() -> u32 {
    (opcodes::COP0 << 26) | (1 << 25) | funct::ERET
}

/// `lui` + `ori` pair loading a full address.
pub fn la(rt: u32, address: u32) -> [u32; 2] {
    [lui(rt, address >> 16), ori(rt, rt, address & 0xFFFF)]
}

/// `$v0 = service; syscall`.
pub fn call(service: u32) -> [u32; 2] {
    [addiu(V0, ZERO, service as i32), syscall()]
}

/// `exit(code)` through service 17.
pub fn exit_with(code: i32) -> [u32; 3] {
    [addiu(A0, ZERO, code), addiu(V0, ZERO, 17), syscall()]
}
