//! Built-in Instruction Executions.
//!
//! `BasicExecution` implements the stage behaviour of every operation in the decode table:
//! 1. **Decode:** captures source operands, locks destinations and resolves branches and jumps.
//! 2. **Execute:** ALU, shifts, multiply/divide, address generation and the overflow checks.
//! 3. **Memory:** loads with sign or zero extension and stores.
//! 4. **WriteBack:** commits destinations, runs system calls and leaves exception level.
//!
//! ALU results are forwarded from Execute and again from Memory; loads forward from Memory.
//! HI and LO are only visible once committed.

use crate::common::error::{StageError, Trap};
use crate::common::reg::RegId;
use crate::config::UnitKind;
use crate::core::cpu::execution::{ExecContext, InstructionExecution};
use crate::isa::decode::Operation;
use crate::isa::disasm;
use crate::isa::instruction::Decoded;
use crate::isa::privileged::cause::InterruptCause;
use crate::isa::privileged::cop0::STATUS_EXL;
use crate::stats::InstructionClass;

/// In-flight instance of a built-in operation.
#[derive(Clone, Debug)]
pub struct BasicExecution {
    op: Operation,
    fields: Decoded,
    result: u32,
    hi: u32,
    lo: u32,
    address: u32,
    store_value: u32,
}

impl BasicExecution {
    /// Creates the execution of `op` encoded as `word`.
    pub fn new(op: Operation, word: u32) -> Self {
        Self {
            op,
            fields: Decoded::new(word),
            result: 0,
            hi: 0,
            lo: 0,
            address: 0,
            store_value: 0,
        }
    }

    /// Operation being executed.
    pub const fn operation(&self) -> Operation {
        self.op
    }

    const fn rs(&self) -> RegId {
        RegId::gpr(self.fields.rs)
    }

    const fn rt(&self) -> RegId {
        RegId::gpr(self.fields.rt)
    }

    const fn rd(&self) -> RegId {
        RegId::gpr(self.fields.rd)
    }

    /// COP0 register named by the `rd` field, if modelled.
    const fn cop0_register(&self) -> Option<RegId> {
        RegId::cop0(self.fields.rd)
    }

    /// Registers read by the operation.
    fn sources(&self) -> Vec<RegId> {
        use Operation as O;
        match self.op {
            O::Sll | O::Srl | O::Sra => vec![self.rt()],
            O::Sllv
            | O::Srlv
            | O::Srav
            | O::Mult
            | O::Multu
            | O::Div
            | O::Divu
            | O::Add
            | O::Addu
            | O::Sub
            | O::Subu
            | O::And
            | O::Or
            | O::Xor
            | O::Nor
            | O::Slt
            | O::Sltu
            | O::Mul
            | O::Beq
            | O::Bne
            | O::Sb
            | O::Sh
            | O::Sw => vec![self.rs(), self.rt()],
            O::Jr
            | O::Jalr
            | O::Mthi
            | O::Mtlo
            | O::Bltz
            | O::Bgez
            | O::Blez
            | O::Bgtz
            | O::Addi
            | O::Addiu
            | O::Slti
            | O::Sltiu
            | O::Andi
            | O::Ori
            | O::Xori
            | O::Lb
            | O::Lh
            | O::Lw
            | O::Lbu
            | O::Lhu => vec![self.rs()],
            O::Mfhi => vec![RegId::HI],
            O::Mflo => vec![RegId::LO],
            O::Mfc0 => self.cop0_register().into_iter().collect(),
            O::Mtc0 => vec![self.rt()],
            O::Eret => vec![RegId::EPC],
            O::Syscall | O::Break | O::Lui | O::J | O::Jal => Vec::new(),
        }
    }

    /// Registers written by the operation.
    fn destinations(&self, kernel_syscalls: bool) -> Vec<RegId> {
        use Operation as O;
        match self.op {
            O::Sll
            | O::Srl
            | O::Sra
            | O::Sllv
            | O::Srlv
            | O::Srav
            | O::Mfhi
            | O::Mflo
            | O::Add
            | O::Addu
            | O::Sub
            | O::Subu
            | O::And
            | O::Or
            | O::Xor
            | O::Nor
            | O::Slt
            | O::Sltu
            | O::Mul
            | O::Jalr => vec![self.rd()],
            O::Addi
            | O::Addiu
            | O::Slti
            | O::Sltiu
            | O::Andi
            | O::Ori
            | O::Xori
            | O::Lui
            | O::Lb
            | O::Lh
            | O::Lw
            | O::Lbu
            | O::Lhu
            | O::Mfc0 => vec![self.rt()],
            O::Jal => vec![RegId::RA],
            O::Mthi => vec![RegId::HI],
            O::Mtlo => vec![RegId::LO],
            O::Mult | O::Multu | O::Div | O::Divu => vec![RegId::HI, RegId::LO],
            O::Mtc0 => self.cop0_register().into_iter().collect(),
            O::Eret => vec![RegId::STATUS],
            O::Syscall if !kernel_syscalls => vec![RegId::V0, RegId::A0],
            O::Syscall
            | O::Break
            | O::Jr
            | O::Bltz
            | O::Bgez
            | O::Beq
            | O::Bne
            | O::Blez
            | O::Bgtz
            | O::Sb
            | O::Sh
            | O::Sw
            | O::J => Vec::new(),
        }
    }

    /// Destination that receives `result`, for forwarding and commit.
    fn result_register(&self) -> Option<RegId> {
        use Operation as O;
        match self.op {
            O::Mult | O::Multu | O::Div | O::Divu | O::Syscall | O::Eret => None,
            O::Mthi => Some(RegId::HI),
            O::Mtlo => Some(RegId::LO),
            _ => self.destinations(true).first().copied(),
        }
    }

    const fn branch_target(&self, pc: u32) -> u32 {
        pc.wrapping_add(4).wrapping_add(self.fields.simm << 2)
    }

    const fn jump_target(&self, pc: u32) -> u32 {
        (pc.wrapping_add(4) & 0xF000_0000) | (self.fields.target << 2)
    }

    /// Resolves a branch or jump. Operands must be available now.
    fn resolve_control(&mut self, cx: &mut ExecContext<'_>) -> Result<(), StageError> {
        use Operation as O;
        let pc = cx.pc();
        let taken = match self.op {
            O::Beq => cx.value(self.rs())? == cx.value(self.rt())?,
            O::Bne => cx.value(self.rs())? != cx.value(self.rt())?,
            O::Bltz => (cx.value(self.rs())? as i32) < 0,
            O::Bgez => (cx.value(self.rs())? as i32) >= 0,
            O::Blez => (cx.value(self.rs())? as i32) <= 0,
            O::Bgtz => (cx.value(self.rs())? as i32) > 0,
            O::J => {
                cx.jump(self.jump_target(pc), false);
                return Ok(());
            }
            O::Jal => {
                self.result = cx.return_address();
                cx.jump(self.jump_target(pc), false);
                return Ok(());
            }
            O::Jr => {
                let target = cx.value(self.rs())?;
                cx.jump(target, false);
                return Ok(());
            }
            O::Jalr => {
                let target = cx.value(self.rs())?;
                self.result = cx.return_address();
                cx.jump(target, false);
                return Ok(());
            }
            O::Eret => {
                let target = cx.value(RegId::EPC)?;
                cx.jump(target, true);
                return Ok(());
            }
            _ => return Ok(()),
        };
        if taken {
            cx.jump(self.branch_target(pc), false);
        }
        Ok(())
    }

    fn alu(&mut self, cx: &mut ExecContext<'_>) -> Result<u32, StageError> {
        use Operation as O;
        let f = self.fields;
        let overflow = || StageError::Trap(Trap::new(InterruptCause::ArithmeticOverflow));
        Ok(match self.op {
            O::Sll => cx.value(self.rt())? << f.shamt,
            O::Srl => cx.value(self.rt())? >> f.shamt,
            O::Sra => ((cx.value(self.rt())? as i32) >> f.shamt) as u32,
            O::Sllv => {
                let s = cx.value(self.rs())? & 0x1F;
                cx.value(self.rt())? << s
            }
            O::Srlv => {
                let s = cx.value(self.rs())? & 0x1F;
                cx.value(self.rt())? >> s
            }
            O::Srav => {
                let s = cx.value(self.rs())? & 0x1F;
                ((cx.value(self.rt())? as i32) >> s) as u32
            }
            O::Add => {
                let a = cx.value(self.rs())? as i32;
                let b = cx.value(self.rt())? as i32;
                a.checked_add(b).ok_or_else(overflow)? as u32
            }
            O::Addu => cx.value(self.rs())?.wrapping_add(cx.value(self.rt())?),
            O::Sub => {
                let a = cx.value(self.rs())? as i32;
                let b = cx.value(self.rt())? as i32;
                a.checked_sub(b).ok_or_else(overflow)? as u32
            }
            O::Subu => cx.value(self.rs())?.wrapping_sub(cx.value(self.rt())?),
            O::And => cx.value(self.rs())? & cx.value(self.rt())?,
            O::Or => cx.value(self.rs())? | cx.value(self.rt())?,
            O::Xor => cx.value(self.rs())? ^ cx.value(self.rt())?,
            O::Nor => !(cx.value(self.rs())? | cx.value(self.rt())?),
            O::Slt => u32::from((cx.value(self.rs())? as i32) < (cx.value(self.rt())? as i32)),
            O::Sltu => u32::from(cx.value(self.rs())? < cx.value(self.rt())?),
            O::Mul => (cx.value(self.rs())? as i32).wrapping_mul(cx.value(self.rt())? as i32) as u32,
            O::Addi => (cx.value(self.rs())? as i32)
                .checked_add(f.simm as i32)
                .ok_or_else(overflow)? as u32,
            O::Addiu => cx.value(self.rs())?.wrapping_add(f.simm),
            O::Slti => u32::from((cx.value(self.rs())? as i32) < (f.simm as i32)),
            O::Sltiu => u32::from(cx.value(self.rs())? < f.simm),
            O::Andi => cx.value(self.rs())? & f.imm,
            O::Ori => cx.value(self.rs())? | f.imm,
            O::Xori => cx.value(self.rs())? ^ f.imm,
            O::Lui => f.imm << 16,
            O::Mfhi => cx.value(RegId::HI)?,
            O::Mflo => cx.value(RegId::LO)?,
            O::Mthi | O::Mtlo => cx.value(self.rs())?,
            O::Mfc0 => match self.cop0_register() {
                Some(register) => cx.value(register)?,
                None => 0,
            },
            O::Mtc0 => cx.value(self.rt())?,
            _ => self.result,
        })
    }

    fn multiply_divide(&mut self, cx: &mut ExecContext<'_>) -> Result<(), StageError> {
        let a = cx.value(self.rs())?;
        let b = cx.value(self.rt())?;
        let (hi, lo) = match self.op {
            Operation::Mult => {
                let p = i64::from(a as i32) * i64::from(b as i32);
                ((p >> 32) as u32, p as u32)
            }
            Operation::Multu => {
                let p = u64::from(a) * u64::from(b);
                ((p >> 32) as u32, p as u32)
            }
            // division by zero leaves an unpredictable result; zero is used
            Operation::Div | Operation::Divu if b == 0 => (0, 0),
            Operation::Div => {
                let (a, b) = (a as i32, b as i32);
                (a.wrapping_rem(b) as u32, a.wrapping_div(b) as u32)
            }
            _ => (a % b, a / b),
        };
        self.hi = hi;
        self.lo = lo;
        Ok(())
    }

    const fn is_load(&self) -> bool {
        matches!(
            self.op,
            Operation::Lb | Operation::Lh | Operation::Lw | Operation::Lbu | Operation::Lhu
        )
    }

    const fn is_store(&self) -> bool {
        matches!(self.op, Operation::Sb | Operation::Sh | Operation::Sw)
    }

    const fn is_multiply_divide(&self) -> bool {
        matches!(
            self.op,
            Operation::Mult | Operation::Multu | Operation::Div | Operation::Divu
        )
    }
}

impl InstructionExecution for BasicExecution {
    fn decode(&mut self, cx: &mut ExecContext<'_>) -> Result<(), StageError> {
        for register in self.sources() {
            cx.requires(register);
        }
        // operands of control transfers are read before any lock is taken, so a RAW retry
        // leaves no trace
        if self.op.is_control_transfer() {
            self.resolve_control(cx)?;
        }
        for register in self.destinations(cx.cpu.options.kernel_syscalls) {
            cx.lock(register);
        }
        Ok(())
    }

    fn execute(&mut self, cx: &mut ExecContext<'_>) -> Result<(), StageError> {
        match self.op {
            Operation::Syscall if cx.cpu.options.kernel_syscalls => {
                Err(Trap::new(InterruptCause::Syscall).into())
            }
            Operation::Break => Err(Trap::new(InterruptCause::Breakpoint).into()),
            Operation::Syscall | Operation::Eret => Ok(()),
            _ if self.is_multiply_divide() => self.multiply_divide(cx),
            _ if self.is_load() || self.is_store() => {
                self.address = cx.value(self.rs())?.wrapping_add(self.fields.simm);
                if self.is_store() {
                    self.store_value = cx.value(self.rt())?;
                }
                Ok(())
            }
            _ => {
                self.result = self.alu(cx)?;
                if let Some(register) = self.result_register().filter(|r| r.is_gpr()) {
                    cx.forward(register, self.result);
                }
                Ok(())
            }
        }
    }

    fn memory(&mut self, cx: &mut ExecContext<'_>) -> Result<(), StageError> {
        let address = self.address;
        match self.op {
            Operation::Lb => self.result = cx.read_byte(address)? as i8 as i32 as u32,
            Operation::Lbu => self.result = u32::from(cx.read_byte(address)?),
            Operation::Lh => self.result = cx.read_half(address)? as i16 as i32 as u32,
            Operation::Lhu => self.result = u32::from(cx.read_half(address)?),
            Operation::Lw => self.result = cx.read_word(address)?,
            Operation::Sb => return cx.write_byte(address, self.store_value as u8),
            Operation::Sh => return cx.write_half(address, self.store_value as u16),
            Operation::Sw => return cx.write_word(address, self.store_value),
            _ => {}
        }
        if let Some(register) = self.result_register().filter(|r| r.is_gpr()) {
            cx.forward(register, self.result);
        }
        Ok(())
    }

    fn write_back(&mut self, cx: &mut ExecContext<'_>) -> Result<(), StageError> {
        match self.op {
            Operation::Syscall if !cx.cpu.options.kernel_syscalls => {
                let code = cx.cpu.regs.get(RegId::V0);
                let result = cx.cpu.syscall(code)?;
                match result.v0 {
                    Some(value) => cx.set_and_unlock(RegId::V0, value),
                    None => cx.unlock(RegId::V0),
                }
                match result.a0 {
                    Some(value) => cx.set_and_unlock(RegId::A0, value),
                    None => cx.unlock(RegId::A0),
                }
            }
            Operation::Eret => {
                let status = cx.cpu.regs.get(RegId::STATUS) & !STATUS_EXL;
                cx.set_and_unlock(RegId::STATUS, status);
            }
            _ if self.is_multiply_divide() => {
                cx.set_and_unlock(RegId::HI, self.hi);
                cx.set_and_unlock(RegId::LO, self.lo);
            }
            _ => {
                if let Some(register) = self.result_register() {
                    cx.set_and_unlock(register, self.result);
                }
            }
        }
        Ok(())
    }

    fn unit_kind(&self) -> UnitKind {
        self.op.unit()
    }

    fn class(&self) -> InstructionClass {
        self.op.class()
    }

    fn is_control_transfer(&self) -> bool {
        self.op.is_control_transfer()
    }

    fn mnemonic(&self) -> &'static str {
        self.op.mnemonic()
    }

    fn disassemble(&self) -> String {
        disasm::format(self.op, &self.fields)
    }

    fn boxed_clone(&self) -> Box<dyn InstructionExecution> {
        Box::new(self.clone())
    }
}
