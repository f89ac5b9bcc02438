//! Instruction Execution Contract.
//!
//! Every in-flight instruction is an object implementing `InstructionExecution`. The pipeline
//! calls its stage methods in order and never interprets the instruction itself. It provides:
//! 1. **Stages:** `decode`, `execute`, `memory` and `write_back`, each given an `ExecContext`.
//! 2. **Operand protocol:** `requires` captures a source operand when it is safe to read,
//!    `value` insists on it and raises a RAW hazard when it is not yet available.
//! 3. **Locks:** destinations are locked at decode and released when the result commits.
//! 4. **Scheduling hints:** functional unit kind, latency and the retirement check used by
//!    the multi-unit pipeline.

use std::fmt;

use crate::common::error::{StageError, Trap};
use crate::common::reg::RegId;
use crate::config::UnitKind;
use crate::core::Cpu;
use crate::core::pipeline::hazards::ForwardingUnit;
use crate::core::pipeline::latches::Stage;
use crate::stats::InstructionClass;

/// Bookkeeping the pipeline keeps for every in-flight instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionMeta {
    /// Sequence number; older instructions have smaller ids.
    pub id: u64,
    /// Address the instruction was fetched from.
    pub pc: u32,
    /// Raw encoding.
    pub word: u32,
    /// Whether the instruction occupies a branch delay slot.
    pub in_delay_slot: bool,
    /// Whether `decode` has completed.
    pub decoded: bool,
    operands: Vec<(RegId, u32)>,
    locked: Vec<RegId>,
}

impl ExecutionMeta {
    /// Creates the bookkeeping of a freshly fetched instruction.
    pub const fn new(id: u64, pc: u32, word: u32, in_delay_slot: bool) -> Self {
        Self {
            id,
            pc,
            word,
            in_delay_slot,
            decoded: false,
            operands: Vec::new(),
            locked: Vec::new(),
        }
    }

    /// Captured source operands.
    pub fn operands(&self) -> &[(RegId, u32)] {
        &self.operands
    }

    /// Registers this instruction has locked and not yet released.
    pub fn locked(&self) -> &[RegId] {
        &self.locked
    }

    fn operand(&self, register: RegId) -> Option<u32> {
        self.operands
            .iter()
            .find(|(r, _)| *r == register)
            .map(|&(_, v)| v)
    }
}

/// Control transfer requested by a decoding instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JumpRequest {
    /// Destination address.
    pub target: u32,
    /// The transfer has no delay slot even when delay slots are enabled (`ERET`).
    pub compact: bool,
}

/// Everything a stage call may read or mutate.
#[derive(Debug)]
pub struct ExecContext<'a> {
    /// Architectural state.
    pub cpu: &'a mut Cpu,
    /// Results published this cycle.
    pub forwarding: &'a mut ForwardingUnit,
    /// Bookkeeping of the executing instruction.
    pub meta: &'a mut ExecutionMeta,
    /// Stage being executed.
    pub stage: Stage,
    /// Control transfer requested during decode.
    pub jump: &'a mut Option<JumpRequest>,
}

impl ExecContext<'_> {
    /// Sequence number of the executing instruction.
    pub fn id(&self) -> u64 {
        self.meta.id
    }

    /// Address of the executing instruction.
    pub fn pc(&self) -> u32 {
        self.meta.pc
    }

    /// Value of `register` as seen by this instruction, if available now.
    ///
    /// The committed value is valid when no older instruction holds a lock. Otherwise only
    /// a forwarded result of the youngest older locker will do.
    fn resolve(&self, register: RegId) -> Option<u32> {
        if register == RegId::ZERO {
            return Some(0);
        }
        let reg = self.cpu.regs.register(register);
        match reg.last_locker_before(self.meta.id) {
            None => Some(reg.value()),
            Some(producer) => self.forwarding.lookup(register, producer),
        }
    }

    /// Captures `register` if it can be read safely now. Never stalls.
    ///
    /// Missing operands are retried by [`ExecContext::value`].
    pub fn requires(&mut self, register: RegId) {
        if self.meta.operand(register).is_some() {
            return;
        }
        if let Some(value) = self.resolve(register) {
            self.meta.operands.push((register, value));
        }
    }

    /// Value of a source operand.
    ///
    /// # Returns
    ///
    /// The captured or newly resolved value, or `StageError::RawHazard` if an older
    /// instruction will still write it and no forwarded result is available.
    pub fn value(&mut self, register: RegId) -> Result<u32, StageError> {
        if let Some(value) = self.meta.operand(register) {
            return Ok(value);
        }
        match self.resolve(register) {
            Some(value) => {
                self.meta.operands.push((register, value));
                Ok(value)
            }
            None => Err(StageError::RawHazard { register }),
        }
    }

    /// Locks `register` on behalf of this instruction. Idempotent.
    pub fn lock(&mut self, register: RegId) {
        if register == RegId::ZERO || self.meta.locked.contains(&register) {
            return;
        }
        self.cpu
            .regs
            .lock(register, self.meta.id, &mut self.cpu.journal);
        self.meta.locked.push(register);
    }

    /// Releases the lock this instruction holds on `register`.
    pub fn unlock(&mut self, register: RegId) {
        self.cpu
            .regs
            .unlock(register, self.meta.id, &mut self.cpu.journal);
        self.meta.locked.retain(|&r| r != register);
    }

    /// Commits `value` to `register` and releases the lock.
    pub fn set_and_unlock(&mut self, register: RegId, value: u32) {
        self.cpu
            .regs
            .set_and_unlock(register, value, self.meta.id, &mut self.cpu.journal);
        self.meta.locked.retain(|&r| r != register);
    }

    /// Publishes a result for dependent instructions. No-op when forwarding is disabled.
    pub fn forward(&mut self, register: RegId, value: u32) {
        if self.cpu.options.forwarding && register != RegId::ZERO {
            self.forwarding
                .publish(self.stage, register, value, self.meta.id);
        }
    }

    /// Requests a control transfer to `target`.
    pub fn jump(&mut self, target: u32, compact: bool) {
        *self.jump = Some(JumpRequest { target, compact });
    }

    /// Address of the instruction after the delay slot, or the next one without delay slots.
    pub const fn return_address(&self) -> u32 {
        if self.cpu.options.delay_slots {
            self.meta.pc.wrapping_add(8)
        } else {
            self.meta.pc.wrapping_add(4)
        }
    }

    /// Loads a byte.
    pub fn read_byte(&mut self, address: u32) -> Result<u8, StageError> {
        Ok(self.cpu.read_byte(address)?)
    }

    /// Loads a half-word.
    pub fn read_half(&mut self, address: u32) -> Result<u16, StageError> {
        Ok(self.cpu.read_half(address)?)
    }

    /// Loads a word.
    pub fn read_word(&mut self, address: u32) -> Result<u32, StageError> {
        Ok(self.cpu.read_word(address)?)
    }

    /// Stores a byte.
    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), StageError> {
        Ok(self.cpu.write_byte(address, value)?)
    }

    /// Stores a half-word.
    pub fn write_half(&mut self, address: u32, value: u16) -> Result<(), StageError> {
        Ok(self.cpu.write_half(address, value)?)
    }

    /// Stores a word.
    pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), StageError> {
        Ok(self.cpu.write_word(address, value)?)
    }
}

/// Behaviour of one in-flight instruction across the pipeline stages.
pub trait InstructionExecution: fmt::Debug + Send {
    /// Reads operands, locks destinations and resolves control transfers.
    fn decode(&mut self, cx: &mut ExecContext<'_>) -> Result<(), StageError>;

    /// Computes the result or the memory address.
    fn execute(&mut self, cx: &mut ExecContext<'_>) -> Result<(), StageError>;

    /// Performs the memory access, if any.
    fn memory(&mut self, cx: &mut ExecContext<'_>) -> Result<(), StageError>;

    /// Commits results and releases locks.
    fn write_back(&mut self, cx: &mut ExecContext<'_>) -> Result<(), StageError>;

    /// Whether this instruction may leave its execution unit for the Memory stage.
    ///
    /// Refuses while an older instruction still holds a lock on a register this one writes.
    fn can_move_to_memory(&self, cpu: &Cpu, meta: &ExecutionMeta) -> bool {
        meta.locked()
            .iter()
            .all(|&r| !cpu.regs.register(r).is_locked_before(meta.id))
    }

    /// Cycles spent in an execution unit, `None` for the unit's configured latency.
    fn cycles_required(&self) -> Option<u32> {
        None
    }

    /// Functional unit the instruction needs.
    fn unit_kind(&self) -> UnitKind {
        UnitKind::Integer
    }

    /// Category for the instruction mix.
    fn class(&self) -> InstructionClass {
        InstructionClass::Alu
    }

    /// Whether the instruction is a branch or jump.
    fn is_control_transfer(&self) -> bool {
        false
    }

    /// Assembly mnemonic.
    fn mnemonic(&self) -> &'static str;

    /// Human-readable form with operands.
    fn disassemble(&self) -> String {
        self.mnemonic().to_owned()
    }

    /// Clones the execution behind a box.
    fn boxed_clone(&self) -> Box<dyn InstructionExecution>;
}

impl Clone for Box<dyn InstructionExecution> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Decoder from instruction words to executions.
pub trait InstructionSet: fmt::Debug + Send {
    /// Decodes `word`, or reports a reserved instruction.
    fn decode(&self, word: u32) -> Result<Box<dyn InstructionExecution>, Trap>;

    /// Clones the decoder behind a box.
    fn boxed_clone(&self) -> Box<dyn InstructionSet>;
}

impl Clone for Box<dyn InstructionSet> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Placeholder execution for an instruction that faulted before it could be decoded.
///
/// Its stages do nothing; the pending exception carried by the slot is dispatched when it
/// reaches WriteBack.
#[derive(Clone, Copy, Debug, Default)]
pub struct InvalidExecution;

impl InstructionExecution for InvalidExecution {
    fn decode(&mut self, _cx: &mut ExecContext<'_>) -> Result<(), StageError> {
        Ok(())
    }

    fn execute(&mut self, _cx: &mut ExecContext<'_>) -> Result<(), StageError> {
        Ok(())
    }

    fn memory(&mut self, _cx: &mut ExecContext<'_>) -> Result<(), StageError> {
        Ok(())
    }

    fn write_back(&mut self, _cx: &mut ExecContext<'_>) -> Result<(), StageError> {
        Ok(())
    }

    fn class(&self) -> InstructionClass {
        InstructionClass::System
    }

    fn mnemonic(&self) -> &'static str {
        "invalid"
    }

    fn boxed_clone(&self) -> Box<dyn InstructionExecution> {
        Box::new(*self)
    }
}
