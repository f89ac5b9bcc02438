//! Pipeline stage implementations.
//!
//! This module contains the stage logic shared by every pipeline organisation. It includes:
//! 1. **Fetch:** Reads the word at the PC and decodes it into an in-flight execution.
//! 2. **Decode:** Runs `decode`, enforces the delay-slot rule and redirects fetch on jumps.
//! 3. **Execute and Memory:** Run the instruction's stage call and record traps in the slot.
//! 4. **Writeback:** Commits, or dispatches the pending exception to the kernel handler.
//!
//! Host faults raised by an instruction are logged with its PC and mnemonic and the effect of
//! that stage call is discarded; the simulation continues.

/// Instruction decode stage implementation.
pub mod decode;

/// Instruction fetch stage implementation.
pub mod fetch;

/// Writeback stage implementation.
pub mod writeback;

use tracing::error;

use crate::common::error::StageError;
use crate::core::Cpu;
use crate::core::cpu::execution::{ExecContext, JumpRequest};
use crate::core::pipeline::hazards::ForwardingUnit;
use crate::core::pipeline::latches::{PipelineSlot, SlotStatus, Stage};
use crate::stats::SimStats;

pub use decode::{DecodeOutcome, decode_stage};
pub use fetch::fetch_stage;
pub use writeback::{Commit, wb_stage};

/// Emits a per-stage trace event in debug builds or with the `always-trace` feature.
macro_rules! stage_trace {
    ($($arg:tt)*) => {
        if cfg!(any(debug_assertions, feature = "always-trace")) {
            tracing::trace!($($arg)*);
        }
    };
}
pub(crate) use stage_trace;

/// Calls the `stage` method of the slot's execution.
///
/// # Returns
///
/// `Err` with a trap or a RAW hazard. Host faults are logged here and reported as success.
pub(crate) fn run(
    cpu: &mut Cpu,
    forwarding: &mut ForwardingUnit,
    slot: &mut PipelineSlot,
    stage: Stage,
    jump: &mut Option<JumpRequest>,
) -> Result<(), StageError> {
    let PipelineSlot {
        execution, meta, ..
    } = &mut *slot;
    let mut cx = ExecContext {
        cpu,
        forwarding,
        meta,
        stage,
        jump,
    };
    let result = match stage {
        Stage::Fetch => Ok(()),
        Stage::Decode => execution.decode(&mut cx),
        Stage::Execute => execution.execute(&mut cx),
        Stage::Memory => execution.memory(&mut cx),
        Stage::WriteBack => execution.write_back(&mut cx),
    };
    match result {
        Err(StageError::Fault(message)) => {
            error!(
                pc = format_args!("{:#010x}", slot.meta.pc),
                mnemonic = slot.execution.mnemonic(),
                %stage,
                %message,
                "host fault, stage effect discarded"
            );
            Ok(())
        }
        other => other,
    }
}

/// Runs the Execute stage of `slot`.
///
/// # Returns
///
/// `false` if a RAW hazard holds the instruction in Execute.
pub fn execute_stage(
    cpu: &mut Cpu,
    forwarding: &mut ForwardingUnit,
    stats: &mut SimStats,
    slot: &mut PipelineSlot,
) -> bool {
    if slot.exception.is_some() {
        slot.status = SlotStatus::Executed;
        return true;
    }
    match run(cpu, forwarding, slot, Stage::Execute, &mut None) {
        Ok(()) => slot.status = SlotStatus::Executed,
        Err(StageError::RawHazard { register }) => {
            stage_trace!(id = slot.meta.id, %register, "execute RAW stall");
            slot.status = SlotStatus::Raw;
            stats.stalls_raw += 1;
            return false;
        }
        Err(StageError::Trap(trap)) => {
            slot.exception = Some(trap);
            slot.status = SlotStatus::Executed;
        }
        Err(StageError::Fault(_)) => slot.status = SlotStatus::Executed,
    }
    stage_trace!(id = slot.meta.id, text = %slot.execution.disassemble(), "EX");
    true
}

/// Runs the Memory stage of `slot`, capturing a trap for WriteBack.
pub fn mem_stage(cpu: &mut Cpu, forwarding: &mut ForwardingUnit, slot: &mut PipelineSlot) {
    if slot.exception.is_some() {
        return;
    }
    match run(cpu, forwarding, slot, Stage::Memory, &mut None) {
        Err(StageError::Trap(trap)) => slot.exception = Some(trap),
        Err(StageError::RawHazard { register }) => {
            error!(
                pc = format_args!("{:#010x}", slot.meta.pc),
                mnemonic = slot.execution.mnemonic(),
                %register,
                "operand read in Memory stage was not available"
            );
        }
        Ok(()) | Err(StageError::Fault(_)) => {}
    }
    stage_trace!(id = slot.meta.id, text = %slot.execution.disassemble(), "MEM");
}
