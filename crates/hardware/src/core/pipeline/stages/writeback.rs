//! Writeback (WB) Stage.
//!
//! This module implements the final stage of the instruction pipeline. It commits results to
//! the register file and updates the retirement statistics, or converts the exception carried
//! by the slot into a dispatch to the kernel handler. A trap raised by `write_back` itself
//! (a system call with invalid arguments) is dispatched immediately. When no handler is
//! loaded the exception is fatal.

use tracing::error;

use super::{run, stage_trace};
use crate::common::error::{StageError, Trap};
use crate::core::pipeline::engine::TickContext;
use crate::core::pipeline::hazards::ForwardingUnit;
use crate::core::pipeline::latches::{PipelineSlot, Stage};

/// Result of the writeback stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commit {
    /// The instruction retired.
    Retired,
    /// An exception was dispatched; every younger instruction must be flushed.
    Flushed,
    /// An exception could not be dispatched.
    Fatal {
        /// The exception.
        trap: Trap,
        /// Address of the faulting instruction.
        pc: u32,
    },
}

/// Retires `slot`.
///
/// # Arguments
///
/// * `cx` - Per-cycle context.
/// * `forwarding` - Results published this cycle.
/// * `slot` - Instruction leaving the pipeline.
pub fn wb_stage(
    cx: &mut TickContext<'_>,
    forwarding: &mut ForwardingUnit,
    mut slot: PipelineSlot,
) -> Commit {
    if let Some(trap) = slot.exception {
        return take_exception(cx, &slot, trap);
    }
    match run(cx.cpu, forwarding, &mut slot, Stage::WriteBack, &mut None) {
        Ok(()) => {}
        Err(StageError::Trap(trap)) => return take_exception(cx, &slot, trap),
        Err(err) => {
            error!(
                pc = format_args!("{:#010x}", slot.meta.pc),
                mnemonic = slot.execution.mnemonic(),
                %err,
                "writeback failed"
            );
        }
    }
    cx.stats.retire(slot.execution.class());
    stage_trace!(id = slot.meta.id, text = %slot.execution.disassemble(), "WB");
    Commit::Retired
}

fn take_exception(cx: &mut TickContext<'_>, slot: &PipelineSlot, trap: Trap) -> Commit {
    let pc = slot.meta.pc;
    match cx.cpu.dispatch_exception(trap, pc, slot.meta.in_delay_slot) {
        Ok(()) => {
            cx.stats.traps_taken += 1;
            Commit::Flushed
        }
        Err(trap) => Commit::Fatal { trap, pc },
    }
}
