//! Instruction Fetch (IF) Stage.
//!
//! This module implements the first stage of the instruction pipeline. It reads the word at
//! the current PC, advances the PC by one instruction and asks the instruction set for the
//! execution of that word. Fetch address errors and reserved encodings do not stop the
//! pipeline: the slot carries the exception until WriteBack dispatches it.

use super::stage_trace;
use crate::common::constants::INSTRUCTION_SIZE;
use crate::core::cpu::execution::{ExecutionMeta, InvalidExecution};
use crate::core::pipeline::engine::TickContext;
use crate::core::pipeline::latches::PipelineSlot;

/// Fetches the instruction at the PC.
///
/// # Arguments
///
/// * `cx` - Per-cycle context.
/// * `next_id` - Sequence counter of the pipeline; incremented.
/// * `in_delay_slot` - Whether the fetched instruction occupies a branch delay slot.
///
/// # Returns
///
/// A running slot, or a slot carrying the fetch or decode exception.
pub fn fetch_stage(cx: &mut TickContext<'_>, next_id: &mut u64, in_delay_slot: bool) -> PipelineSlot {
    let pc = cx.cpu.pc();
    let id = *next_id;
    *next_id += 1;
    cx.stats.instructions_started += 1;
    cx.cpu.set_pc(pc.wrapping_add(INSTRUCTION_SIZE));

    let word = match cx.cpu.fetch(pc) {
        Ok(word) => word,
        Err(trap) => {
            stage_trace!(id, pc = format_args!("{pc:#010x}"), %trap, "IF fault");
            let meta = ExecutionMeta::new(id, pc, 0, in_delay_slot);
            return PipelineSlot::faulted(Box::new(InvalidExecution), meta, trap);
        }
    };
    let meta = ExecutionMeta::new(id, pc, word, in_delay_slot);
    match cx.isa.decode(word) {
        Ok(execution) => {
            stage_trace!(id, pc = format_args!("{pc:#010x}"), text = %execution.disassemble(), "IF");
            PipelineSlot::new(execution, meta)
        }
        Err(trap) => {
            stage_trace!(id, pc = format_args!("{pc:#010x}"), word, "IF reserved instruction");
            PipelineSlot::faulted(Box::new(InvalidExecution), meta, trap)
        }
    }
}
