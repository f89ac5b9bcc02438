//! Instruction Decode (ID) Stage.
//!
//! This module implements the second stage of the pipeline. It performs the following:
//! 1. **Delay-slot rule:** a branch or jump inside a delay slot is a reserved instruction.
//! 2. **Decoding:** calls `decode`, which captures operands and locks destinations.
//! 3. **Control transfer:** applies a jump requested by the instruction to the fetch side.
//!
//! A RAW hazard leaves the instruction undecoded in place; decode is retried next cycle and
//! leaves no trace in the register file until it succeeds.

use super::{fetch_stage, run, stage_trace};
use crate::common::error::{StageError, Trap};
use crate::core::cpu::execution::JumpRequest;
use crate::core::pipeline::engine::TickContext;
use crate::core::pipeline::hazards::ForwardingUnit;
use crate::core::pipeline::latches::{PipelineSlot, SlotStatus, Stage};

/// Result of the decode stage for one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Decoded, or carries an exception; may advance.
    Ready,
    /// Decoded a jump without delay slot; this cycle's sequential fetch is squashed.
    Squashed,
    /// Operands of a control transfer are not available yet.
    Raw,
}

/// Decodes the instruction in the Decode stage.
///
/// # Arguments
///
/// * `cx` - Per-cycle context.
/// * `forwarding` - Results published this cycle.
/// * `slot` - Instruction in Decode.
/// * `fetched` - Instruction in Fetch, which a jump turns into a delay slot or squashes.
/// * `next_id` - Sequence counter, used when the delay slot is fetched here.
pub fn decode_stage(
    cx: &mut TickContext<'_>,
    forwarding: &mut ForwardingUnit,
    slot: &mut PipelineSlot,
    fetched: &mut Option<PipelineSlot>,
    next_id: &mut u64,
) -> DecodeOutcome {
    if slot.exception.is_some() || slot.meta.decoded {
        return DecodeOutcome::Ready;
    }
    if slot.meta.in_delay_slot && slot.execution.is_control_transfer() {
        stage_trace!(id = slot.meta.id, "control transfer in delay slot");
        slot.exception = Some(Trap::reserved_instruction());
        return DecodeOutcome::Ready;
    }

    let mut jump = None;
    match run(cx.cpu, forwarding, slot, Stage::Decode, &mut jump) {
        Err(StageError::RawHazard { register }) => {
            stage_trace!(id = slot.meta.id, %register, "decode RAW stall");
            slot.status = SlotStatus::Raw;
            cx.stats.stalls_raw += 1;
            return DecodeOutcome::Raw;
        }
        Err(StageError::Trap(trap)) => {
            slot.exception = Some(trap);
            return DecodeOutcome::Ready;
        }
        Ok(()) | Err(StageError::Fault(_)) => {}
    }
    slot.meta.decoded = true;
    slot.status = SlotStatus::Running;
    stage_trace!(id = slot.meta.id, text = %slot.execution.disassemble(), "ID");

    match jump {
        Some(jump) => redirect(cx, jump, fetched, next_id),
        None => DecodeOutcome::Ready,
    }
}

/// Applies a control transfer decided in Decode.
///
/// With delay slots the sequential successor still executes: it is either already in Fetch
/// or fetched now. Without them, or for compact transfers, it is squashed.
fn redirect(
    cx: &mut TickContext<'_>,
    jump: JumpRequest,
    fetched: &mut Option<PipelineSlot>,
    next_id: &mut u64,
) -> DecodeOutcome {
    let outcome = if cx.cpu.options.delay_slots && !jump.compact {
        match fetched {
            Some(next) => next.meta.in_delay_slot = true,
            None => {
                if cx.cpu.can_fetch(cx.cpu.pc()) {
                    *fetched = Some(fetch_stage(cx, next_id, true));
                }
            }
        }
        DecodeOutcome::Ready
    } else {
        if let Some(squashed) = fetched.take() {
            stage_trace!(id = squashed.meta.id, "squashed");
        }
        DecodeOutcome::Squashed
    };
    stage_trace!(target = format_args!("{:#010x}", jump.target), "redirect");
    cx.cpu.set_pc(jump.target);
    outcome
}
