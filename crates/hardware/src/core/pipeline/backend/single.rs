//! Single-cycle organisation.
//!
//! Every cycle fetches one instruction and runs all five stages on it, so nothing is ever in
//! flight between cycles and no hazard can occur. A control transfer with a delay slot takes
//! effect after the next instruction; the pending target is part of the pipeline state.

use tracing::error;

use crate::common::error::{StageError, Trap};
use crate::core::Cpu;
use crate::core::pipeline::engine::{ExecutionEngine, TickContext, TickOutcome};
use crate::core::pipeline::hazards::ForwardingUnit;
use crate::core::pipeline::latches::{PipelineSlot, SlotView, Stage};
use crate::core::pipeline::stages::{
    Commit, execute_stage, fetch_stage, mem_stage, run, stage_trace, wb_stage,
};
use crate::stats::SimStats;

/// Control transfer waiting for its delay slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct PendingJump {
    pub(super) target: u32,
    pub(super) delay_slot_pc: u32,
}

/// Control transfer decoded by `decode_alone`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Redirect {
    /// Fetch continues at the target.
    Now(u32),
    /// The delay slot runs first.
    AfterDelaySlot(PendingJump),
}

/// Decodes `slot` while nothing else is in flight.
///
/// Marks the slot decoded unless it carries an exception.
pub(super) fn decode_alone(
    cx: &mut TickContext<'_>,
    forwarding: &mut ForwardingUnit,
    slot: &mut PipelineSlot,
) -> Option<Redirect> {
    if slot.exception.is_some() {
        return None;
    }
    if slot.meta.in_delay_slot && slot.execution.is_control_transfer() {
        slot.exception = Some(Trap::reserved_instruction());
        return None;
    }
    let mut jump = None;
    match run(cx.cpu, forwarding, slot, Stage::Decode, &mut jump) {
        Ok(()) | Err(StageError::Fault(_)) => {}
        Err(StageError::Trap(trap)) => {
            slot.exception = Some(trap);
            return None;
        }
        Err(StageError::RawHazard { register }) => {
            error!(%register, "operand locked with an empty pipeline");
        }
    }
    slot.meta.decoded = true;
    let jump = jump?;
    if cx.cpu.options.delay_slots && !jump.compact {
        Some(Redirect::AfterDelaySlot(PendingJump {
            target: jump.target,
            delay_slot_pc: cx.cpu.pc(),
        }))
    } else {
        Some(Redirect::Now(jump.target))
    }
}

/// Executes one whole instruction per cycle.
#[derive(Clone, Debug)]
pub struct SingleCycle {
    pending: Option<PendingJump>,
    forwarding: ForwardingUnit,
    next_id: u64,
}

impl Default for SingleCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleCycle {
    /// Creates an idle engine.
    pub fn new() -> Self {
        Self {
            pending: None,
            forwarding: ForwardingUnit::default(),
            next_id: 1,
        }
    }

    /// Target of a taken control transfer whose delay slot has not run yet.
    pub fn pending_target(&self) -> Option<u32> {
        self.pending.map(|p| p.target)
    }

    fn decode(&mut self, cx: &mut TickContext<'_>, slot: &mut PipelineSlot) -> Option<u32> {
        match decode_alone(cx, &mut self.forwarding, slot)? {
            Redirect::Now(target) => Some(target),
            Redirect::AfterDelaySlot(pending) => {
                self.pending = Some(pending);
                None
            }
        }
    }
}

impl ExecutionEngine for SingleCycle {
    fn tick(&mut self, cx: &mut TickContext<'_>) -> TickOutcome {
        self.forwarding.clear();
        let pending = self.pending.take();
        if !cx.cpu.can_fetch(cx.cpu.pc()) {
            if let Some(p) = pending {
                cx.cpu.set_pc(p.target);
            }
            return TickOutcome::Completed;
        }

        let mut slot = fetch_stage(cx, &mut self.next_id, pending.is_some());
        let redirect = self.decode(cx, &mut slot);
        if cx.cancelled() {
            return TickOutcome::Cancelled;
        }
        if !execute_stage(cx.cpu, &mut self.forwarding, cx.stats, &mut slot) {
            error!(pc = format_args!("{:#010x}", slot.meta.pc), "operand missing in Execute");
        }
        mem_stage(cx.cpu, &mut self.forwarding, &mut slot);
        if cx.cancelled() {
            return TickOutcome::Cancelled;
        }

        match wb_stage(cx, &mut self.forwarding, slot) {
            Commit::Retired => {}
            Commit::Flushed => {
                self.pending = None;
                return TickOutcome::Completed;
            }
            Commit::Fatal { trap, pc } => return TickOutcome::Fatal { trap, pc },
        }
        if let Some(target) = redirect {
            stage_trace!(target = format_args!("{target:#010x}"), "redirect");
            cx.cpu.set_pc(target);
        }
        if let Some(p) = pending {
            stage_trace!(target = format_args!("{:#010x}", p.target), "delayed redirect");
            cx.cpu.set_pc(p.target);
        }
        TickOutcome::Completed
    }

    fn flush(&mut self, cpu: &mut Cpu, stats: &mut SimStats) {
        cpu.regs.unlock_all(&mut cpu.journal);
        if self.pending.take().is_some() {
            stats.flushes += 1;
        }
    }

    fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    fn oldest(&self) -> Option<(u32, bool)> {
        self.pending.map(|p| (p.delay_slot_pc, true))
    }

    fn occupancy(&self) -> Vec<SlotView> {
        Vec::new()
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}
