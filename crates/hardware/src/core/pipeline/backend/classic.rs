//! Classic five-stage pipeline.
//!
//! One instruction occupies each of IF, ID, EX, MEM and WB. Every cycle runs the stages from
//! WriteBack back to Fetch, so the register file is written in the first half of the cycle and
//! read in the second half. A stall holds the stalled stage and everything younger in place
//! while older instructions keep draining; the gap becomes a bubble.
//!
//! 1. **WriteBack:** retires, or dispatches an exception and flushes the pipeline.
//! 2. **Memory:** performs the data access of the instruction in MEM.
//! 3. **Execute:** a missing operand is a RAW stall in EX.
//! 4. **Decode:** a missing operand of a branch is a RAW stall in ID; jumps redirect fetch.
//! 5. **Fetch:** fills IF when it is free and the PC lies in loaded code.

use crate::core::Cpu;
use crate::core::pipeline::engine::{ExecutionEngine, TickContext, TickOutcome};
use crate::core::pipeline::hazards::ForwardingUnit;
use crate::core::pipeline::latches::{PipelineSlot, SlotStatus, SlotView, Stage};
use crate::core::pipeline::stages::{
    Commit, DecodeOutcome, decode_stage, execute_stage, fetch_stage, mem_stage, stage_trace,
    wb_stage,
};
use crate::stats::SimStats;

const IF: usize = Stage::Fetch.index();
const ID: usize = Stage::Decode.index();
const EX: usize = Stage::Execute.index();
const MEM: usize = Stage::Memory.index();
const WB: usize = Stage::WriteBack.index();

/// Five-stage in-order pipeline.
#[derive(Clone, Debug)]
pub struct ClassicPipeline {
    slots: [Option<PipelineSlot>; Stage::COUNT],
    forwarding: ForwardingUnit,
    next_id: u64,
}

impl Default for ClassicPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassicPipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            forwarding: ForwardingUnit::default(),
            next_id: 1,
        }
    }

    /// Instruction currently in `stage`.
    pub fn slot(&self, stage: Stage) -> Option<&PipelineSlot> {
        self.slots[stage.index()].as_ref()
    }

    /// Results forwarded during the last cycle.
    pub const fn forwarding(&self) -> &ForwardingUnit {
        &self.forwarding
    }

    fn discard(&mut self) {
        for slot in &mut self.slots {
            if let Some(flushed) = slot.take() {
                stage_trace!(id = flushed.meta.id, "flushed");
            }
        }
    }

    /// Moves the `advanced` oldest stage contents one stage down.
    ///
    /// Positions younger than the boundary keep their instruction; the first position past
    /// the boundary becomes a bubble.
    fn shift(&mut self, advanced: usize) {
        self.slots[WB] = None;
        let first = Stage::COUNT - advanced;
        for i in (first..=MEM).rev() {
            self.slots[i + 1] = self.slots[i].take();
            if let Some(moved) = &mut self.slots[i + 1]
                && moved.status == SlotStatus::Stall
            {
                moved.status = SlotStatus::Running;
            }
        }
        for held in self.slots[..first].iter_mut().flatten() {
            if held.status != SlotStatus::Raw {
                held.status = SlotStatus::Stall;
            }
        }
    }
}

impl ExecutionEngine for ClassicPipeline {
    fn tick(&mut self, cx: &mut TickContext<'_>) -> TickOutcome {
        self.forwarding.clear();

        if let Some(slot) = self.slots[WB].take() {
            match wb_stage(cx, &mut self.forwarding, slot) {
                Commit::Retired => {}
                Commit::Flushed => {
                    self.discard();
                    cx.stats.flushes += 1;
                    return TickOutcome::Completed;
                }
                Commit::Fatal { trap, pc } => return TickOutcome::Fatal { trap, pc },
            }
        }
        if cx.cancelled() {
            return TickOutcome::Cancelled;
        }
        if cx.cpu.system.exit_code.is_some() {
            if !self.is_empty() {
                self.flush(cx.cpu, cx.stats);
            }
            return TickOutcome::Completed;
        }

        if let Some(slot) = self.slots[MEM].as_mut() {
            mem_stage(cx.cpu, &mut self.forwarding, slot);
        }
        if cx.cancelled() {
            return TickOutcome::Cancelled;
        }

        if let Some(slot) = self.slots[EX].as_mut()
            && !execute_stage(cx.cpu, &mut self.forwarding, cx.stats, slot)
        {
            self.shift(2);
            return TickOutcome::Completed;
        }
        if cx.cancelled() {
            return TickOutcome::Cancelled;
        }

        let mut advanced = Stage::COUNT;
        let mut squashed = false;
        let (fetch, rest) = self.slots.split_at_mut(ID);
        if let Some(slot) = rest[0].as_mut() {
            match decode_stage(cx, &mut self.forwarding, slot, &mut fetch[IF], &mut self.next_id) {
                DecodeOutcome::Ready => {}
                DecodeOutcome::Squashed => squashed = true,
                DecodeOutcome::Raw => advanced = 3,
            }
        }
        if cx.cancelled() {
            return TickOutcome::Cancelled;
        }

        if !squashed && self.slots[IF].is_none() && cx.cpu.can_fetch(cx.cpu.pc()) {
            self.slots[IF] = Some(fetch_stage(cx, &mut self.next_id, false));
        }
        self.shift(advanced);
        TickOutcome::Completed
    }

    fn flush(&mut self, cpu: &mut Cpu, stats: &mut SimStats) {
        cpu.regs.unlock_all(&mut cpu.journal);
        self.discard();
        stats.flushes += 1;
    }

    fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn oldest(&self) -> Option<(u32, bool)> {
        self.slots
            .iter()
            .rev()
            .flatten()
            .next()
            .map(|slot| (slot.meta.pc, slot.meta.in_delay_slot))
    }

    fn occupancy(&self) -> Vec<SlotView> {
        Stage::ALL
            .iter()
            .zip(&self.slots)
            .filter_map(|(stage, slot)| slot.as_ref().map(|s| SlotView::of(stage.label(), s)))
            .collect()
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}
