//! Multi-cycle organisation.
//!
//! One instruction is in flight at a time and it advances one stage per cycle, so every
//! instruction takes five cycles from Fetch to WriteBack. The next instruction is fetched in
//! the cycle after the previous one commits; with nothing overlapping there are no hazards.
//!
//! 1. **Fetch:** starts the next instruction, marking it as a delay slot if a jump waits.
//! 2. **Decode:** applies a control transfer at once, or after the delay slot commits.
//! 3. **Execute and Memory:** one stage call each.
//! 4. **WriteBack:** commits or dispatches the pending exception; the machine is then empty.

use tracing::error;

use super::single::{PendingJump, Redirect, decode_alone};
use crate::core::Cpu;
use crate::core::pipeline::engine::{ExecutionEngine, TickContext, TickOutcome};
use crate::core::pipeline::hazards::ForwardingUnit;
use crate::core::pipeline::latches::{PipelineSlot, SlotView, Stage};
use crate::core::pipeline::stages::{
    Commit, execute_stage, fetch_stage, mem_stage, stage_trace, wb_stage,
};
use crate::stats::SimStats;

/// The instruction in flight and the last stage it completed.
#[derive(Clone, Debug)]
struct InFlight {
    slot: PipelineSlot,
    stage: Stage,
}

/// Runs one stage of one instruction per cycle.
#[derive(Clone, Debug)]
pub struct MultiCycle {
    current: Option<InFlight>,
    pending: Option<PendingJump>,
    forwarding: ForwardingUnit,
    next_id: u64,
}

impl Default for MultiCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiCycle {
    /// Creates an idle engine.
    pub fn new() -> Self {
        Self {
            current: None,
            pending: None,
            forwarding: ForwardingUnit::default(),
            next_id: 1,
        }
    }

    /// Stage the in-flight instruction completed last cycle.
    pub fn stage(&self) -> Option<Stage> {
        self.current.as_ref().map(|c| c.stage)
    }

    fn fetch(&mut self, cx: &mut TickContext<'_>) -> TickOutcome {
        if !cx.cpu.can_fetch(cx.cpu.pc()) {
            if let Some(p) = self.pending.take() {
                cx.cpu.set_pc(p.target);
            }
            return TickOutcome::Completed;
        }
        let slot = fetch_stage(cx, &mut self.next_id, self.pending.is_some());
        self.current = Some(InFlight {
            slot,
            stage: Stage::Fetch,
        });
        TickOutcome::Completed
    }

    fn write_back(&mut self, cx: &mut TickContext<'_>, slot: PipelineSlot) -> TickOutcome {
        let in_delay_slot = slot.meta.in_delay_slot;
        match wb_stage(cx, &mut self.forwarding, slot) {
            Commit::Retired => {
                if in_delay_slot && let Some(p) = self.pending.take() {
                    stage_trace!(target = format_args!("{:#010x}", p.target), "delayed redirect");
                    cx.cpu.set_pc(p.target);
                }
                TickOutcome::Completed
            }
            Commit::Flushed => {
                self.pending = None;
                TickOutcome::Completed
            }
            Commit::Fatal { trap, pc } => TickOutcome::Fatal { trap, pc },
        }
    }
}

impl ExecutionEngine for MultiCycle {
    fn tick(&mut self, cx: &mut TickContext<'_>) -> TickOutcome {
        self.forwarding.clear();
        let Some(InFlight { mut slot, stage }) = self.current.take() else {
            return self.fetch(cx);
        };

        let ran = match stage {
            Stage::Fetch => {
                match decode_alone(cx, &mut self.forwarding, &mut slot) {
                    Some(Redirect::Now(target)) => {
                        stage_trace!(target = format_args!("{target:#010x}"), "redirect");
                        cx.cpu.set_pc(target);
                    }
                    Some(Redirect::AfterDelaySlot(pending)) => self.pending = Some(pending),
                    None => {}
                }
                Stage::Decode
            }
            Stage::Decode => {
                if !execute_stage(cx.cpu, &mut self.forwarding, cx.stats, &mut slot) {
                    error!(pc = format_args!("{:#010x}", slot.meta.pc), "operand missing in Execute");
                }
                Stage::Execute
            }
            Stage::Execute => {
                mem_stage(cx.cpu, &mut self.forwarding, &mut slot);
                Stage::Memory
            }
            Stage::Memory | Stage::WriteBack => return self.write_back(cx, slot),
        };
        if cx.cancelled() {
            return TickOutcome::Cancelled;
        }
        self.current = Some(InFlight { slot, stage: ran });
        TickOutcome::Completed
    }

    fn flush(&mut self, cpu: &mut Cpu, stats: &mut SimStats) {
        cpu.regs.unlock_all(&mut cpu.journal);
        let discarded = self.current.take().is_some();
        let dropped = self.pending.take().is_some();
        if discarded || dropped {
            stats.flushes += 1;
        }
    }

    fn is_empty(&self) -> bool {
        self.current.is_none() && self.pending.is_none()
    }

    fn oldest(&self) -> Option<(u32, bool)> {
        self.current
            .as_ref()
            .map(|c| (c.slot.meta.pc, c.slot.meta.in_delay_slot))
            .or_else(|| self.pending.map(|p| (p.delay_slot_pc, true)))
    }

    fn occupancy(&self) -> Vec<SlotView> {
        self.current
            .iter()
            .map(|c| SlotView::of(c.stage.label(), &c.slot))
            .collect()
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}
