//! Multi-unit pipeline.
//!
//! Fetch and Decode feed a bank of execution units of configurable kind and latency, followed
//! by a single Memory and WriteBack stage. It performs the following each cycle:
//! 1. **WriteBack and Memory:** as in the classic pipeline.
//! 2. **Execution units:** occupants count down their latency, then run `execute`; a missing
//!    operand keeps the instruction in its unit as a RAW stall.
//! 3. **Retirement:** the oldest finished instruction moves to Memory once nothing older is
//!    still executing and no older instruction holds a lock on its destinations. Others wait
//!    (`WAW` behind an older occupant, `STALL` behind the busy Memory stage).
//! 4. **Dispatch:** the decoded instruction enters a free unit of its kind; without one it
//!    stalls in Decode as a structural hazard.

use crate::config::{UnitConfig, UnitKind};
use crate::core::Cpu;
use crate::core::pipeline::engine::{ExecutionEngine, TickContext, TickOutcome};
use crate::core::pipeline::hazards::ForwardingUnit;
use crate::core::pipeline::latches::{PipelineSlot, SlotStatus, SlotView};
use crate::core::pipeline::stages::{
    Commit, DecodeOutcome, decode_stage, execute_stage, fetch_stage, mem_stage, stage_trace,
    wb_stage,
};
use crate::stats::SimStats;

/// One execution unit.
#[derive(Clone, Debug)]
pub struct ExecutionUnit {
    /// Kind of instructions accepted.
    pub kind: UnitKind,
    /// Cycles an occupant spends before its result is ready.
    pub latency: u32,
    slot: Option<PipelineSlot>,
    elapsed: u32,
    completed: bool,
}

impl ExecutionUnit {
    /// Creates an idle unit.
    pub const fn new(kind: UnitKind, latency: u32) -> Self {
        Self {
            kind,
            latency,
            slot: None,
            elapsed: 0,
            completed: false,
        }
    }

    /// Instruction in the unit.
    pub const fn slot(&self) -> Option<&PipelineSlot> {
        self.slot.as_ref()
    }

    /// Returns `true` if the unit accepts an instruction.
    pub const fn is_free(&self) -> bool {
        self.slot.is_none()
    }

    fn occupant_id(&self) -> Option<u64> {
        self.slot.as_ref().map(PipelineSlot::id)
    }

    fn accept(&mut self, mut slot: PipelineSlot) {
        slot.status = SlotStatus::Running;
        self.slot = Some(slot);
        self.elapsed = 0;
        self.completed = false;
    }

    fn release(&mut self) -> Option<PipelineSlot> {
        self.elapsed = 0;
        self.completed = false;
        self.slot.take()
    }
}

/// Pipeline with parallel execution units.
#[derive(Clone, Debug)]
pub struct MultiUnitPipeline {
    fetch: Option<PipelineSlot>,
    decode: Option<PipelineSlot>,
    units: Vec<ExecutionUnit>,
    memory: Option<PipelineSlot>,
    write_back: Option<PipelineSlot>,
    forwarding: ForwardingUnit,
    next_id: u64,
}

impl MultiUnitPipeline {
    /// Creates an empty pipeline with `count` units of each configured group.
    pub fn new(config: &[UnitConfig]) -> Self {
        let units = config
            .iter()
            .flat_map(|group| {
                std::iter::repeat_n(ExecutionUnit::new(group.kind, group.latency), group.count)
            })
            .collect();
        Self {
            fetch: None,
            decode: None,
            units,
            memory: None,
            write_back: None,
            forwarding: ForwardingUnit::default(),
            next_id: 1,
        }
    }

    /// Execution units in configuration order.
    pub fn units(&self) -> &[ExecutionUnit] {
        &self.units
    }

    fn discard(&mut self) {
        let mut flushed = Vec::new();
        flushed.extend(self.fetch.take());
        flushed.extend(self.decode.take());
        flushed.extend(self.memory.take());
        flushed.extend(self.write_back.take());
        for unit in &mut self.units {
            flushed.extend(unit.release());
        }
        for slot in flushed {
            stage_trace!(id = slot.meta.id, "flushed");
        }
    }

    /// Unit indices ordered by the age of their occupant, oldest first.
    fn occupied_by_age(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.units.len())
            .filter(|&i| !self.units[i].is_free())
            .collect();
        order.sort_by_key(|&i| self.units[i].occupant_id());
        order
    }

    fn run_units(&mut self, cpu: &mut Cpu, stats: &mut SimStats) {
        for i in self.occupied_by_age() {
            let unit = &mut self.units[i];
            if unit.completed {
                continue;
            }
            let Some(slot) = unit.slot.as_mut() else {
                continue;
            };
            if slot.exception.is_some() {
                slot.status = SlotStatus::Executed;
                unit.completed = true;
                continue;
            }
            let required = slot.execution.cycles_required().unwrap_or(unit.latency).max(1);
            unit.elapsed = (unit.elapsed + 1).min(required);
            if unit.elapsed < required {
                continue;
            }
            unit.completed = execute_stage(cpu, &mut self.forwarding, stats, slot);
        }
    }

    fn retire(&mut self, cpu: &Cpu, stats: &mut SimStats) {
        let order = self.occupied_by_age();
        let mut older_pending = false;
        for i in order {
            let unit = &mut self.units[i];
            if !unit.completed {
                older_pending = true;
                continue;
            }
            let Some(slot) = unit.slot.as_mut() else {
                continue;
            };
            if older_pending {
                slot.status = SlotStatus::Waw;
                stats.stalls_waw += 1;
                continue;
            }
            if self.memory.is_some() {
                slot.status = SlotStatus::Stall;
                stats.stalls_structural += 1;
                older_pending = true;
                continue;
            }
            if slot.exception.is_none() && !slot.execution.can_move_to_memory(cpu, &slot.meta) {
                slot.status = SlotStatus::Waw;
                stats.stalls_waw += 1;
                older_pending = true;
                continue;
            }
            self.memory = unit.release();
        }
    }

    /// Places the decoded instruction in a free unit of its kind, falling back to the integer
    /// units when no unit of that kind is configured.
    fn dispatch(&mut self, stats: &mut SimStats) {
        let Some(slot) = self.decode.as_mut() else {
            return;
        };
        let wanted = slot.execution.unit_kind();
        let kind = if self.units.iter().any(|u| u.kind == wanted) {
            wanted
        } else {
            UnitKind::Integer
        };
        match self.units.iter_mut().find(|u| u.kind == kind && u.is_free()) {
            Some(unit) => {
                if let Some(slot) = self.decode.take() {
                    stage_trace!(id = slot.meta.id, ?kind, "dispatch");
                    unit.accept(slot);
                }
            }
            None => {
                slot.status = SlotStatus::Stall;
                stats.stalls_structural += 1;
            }
        }
    }
}

impl ExecutionEngine for MultiUnitPipeline {
    fn tick(&mut self, cx: &mut TickContext<'_>) -> TickOutcome {
        self.forwarding.clear();

        if let Some(slot) = self.write_back.take() {
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

        if let Some(mut slot) = self.memory.take() {
            mem_stage(cx.cpu, &mut self.forwarding, &mut slot);
            self.write_back = Some(slot);
        }
        if cx.cancelled() {
            return TickOutcome::Cancelled;
        }

        self.run_units(cx.cpu, cx.stats);
        self.retire(cx.cpu, cx.stats);
        if cx.cancelled() {
            return TickOutcome::Cancelled;
        }

        let mut squashed = false;
        if let Some(slot) = self.decode.as_mut() {
            match decode_stage(cx, &mut self.forwarding, slot, &mut self.fetch, &mut self.next_id) {
                DecodeOutcome::Ready => self.dispatch(cx.stats),
                DecodeOutcome::Squashed => {
                    squashed = true;
                    self.dispatch(cx.stats);
                }
                DecodeOutcome::Raw => {}
            }
        }
        if cx.cancelled() {
            return TickOutcome::Cancelled;
        }

        if !squashed && self.fetch.is_none() && cx.cpu.can_fetch(cx.cpu.pc()) {
            self.fetch = Some(fetch_stage(cx, &mut self.next_id, false));
        }
        if self.decode.is_none() {
            self.decode = self.fetch.take();
        } else if let Some(held) = &mut self.fetch {
            held.status = SlotStatus::Stall;
        }
        TickOutcome::Completed
    }

    fn flush(&mut self, cpu: &mut Cpu, stats: &mut SimStats) {
        cpu.regs.unlock_all(&mut cpu.journal);
        self.discard();
        stats.flushes += 1;
    }

    fn is_empty(&self) -> bool {
        self.fetch.is_none()
            && self.decode.is_none()
            && self.memory.is_none()
            && self.write_back.is_none()
            && self.units.iter().all(ExecutionUnit::is_free)
    }

    fn oldest(&self) -> Option<(u32, bool)> {
        [&self.write_back, &self.memory, &self.decode, &self.fetch]
            .into_iter()
            .flatten()
            .chain(self.units.iter().filter_map(ExecutionUnit::slot))
            .min_by_key(|slot| slot.meta.id)
            .map(|slot| (slot.meta.pc, slot.meta.in_delay_slot))
    }

    fn occupancy(&self) -> Vec<SlotView> {
        let mut views = Vec::new();
        if let Some(slot) = &self.fetch {
            views.push(SlotView::of("IF", slot));
        }
        if let Some(slot) = &self.decode {
            views.push(SlotView::of("ID", slot));
        }
        for (n, unit) in self.units.iter().enumerate() {
            if let Some(slot) = &unit.slot {
                views.push(SlotView::of(format!("{:?}#{n}", unit.kind), slot));
            }
        }
        if let Some(slot) = &self.memory {
            views.push(SlotView::of("MEM", slot));
        }
        if let Some(slot) = &self.write_back {
            views.push(SlotView::of("WB", slot));
        }
        views
    }

    fn reset(&mut self) {
        self.discard();
        self.forwarding.clear();
        self.next_id = 1;
    }
}
