//! Execution engine trait and pipeline type erasure.
//!
//! This module defines the contract shared by the pipeline organisations:
//! 1. **`TickContext`:** the state one cycle runs against (CPU, decoder, statistics, cancel flag).
//! 2. **`ExecutionEngine`:** advancing one cycle, flushing, and occupancy queries.
//! 3. **`PipelineDispatch`:** enum dispatch over the concrete engines, cloned into the undo
//!    journal at the start of every cycle.

use crate::common::error::Trap;
use crate::config::{Config, PipelineKind};
use crate::core::Cpu;
use crate::core::cpu::execution::InstructionSet;
use crate::core::pipeline::backend::classic::ClassicPipeline;
use crate::core::pipeline::backend::multicycle::MultiCycle;
use crate::core::pipeline::backend::multiunit::MultiUnitPipeline;
use crate::core::pipeline::backend::single::SingleCycle;
use crate::core::pipeline::latches::SlotView;
use crate::sim::driver::CancelToken;
use crate::stats::SimStats;

/// State one cycle operates on.
#[derive(Debug)]
pub struct TickContext<'a> {
    /// Architectural state.
    pub cpu: &'a mut Cpu,
    /// Decoder for fetched words.
    pub isa: &'a dyn InstructionSet,
    /// Statistics of the run.
    pub stats: &'a mut SimStats,
    /// Cooperative cancellation flag, checked between stages.
    pub cancel: &'a CancelToken,
}

impl TickContext<'_> {
    /// Returns `true` if the cycle must be abandoned.
    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Result of one cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The cycle ran to completion.
    Completed,
    /// Cancellation was requested between two stages; the cycle must be rolled back.
    Cancelled,
    /// An exception reached WriteBack and no kernel handler is loaded.
    Fatal {
        /// The exception.
        trap: Trap,
        /// Address of the faulting instruction.
        pc: u32,
    },
}

/// A pipeline organisation.
pub trait ExecutionEngine {
    /// Advances every stage by one cycle.
    fn tick(&mut self, cx: &mut TickContext<'_>) -> TickOutcome;

    /// Discards every in-flight instruction and releases all register locks.
    fn flush(&mut self, cpu: &mut Cpu, stats: &mut SimStats);

    /// Returns `true` if no instruction is in flight.
    fn is_empty(&self) -> bool;

    /// Address and delay-slot flag of the oldest in-flight instruction.
    fn oldest(&self) -> Option<(u32, bool)>;

    /// Occupied positions, for display.
    fn occupancy(&self) -> Vec<SlotView>;

    /// Returns to the empty state.
    fn reset(&mut self);
}

/// Type-erased pipeline stored by the simulator.
#[derive(Clone, Debug)]
pub enum PipelineDispatch {
    /// One instruction per cycle, start to finish.
    SingleCycle(SingleCycle),
    /// One stage of one instruction per cycle.
    MultiCycle(Box<MultiCycle>),
    /// Classic five-stage pipeline.
    Classic(Box<ClassicPipeline>),
    /// Five-stage pipeline with parallel execution units.
    MultiUnit(Box<MultiUnitPipeline>),
}

impl PipelineDispatch {
    /// Builds the pipeline selected in `config`.
    pub fn new(config: &Config) -> Self {
        match config.pipeline.kind {
            PipelineKind::SingleCycle => Self::SingleCycle(SingleCycle::new()),
            PipelineKind::MultiCycle => Self::MultiCycle(Box::default()),
            PipelineKind::Classic => Self::Classic(Box::default()),
            PipelineKind::MultiUnit => {
                Self::MultiUnit(Box::new(MultiUnitPipeline::new(&config.pipeline.units)))
            }
        }
    }

    /// Organisation of this pipeline.
    pub const fn kind(&self) -> PipelineKind {
        match self {
            Self::SingleCycle(_) => PipelineKind::SingleCycle,
            Self::MultiCycle(_) => PipelineKind::MultiCycle,
            Self::Classic(_) => PipelineKind::Classic,
            Self::MultiUnit(_) => PipelineKind::MultiUnit,
        }
    }

    fn engine(&self) -> &dyn ExecutionEngine {
        match self {
            Self::SingleCycle(p) => p,
            Self::MultiCycle(p) => p.as_ref(),
            Self::Classic(p) => p.as_ref(),
            Self::MultiUnit(p) => p.as_ref(),
        }
    }

    fn engine_mut(&mut self) -> &mut dyn ExecutionEngine {
        match self {
            Self::SingleCycle(p) => p,
            Self::MultiCycle(p) => p.as_mut(),
            Self::Classic(p) => p.as_mut(),
            Self::MultiUnit(p) => p.as_mut(),
        }
    }

    /// Runs one cycle.
    pub fn tick(&mut self, cx: &mut TickContext<'_>) -> TickOutcome {
        self.engine_mut().tick(cx)
    }

    /// Flushes every in-flight instruction.
    pub fn flush(&mut self, cpu: &mut Cpu, stats: &mut SimStats) {
        self.engine_mut().flush(cpu, stats);
    }

    /// Returns `true` if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.engine().is_empty()
    }

    /// Address and delay-slot flag of the oldest in-flight instruction.
    pub fn oldest(&self) -> Option<(u32, bool)> {
        self.engine().oldest()
    }

    /// Occupied positions, for display.
    pub fn occupancy(&self) -> Vec<SlotView> {
        self.engine().occupancy()
    }

    /// Empties the pipeline without touching architectural state.
    pub fn reset(&mut self) {
        self.engine_mut().reset();
    }
}
