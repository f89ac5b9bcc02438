//! Simulator: owns the CPU, the pipeline and the undo history side by side.
//!
//! This is the single-threaded core of a simulation. It performs the following:
//! 1. **Cycle loop:** opens a journal, snapshots the pipeline, ticks it and commits the
//!    cycle's records to the bounded history.
//! 2. **Cancellation:** a cycle abandoned between two stages is rolled back before returning,
//!    so no half-applied cycle is ever observable.
//! 3. **Interrupts:** pending hardware interrupts are taken between cycles, attributed to the
//!    oldest in-flight instruction.
//! 4. **Debugging:** breakpoints on the next fetch address, undo, reset and display snapshots.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error, info, warn};

use crate::common::error::{SimError, SimResult, Trap};
use crate::common::reg::RegId;
use crate::config::Config;
use crate::core::Cpu;
use crate::core::cpu::CpuOptions;
use crate::core::cpu::execution::InstructionSet;
use crate::core::pipeline::engine::{PipelineDispatch, TickContext, TickOutcome};
use crate::core::pipeline::latches::SlotView;
use crate::core::units::cache::CacheStats;
use crate::isa::BuiltinIsa;
use crate::sim::changes::{ChangeRecord, History, RestoreTarget};
use crate::sim::driver::CancelToken;
use crate::sim::loader::ProgramImage;
use crate::soc::System;
use crate::stats::SimStats;

/// Why a simulation finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finish {
    /// The program requested termination with this code.
    Exit(i32),
    /// Fetch left the loaded code and the pipeline drained.
    Drained,
    /// An exception could not be dispatched because no kernel handler is loaded.
    Fatal {
        /// The exception.
        trap: Trap,
        /// Address of the faulting instruction.
        pc: u32,
    },
}

/// Result of advancing the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// One cycle ran; the program continues.
    Executed,
    /// The next fetch address is a breakpoint; nothing ran.
    Breakpoint(u32),
    /// The program finished during the last cycle.
    Finished(Finish),
    /// Cancellation was requested; the interrupted cycle was rolled back.
    Cancelled,
    /// The cycle budget of a run was exhausted.
    CycleLimit,
}

/// Read-only state for displays.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Cycles executed.
    pub cycle: u64,
    /// Next fetch address.
    pub pc: u32,
    /// Every register with its committed value.
    pub registers: Vec<(RegId, u32)>,
    /// Occupied pipeline positions.
    pub pipeline: Vec<SlotView>,
    /// Counters of every cache, outermost first.
    pub caches: Vec<CacheStats>,
    /// Statistics of the run.
    pub stats: SimStats,
    /// Cycles that can be undone.
    pub undo_depth: usize,
    /// Outcome, once finished.
    pub finished: Option<Finish>,
}

/// Single-threaded simulator core.
#[derive(Debug)]
pub struct Simulator {
    cpu: Cpu,
    initial: Cpu,
    pipeline: PipelineDispatch,
    isa: Box<dyn InstructionSet>,
    stats: SimStats,
    history: History,
    undo_enabled: bool,
    breakpoints: BTreeSet<u32>,
    labels: BTreeMap<String, u32>,
    finished: Option<Finish>,
    cancel: CancelToken,
}

impl Simulator {
    /// Builds a simulator with `image` loaded and the built-in instruction set.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated before use.
    /// * `image` - Program to load.
    ///
    /// # Errors
    ///
    /// `SimError::Config` for an invalid configuration, `SimError::Program` for an image
    /// that does not fit the address space.
    pub fn new(config: &Config, image: &ProgramImage) -> SimResult<Self> {
        config.validate()?;
        let system = System::from_config(config)?;
        let mut cpu = Cpu::new(system, CpuOptions::from_config(config));
        image.load_into(&mut cpu)?;
        let capacity = if config.general.undo_enabled {
            config.general.max_changes
        } else {
            0
        };
        info!(
            pipeline = ?config.pipeline.kind,
            entry = format_args!("{:#010x}", image.entry),
            forwarding = config.general.forwarding,
            delay_slots = config.general.delay_slots,
            "simulator ready"
        );
        Ok(Self {
            initial: cpu.clone(),
            cpu,
            pipeline: PipelineDispatch::new(config),
            isa: Box::new(BuiltinIsa),
            stats: SimStats::default(),
            history: History::new(capacity),
            undo_enabled: config.general.undo_enabled,
            breakpoints: BTreeSet::new(),
            labels: image.labels.clone(),
            finished: None,
            cancel: CancelToken::default(),
        })
    }

    /// Replaces the instruction set used to decode fetched words.
    #[must_use]
    pub fn with_isa(mut self, isa: Box<dyn InstructionSet>) -> Self {
        self.isa = isa;
        self
    }

    /// Shares `cancel` with the caller; cycles poll it between stages.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Architectural state.
    pub const fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Mutable architectural state, for test setup and debugger edits. Not journaled.
    pub const fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// The pipeline.
    pub const fn pipeline(&self) -> &PipelineDispatch {
        &self.pipeline
    }

    /// Statistics of the run.
    pub const fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Cycles executed.
    pub const fn cycles(&self) -> u64 {
        self.stats.cycles
    }

    /// Number of cycles that can be undone.
    pub fn undo_depth(&self) -> usize {
        self.history.len()
    }

    /// Outcome, once the program has finished.
    pub const fn finished(&self) -> Option<Finish> {
        self.finished
    }

    /// Cancellation flag polled by the cycle loop.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Symbol table of the loaded program.
    pub const fn labels(&self) -> &BTreeMap<String, u32> {
        &self.labels
    }

    /// Everything the program wrote to the console.
    pub fn console_output(&self) -> String {
        self.cpu.console_output()
    }

    /// Queues console input for the read services.
    pub fn push_console_input(&mut self, text: &str) {
        self.cpu.push_console_input(text);
    }

    /// Raises hardware interrupt `level` (2-7). Taken at the end of a cycle when enabled.
    pub fn request_interrupt(&mut self, level: u32) -> bool {
        self.cpu.request_interrupt(level)
    }

    /// Adds a breakpoint on the fetch address `pc`.
    pub fn add_breakpoint(&mut self, pc: u32) -> bool {
        self.breakpoints.insert(pc)
    }

    /// Removes the breakpoint at `pc`.
    pub fn remove_breakpoint(&mut self, pc: u32) -> bool {
        self.breakpoints.remove(&pc)
    }

    /// Removes every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Breakpoints in address order.
    pub fn breakpoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.breakpoints.iter().copied()
    }

    /// Returns `true` if the next cycle would start at a breakpoint.
    pub fn at_breakpoint(&self) -> bool {
        self.breakpoints.contains(&self.cpu.pc())
    }

    /// Runs exactly one cycle, ignoring breakpoints.
    ///
    /// # Errors
    ///
    /// `SimError::Finished` if the program already finished.
    pub fn step(&mut self) -> SimResult<StepOutcome> {
        if self.finished.is_some() {
            return Err(SimError::Finished);
        }
        Ok(self.cycle())
    }

    /// Runs until the program finishes, a breakpoint is reached, cancellation is requested
    /// or `max_cycles` cycles have run.
    ///
    /// The breakpoint at the starting address is ignored, so a run resumes past it.
    ///
    /// # Errors
    ///
    /// `SimError::Finished` if the program already finished.
    pub fn run(&mut self, max_cycles: Option<u64>) -> SimResult<StepOutcome> {
        if self.finished.is_some() {
            return Err(SimError::Finished);
        }
        let mut executed = 0;
        loop {
            if max_cycles.is_some_and(|max| executed >= max) {
                return Ok(StepOutcome::CycleLimit);
            }
            if executed > 0 && self.at_breakpoint() {
                debug!(pc = format_args!("{:#010x}", self.cpu.pc()), "breakpoint");
                return Ok(StepOutcome::Breakpoint(self.cpu.pc()));
            }
            match self.cycle() {
                StepOutcome::Executed => executed += 1,
                other => return Ok(other),
            }
        }
    }

    /// Runs one cycle.
    ///
    /// The first record of the cycle is the pipeline snapshot, so restoring the cycle's
    /// records in reverse order ends with the pipeline and statistics as they were.
    pub(crate) fn cycle(&mut self) -> StepOutcome {
        if self.cancel.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        self.cpu.journal.begin();
        self.cpu.journal.record(ChangeRecord::Pipeline {
            pipeline: Box::new(self.pipeline.clone()),
            stats: Box::new(self.stats.clone()),
        });

        let outcome = {
            let mut cx = TickContext {
                cpu: &mut self.cpu,
                isa: self.isa.as_ref(),
                stats: &mut self.stats,
                cancel: &self.cancel,
            };
            self.pipeline.tick(&mut cx)
        };

        match outcome {
            TickOutcome::Completed => {}
            TickOutcome::Cancelled => {
                if let Some(changes) = self.cpu.journal.take() {
                    changes.restore(&mut RestoreTarget {
                        cpu: &mut self.cpu,
                        pipeline: &mut self.pipeline,
                        stats: &mut self.stats,
                    });
                }
                debug!(cycle = self.stats.cycles, "cycle cancelled and rolled back");
                return StepOutcome::Cancelled;
            }
            TickOutcome::Fatal { trap, pc } => {
                error!(pc = format_args!("{pc:#010x}"), %trap, "unhandled exception");
                let message = format!("unhandled exception {trap} at {pc:#010x}\n");
                let written = self
                    .cpu
                    .system
                    .files
                    .write(2, message.as_bytes(), &mut self.cpu.journal);
                if written < 0 {
                    warn!("descriptor 2 is closed; exception report not written");
                }
                self.pipeline.flush(&mut self.cpu, &mut self.stats);
                self.finished = Some(Finish::Fatal { trap, pc });
            }
        }

        if self.finished.is_none() && self.cpu.system.exit_code.is_none() {
            self.take_interrupt();
        }

        self.stats.cycles += 1;
        if let Some(changes) = self.cpu.journal.take()
            && self.undo_enabled
        {
            self.history.push(changes);
        }

        if self.finished.is_none() {
            self.finished = self.detect_finish();
        }
        match self.finished {
            Some(finish) => {
                info!(cycles = self.stats.cycles, ?finish, "simulation finished");
                StepOutcome::Finished(finish)
            }
            None => StepOutcome::Executed,
        }
    }

    fn take_interrupt(&mut self) {
        let Some(level) = self.cpu.pending_interrupt() else {
            return;
        };
        let (pc, in_delay_slot) = self
            .pipeline
            .oldest()
            .unwrap_or_else(|| (self.cpu.pc(), false));
        debug!(level, pc = format_args!("{pc:#010x}"), "interrupt");
        self.pipeline.flush(&mut self.cpu, &mut self.stats);
        if self.cpu.take_interrupt(level, pc, in_delay_slot).is_ok() {
            self.stats.interrupts_taken += 1;
        }
    }

    fn detect_finish(&self) -> Option<Finish> {
        if !self.pipeline.is_empty() || self.cpu.can_fetch(self.cpu.pc()) {
            return None;
        }
        Some(match self.cpu.system.exit_code {
            Some(code) => Finish::Exit(code),
            None => Finish::Drained,
        })
    }

    /// Reverts the most recent cycle.
    ///
    /// # Returns
    ///
    /// `false` if the history is empty (or undo is disabled); nothing changes then.
    pub fn undo_last_step(&mut self) -> bool {
        let Some(changes) = self.history.pop() else {
            return false;
        };
        let records = changes.len();
        changes.restore(&mut RestoreTarget {
            cpu: &mut self.cpu,
            pipeline: &mut self.pipeline,
            stats: &mut self.stats,
        });
        self.finished = self.detect_finish();
        debug!(cycle = self.stats.cycles, records, "undo");
        true
    }

    /// Returns to the loaded program's initial state and forgets the history.
    pub fn reset(&mut self) {
        self.cpu.reset_from(&self.initial);
        self.pipeline.reset();
        self.stats.reset();
        self.history.clear();
        self.finished = None;
        self.cancel.reset();
        debug!("reset");
    }

    /// Captures the state shown to users.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cycle: self.stats.cycles,
            pc: self.cpu.pc(),
            registers: self.cpu.regs.iter().map(|r| (r.id(), r.value())).collect(),
            pipeline: self.pipeline.occupancy(),
            caches: self.cpu.system.cache_stats(),
            stats: self.stats.clone(),
            undo_depth: self.history.len(),
            finished: self.finished,
        }
    }
}
