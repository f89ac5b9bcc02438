//! Pipeline slots shared by every pipeline organisation.
//!
//! This module defines the state carried by one in-flight instruction:
//! 1. **Stage:** the five classic stages, used as array indices and as the forwarding tag.
//! 2. **Status:** the slot state machine (`Running`, `Executed`, `Stall`, `Raw`, `Waw`).
//! 3. **Trap propagation:** an exception raised in any stage travels with the slot until
//!    WriteBack dispatches it.

use std::fmt;

use crate::common::error::Trap;
use crate::core::cpu::execution::{ExecutionMeta, InstructionExecution};

/// Classic pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Instruction fetch.
    Fetch,
    /// Decode and register read.
    Decode,
    /// ALU or functional unit.
    Execute,
    /// Data memory access.
    Memory,
    /// Register commit.
    WriteBack,
}

impl Stage {
    /// Number of stages.
    pub const COUNT: usize = 5;

    /// All stages in pipeline order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Fetch,
        Self::Decode,
        Self::Execute,
        Self::Memory,
        Self::WriteBack,
    ];

    /// Position in the stage array.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short display label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fetch => "IF",
            Self::Decode => "ID",
            Self::Execute => "EX",
            Self::Memory => "MEM",
            Self::WriteBack => "WB",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State of a pipeline slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SlotStatus {
    /// Still consuming cycles in its stage.
    #[default]
    Running,
    /// Result ready, waiting to advance.
    Executed,
    /// Blocked by a structural or downstream conflict.
    Stall,
    /// Blocked by a read-after-write dependency.
    Raw,
    /// Held back to preserve write ordering.
    Waw,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "RUNNING",
            Self::Executed => "EXECUTED",
            Self::Stall => "STALL",
            Self::Raw => "RAW",
            Self::Waw => "WAW",
        })
    }
}

/// One in-flight instruction.
#[derive(Clone, Debug)]
pub struct PipelineSlot {
    /// Instruction behaviour.
    pub execution: Box<dyn InstructionExecution>,
    /// Pipeline bookkeeping.
    pub meta: ExecutionMeta,
    /// Exception waiting for WriteBack.
    pub exception: Option<Trap>,
    /// Slot state.
    pub status: SlotStatus,
}

impl PipelineSlot {
    /// Creates a running slot.
    pub fn new(execution: Box<dyn InstructionExecution>, meta: ExecutionMeta) -> Self {
        Self {
            execution,
            meta,
            exception: None,
            status: SlotStatus::Running,
        }
    }

    /// Creates a slot that only carries `trap` to WriteBack.
    pub fn faulted(
        execution: Box<dyn InstructionExecution>,
        meta: ExecutionMeta,
        trap: Trap,
    ) -> Self {
        Self {
            execution,
            meta,
            exception: Some(trap),
            status: SlotStatus::Running,
        }
    }

    /// Sequence number of the instruction.
    pub const fn id(&self) -> u64 {
        self.meta.id
    }

    /// Address of the instruction.
    pub const fn pc(&self) -> u32 {
        self.meta.pc
    }

    /// Returns `true` if an exception is pending.
    pub const fn has_exception(&self) -> bool {
        self.exception.is_some()
    }
}

impl fmt::Display for PipelineSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#010x} {:<24} {}",
            self.meta.pc,
            self.execution.disassemble(),
            self.status
        )?;
        if let Some(trap) = &self.exception {
            write!(f, " [{trap}]")?;
        }
        Ok(())
    }
}

/// Read-only view of one occupied position, for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotView {
    /// Stage or unit label.
    pub location: String,
    /// Address of the instruction.
    pub pc: u32,
    /// Disassembly.
    pub text: String,
    /// Slot state.
    pub status: SlotStatus,
}

impl SlotView {
    /// Snapshot of `slot` at `location`.
    pub fn of(location: impl Into<String>, slot: &PipelineSlot) -> Self {
        Self {
            location: location.into(),
            pc: slot.meta.pc,
            text: slot.execution.disassemble(),
            status: slot.status,
        }
    }
}
