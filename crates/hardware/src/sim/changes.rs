//! Per-cycle change journal and bounded undo history.
//!
//! Every mutation of architectural or micro-architectural state is preceded by a
//! `ChangeRecord` carrying the prior state it destroys. The records of one cycle form a
//! `StepChanges`, restored in reverse insertion order to undo that cycle exactly.
//!
//! 1. **Records:** register values and locks, memory bytes, cache operations, system state.
//! 2. **Journal:** the open record list of the cycle in progress.
//! 3. **History:** a bounded deque of completed cycles; the oldest is dropped on overflow.

use std::collections::VecDeque;

use tracing::warn;

use crate::common::reg::RegId;
use crate::core::Cpu;
use crate::core::pipeline::engine::PipelineDispatch;
use crate::core::units::cache::CacheBlock;
use crate::soc::fs::OpenFile;
use crate::stats::SimStats;

/// A single reversible state mutation.
#[derive(Clone, Debug)]
pub enum ChangeRecord {
    /// A register was written.
    RegisterValue {
        /// Register written.
        register: RegId,
        /// Value before the write.
        old: u32,
    },
    /// A lock was appended to a register.
    RegisterLock {
        /// Register locked.
        register: RegId,
        /// Instruction id that took the lock.
        owner: u64,
    },
    /// A lock was removed from a register.
    RegisterUnlock {
        /// Register unlocked.
        register: RegId,
        /// Instruction id that held the lock.
        owner: u64,
        /// Position of the lock in the list before removal.
        position: usize,
    },
    /// A word was written at a memory level.
    MemoryWord {
        /// Memory hierarchy level (0 is main memory).
        level: usize,
        /// Word-aligned address.
        address: u32,
        /// Bytes before the write, in address order.
        old: [u8; 4],
    },
    /// A byte was written at a memory level.
    MemoryByte {
        /// Memory hierarchy level.
        level: usize,
        /// Byte address.
        address: u32,
        /// Byte before the write.
        old: u8,
    },
    /// A cache lookup was performed.
    CacheOperation {
        /// Level of the cache.
        level: usize,
        /// Whether the lookup hit.
        hit: bool,
        /// Flat index of the touched block.
        block_index: usize,
        /// Block state before the lookup.
        old: CacheBlock,
        /// Cache clock before the lookup.
        old_clock: u64,
    },
    /// The memory byte order was switched.
    Endianness {
        /// Previous setting (`true` is big-endian).
        old: bool,
    },
    /// The heap allocation pointer moved.
    AllocationPointer {
        /// Previous next-free address.
        old: u32,
    },
    /// A file was opened.
    FileOpen {
        /// Descriptor handed out.
        descriptor: i32,
        /// Name of the file.
        name: String,
        /// Contents before the open (truncation or creation), `None` if it did not exist.
        previous: Option<Vec<u8>>,
    },
    /// A descriptor was closed.
    FileClose {
        /// Closed descriptor.
        descriptor: i32,
        /// Handle state at close time.
        handle: OpenFile,
    },
    /// Bytes were written through a descriptor.
    FileWrite {
        /// Descriptor written to.
        descriptor: i32,
        /// File length before the write.
        old_len: usize,
        /// Descriptor position before the write.
        old_position: usize,
        /// Bytes overwritten in place (not appended).
        overwritten: Vec<u8>,
    },
    /// A descriptor position moved (reads).
    FilePosition {
        /// Descriptor read from.
        descriptor: i32,
        /// Position before the read.
        old: usize,
    },
    /// The random generator was reseeded or advanced.
    RandomSeed {
        /// Generator state before the change.
        old: u64,
    },
    /// The program requested termination.
    ExitRequest {
        /// Exit request before the change.
        old: Option<i32>,
    },
    /// Pipeline and statistics at the start of the cycle.
    Pipeline {
        /// Pipeline snapshot.
        pipeline: Box<PipelineDispatch>,
        /// Statistics snapshot.
        stats: Box<SimStats>,
    },
}

/// State a record is restored into.
#[derive(Debug)]
pub struct RestoreTarget<'a> {
    /// Architectural state.
    pub cpu: &'a mut Cpu,
    /// Pipeline being rewound.
    pub pipeline: &'a mut PipelineDispatch,
    /// Statistics being rewound.
    pub stats: &'a mut SimStats,
}

impl ChangeRecord {
    /// Reverses this mutation.
    pub fn restore(self, target: &mut RestoreTarget<'_>) {
        let cpu = &mut *target.cpu;
        match self {
            Self::RegisterValue { register, old } => cpu.regs.restore_value(register, old),
            Self::RegisterLock { register, owner } => cpu.regs.restore_lock(register, owner),
            Self::RegisterUnlock {
                register,
                owner,
                position,
            } => cpu.regs.restore_unlock(register, owner, position),
            Self::MemoryWord {
                level,
                address,
                old,
            } => match cpu.system.memory.layer_mut(level) {
                Some(layer) => layer.restore_bytes(address, &old),
                None => warn!(level, "memory level missing during undo"),
            },
            Self::MemoryByte {
                level,
                address,
                old,
            } => match cpu.system.memory.layer_mut(level) {
                Some(layer) => layer.restore_bytes(address, &[old]),
                None => warn!(level, "memory level missing during undo"),
            },
            Self::CacheOperation {
                level,
                hit,
                block_index,
                old,
                old_clock,
            } => match cpu
                .system
                .memory
                .layer_mut(level)
                .and_then(|layer| layer.as_cache_mut())
            {
                Some(cache) => cache.undo_operation(hit, block_index, old, old_clock),
                None => warn!(level, "cache level missing during undo"),
            },
            Self::Endianness { old } => cpu.system.memory.restore_endianness(old),
            Self::AllocationPointer { old } => cpu.system.memory.restore_next_data_address(old),
            Self::FileOpen {
                descriptor,
                name,
                previous,
            } => cpu.system.files.restore_open(descriptor, &name, previous),
            Self::FileClose { descriptor, handle } => {
                cpu.system.files.restore_close(descriptor, handle);
            }
            Self::FileWrite {
                descriptor,
                old_len,
                old_position,
                overwritten,
            } => cpu
                .system
                .files
                .restore_write(descriptor, old_len, old_position, &overwritten),
            Self::FilePosition { descriptor, old } => {
                cpu.system.files.restore_position(descriptor, old);
            }
            Self::RandomSeed { old } => cpu.system.random_state = old,
            Self::ExitRequest { old } => cpu.system.exit_code = old,
            Self::Pipeline { pipeline, stats } => {
                *target.pipeline = *pipeline;
                *target.stats = *stats;
            }
        }
    }
}

/// The ordered records of one simulated cycle.
#[derive(Clone, Debug, Default)]
pub struct StepChanges {
    records: Vec<ChangeRecord>,
}

impl StepChanges {
    /// Appends a record.
    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Restores every record, most recent first.
    pub fn restore(self, target: &mut RestoreTarget<'_>) {
        for record in self.records.into_iter().rev() {
            record.restore(target);
        }
    }
}

/// Collector of the records produced by the cycle in progress.
///
/// Outside a cycle (program loading, reset) nothing is recorded.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    current: Option<StepChanges>,
}

impl Journal {
    /// Opens a fresh record list.
    pub fn begin(&mut self) {
        self.current = Some(StepChanges::default());
    }

    /// Appends `record` if a cycle is being recorded.
    pub fn record(&mut self, record: ChangeRecord) {
        if let Some(current) = &mut self.current {
            current.push(record);
        }
    }

    /// Closes the record list and returns it.
    pub fn take(&mut self) -> Option<StepChanges> {
        self.current.take()
    }

    /// Returns `true` between `begin` and `take`.
    pub const fn is_recording(&self) -> bool {
        self.current.is_some()
    }
}

/// Bounded stack of completed cycles.
#[derive(Clone, Debug)]
pub struct History {
    steps: VecDeque<StepChanges>,
    capacity: usize,
}

impl History {
    /// Creates an empty history keeping at most `capacity` cycles.
    pub fn new(capacity: usize) -> Self {
        Self {
            steps: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Pushes a completed cycle, dropping the oldest one past capacity.
    pub fn push(&mut self, step: StepChanges) {
        if self.capacity == 0 {
            return;
        }
        if self.steps.len() == self.capacity {
            let _ = self.steps.pop_front();
        }
        self.steps.push_back(step);
    }

    /// Pops the most recent cycle.
    pub fn pop(&mut self) -> Option<StepChanges> {
        self.steps.pop_back()
    }

    /// Number of cycles that can be undone.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if nothing can be undone.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Forgets every recorded cycle.
    pub fn clear(&mut self) {
        self.steps.clear();
    }
}
