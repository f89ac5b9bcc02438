//! Configuration system for the MIPS simulator.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline settings (undo depth, forwarding, cache geometry, unit latencies).
//! 2. **Structures:** Hierarchical config for general, memory, cache, and pipeline settings.
//! 3. **Enums:** Write policy, replacement policy, pipeline kind and execution unit kind.
//!
//! Configuration is supplied as JSON (for example `mipsim run --config sim.json`) or built
//! with `Config::default()`.

use serde::Deserialize;

use crate::common::error::{SimError, SimResult};

/// Default configuration constants for the simulator.
mod defaults {
    /// Number of cycles kept in the undo history.
    pub const MAX_CHANGES: usize = crate::common::constants::MAX_CHANGES;

    /// Words per cache block.
    pub const BLOCK_WORDS: usize = 4;

    /// Blocks per cache.
    pub const BLOCKS: usize = 16;

    /// Cache associativity (1 way = direct-mapped).
    pub const WAYS: usize = 1;

    /// Latency of integer and load/store units in cycles.
    pub const INTEGER_LATENCY: u32 = 1;

    /// Latency of the multiply unit in cycles.
    pub const MULTIPLY_LATENCY: u32 = 3;

    /// Latency of the divide unit in cycles.
    pub const DIVIDE_LATENCY: u32 = 6;
}

/// Cache write policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum WritePolicy {
    /// Writes update the block only; dirty blocks are written back on eviction.
    #[default]
    #[serde(alias = "writeback", alias = "WRITE_BACK")]
    WriteBack,
    /// Writes go to the next level immediately and are allocated into the block.
    #[serde(alias = "writethrough", alias = "WRITE_THROUGH")]
    WriteThrough,
}

/// Cache replacement policy algorithms.
///
/// Specifies the algorithm used to select which block to evict
/// when a new block must be installed in a full cache set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Least Recently Used replacement policy.
    ///
    /// Evicts the block that was accessed least recently.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// First In First Out replacement policy.
    ///
    /// Evicts the block that was filled first.
    #[serde(alias = "Fifo")]
    Fifo,
    /// Pseudo-random replacement policy.
    ///
    /// Evicts a block chosen by hashing the cache clock and the set index,
    /// so replays after an undo pick the same victim.
    #[serde(alias = "Random")]
    Random,
}

/// Pipeline organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum PipelineKind {
    /// One instruction executed completely per cycle.
    SingleCycle,
    /// One instruction at a time, one stage per cycle.
    MultiCycle,
    /// Classic five-stage pipeline.
    #[default]
    Classic,
    /// Five-stage pipeline with parallel variable-latency execution units.
    #[serde(alias = "MultiALU")]
    MultiUnit,
}

/// Kind of execution unit in the multi-unit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum UnitKind {
    /// Arithmetic, logic, shifts, branches and system instructions.
    Integer,
    /// Address generation for loads and stores.
    LoadStore,
    /// Multiplication.
    Multiply,
    /// Division.
    Divide,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// ```
/// use mipsim_core::config::{Config, PipelineKind, ReplacementPolicy};
///
/// let json = r#"{
///     "general": { "forwarding": false, "delay_slots": true },
///     "caches": [ { "blocks": 8, "ways": 2, "policy": "FIFO" } ],
///     "pipeline": { "kind": "MultiUnit" }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert!(!config.general.forwarding);
/// assert_eq!(config.caches[0].policy, ReplacementPolicy::Fifo);
/// assert_eq!(config.caches[0].block_words, 4);
/// assert_eq!(config.pipeline.kind, PipelineKind::MultiUnit);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General simulation settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Main memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Cache hierarchy, outermost (closest to the CPU) first
    #[serde(default)]
    pub caches: Vec<CacheConfig>,
    /// Pipeline organisation
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Parses a JSON document and validates it.
    pub fn from_json(text: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that the type system cannot express.
    pub fn validate(&self) -> SimResult<()> {
        for (i, cache) in self.caches.iter().enumerate() {
            cache
                .validate()
                .map_err(|e| SimError::Config(format!("caches[{i}]: {e}")))?;
        }
        for unit in &self.pipeline.units {
            if unit.count == 0 || unit.latency == 0 {
                return Err(SimError::Config(format!(
                    "{:?} unit needs a non-zero count and latency",
                    unit.kind
                )));
            }
        }
        if self.pipeline.kind == PipelineKind::MultiUnit
            && !self.pipeline.units.iter().any(|u| u.kind == UnitKind::Integer)
        {
            return Err(SimError::Config(
                "the multi-unit pipeline needs at least one Integer unit".into(),
            ));
        }
        Ok(())
    }
}

/// General simulation settings and options.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Record per-cycle changes so cycles can be undone
    #[serde(default = "GeneralConfig::default_true")]
    pub undo_enabled: bool,

    /// Number of cycles kept in the undo history
    #[serde(default = "GeneralConfig::default_max_changes")]
    pub max_changes: usize,

    /// Forward in-flight results to dependent instructions
    #[serde(default = "GeneralConfig::default_true")]
    pub forwarding: bool,

    /// Execute the instruction after a branch or jump before the transfer takes effect
    #[serde(default)]
    pub delay_slots: bool,

    /// Delay between cycles while running, in milliseconds
    #[serde(default)]
    pub cycle_delay_ms: u64,

    /// Hand `SYSCALL` to the kernel exception handler instead of the built-in services
    #[serde(default)]
    pub kernel_syscalls: bool,

    /// Emit a `Cycle` event to observers after every cycle
    #[serde(default)]
    pub cycle_events: bool,
}

impl GeneralConfig {
    fn default_true() -> bool {
        true
    }

    fn default_max_changes() -> usize {
        defaults::MAX_CHANGES
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            undo_enabled: true,
            max_changes: defaults::MAX_CHANGES,
            forwarding: true,
            delay_slots: false,
            cycle_delay_ms: 0,
            kernel_syscalls: false,
            cycle_events: false,
        }
    }
}

/// Main memory configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    /// Store words most significant byte first
    #[serde(default)]
    pub big_endian: bool,
}

/// Configuration of one cache level.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Write policy
    #[serde(default)]
    pub write_policy: WritePolicy,

    /// Words per block (power of two)
    #[serde(default = "CacheConfig::default_block_words")]
    pub block_words: usize,

    /// Total number of blocks (power of two)
    #[serde(default = "CacheConfig::default_blocks")]
    pub blocks: usize,

    /// Blocks per set: 1 is direct-mapped, `blocks` is fully associative
    #[serde(default = "CacheConfig::default_ways")]
    pub ways: usize,

    /// Replacement policy
    #[serde(default)]
    pub policy: ReplacementPolicy,
}

impl CacheConfig {
    fn default_block_words() -> usize {
        defaults::BLOCK_WORDS
    }

    fn default_blocks() -> usize {
        defaults::BLOCKS
    }

    fn default_ways() -> usize {
        defaults::WAYS
    }

    /// Checks the cache geometry.
    pub fn validate(&self) -> Result<(), String> {
        if !self.block_words.is_power_of_two() {
            return Err(format!("block_words {} is not a power of two", self.block_words));
        }
        if !self.blocks.is_power_of_two() {
            return Err(format!("blocks {} is not a power of two", self.blocks));
        }
        if self.ways == 0
            || self.blocks % self.ways != 0
            || !(self.blocks / self.ways).is_power_of_two()
        {
            return Err(format!(
                "{} ways do not divide {} blocks into a power-of-two number of sets",
                self.ways, self.blocks
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            write_policy: WritePolicy::default(),
            block_words: defaults::BLOCK_WORDS,
            blocks: defaults::BLOCKS,
            ways: defaults::WAYS,
            policy: ReplacementPolicy::default(),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline organisation
    #[serde(default)]
    pub kind: PipelineKind,

    /// Execution units of the multi-unit pipeline
    #[serde(default = "PipelineConfig::default_units")]
    pub units: Vec<UnitConfig>,
}

impl PipelineConfig {
    fn default_units() -> Vec<UnitConfig> {
        vec![
            UnitConfig {
                kind: UnitKind::Integer,
                latency: defaults::INTEGER_LATENCY,
                count: 1,
            },
            UnitConfig {
                kind: UnitKind::LoadStore,
                latency: defaults::INTEGER_LATENCY,
                count: 1,
            },
            UnitConfig {
                kind: UnitKind::Multiply,
                latency: defaults::MULTIPLY_LATENCY,
                count: 1,
            },
            UnitConfig {
                kind: UnitKind::Divide,
                latency: defaults::DIVIDE_LATENCY,
                count: 1,
            },
        ]
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            kind: PipelineKind::default(),
            units: Self::default_units(),
        }
    }
}

/// A group of identical execution units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UnitConfig {
    /// Kind of instructions the units accept
    pub kind: UnitKind,
    /// Cycles an instruction spends in the unit before its result is ready
    pub latency: u32,
    /// Number of units of this kind
    #[serde(default = "UnitConfig::default_count")]
    pub count: usize,
}

impl UnitConfig {
    fn default_count() -> usize {
        1
    }
}
