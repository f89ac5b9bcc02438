//! System Around the Core.
//!
//! This module organizes the components outside the processor that a simulated program
//! interacts with:
//! 1. **Memory hierarchy:** main memory decorated by the configured caches.
//! 2. **File system:** console descriptors and in-memory files used by system calls.
//! 3. **Process state:** the exit request and the random generator of the syscall services.

/// In-memory file system and console descriptors.
pub mod fs;

/// Memory hierarchy interface and main memory.
pub mod memory;

use crate::common::error::SimResult;
use crate::config::Config;
use crate::core::units::cache::CacheStats;
use crate::core::units::cache::builder::build_hierarchy;
use crate::sim::changes::{ChangeRecord, Journal};

use self::fs::FileSystem;
use self::memory::{MainMemory, Memory};

/// Seed of the random generator until a program reseeds it.
const DEFAULT_SEED: u64 = 0x2545_F491_4F6C_DD1D;

/// Everything outside the CPU core.
#[derive(Clone, Debug)]
pub struct System {
    /// Memory hierarchy, outermost cache first.
    pub memory: Box<dyn Memory>,
    /// Files and console.
    pub files: FileSystem,
    /// Exit code once the program asked to terminate.
    pub exit_code: Option<i32>,
    /// State of the syscall random generator.
    pub random_state: u64,
}

impl System {
    /// Creates a system over an existing memory hierarchy.
    pub fn new(memory: Box<dyn Memory>) -> Self {
        Self {
            memory,
            files: FileSystem::new(),
            exit_code: None,
            random_state: DEFAULT_SEED,
        }
    }

    /// Creates main memory and the configured caches.
    pub fn from_config(config: &Config) -> SimResult<Self> {
        let main = Box::new(MainMemory::new(config.memory.big_endian));
        let memory = build_hierarchy(main, &config.caches)?;
        Ok(Self::new(memory))
    }

    /// Records that the program asked to terminate.
    pub fn request_exit(&mut self, code: i32, journal: &mut Journal) {
        journal.record(ChangeRecord::ExitRequest {
            old: self.exit_code,
        });
        self.exit_code = Some(code);
    }

    /// Reseeds the random generator.
    pub fn seed(&mut self, seed: u64, journal: &mut Journal) {
        journal.record(ChangeRecord::RandomSeed {
            old: self.random_state,
        });
        // xorshift has a fixed point at zero
        self.random_state = if seed == 0 { DEFAULT_SEED } else { seed };
    }

    /// Draws the next 32-bit random value (xorshift64*).
    pub fn next_random(&mut self, journal: &mut Journal) -> u32 {
        journal.record(ChangeRecord::RandomSeed {
            old: self.random_state,
        });
        let mut x = self.random_state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.random_state = x;
        (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 32) as u32
    }

    /// Counters of every cache, outermost first.
    pub fn cache_stats(&self) -> Vec<CacheStats> {
        memory::caches(self.memory.as_ref())
            .map(|cache| cache.stats())
            .collect()
    }
}
