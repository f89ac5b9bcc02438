//! Cache construction.
//!
//! `CacheBuilder` collects the geometry and policies of one cache level and wraps a given
//! memory layer. `build_hierarchy` stacks the configured levels over main memory.

use crate::common::error::{SimError, SimResult};
use crate::config::{CacheConfig, ReplacementPolicy as PolicyType, WritePolicy};
use crate::soc::memory::Memory;

use super::{Cache, policies};

/// Builder for a single cache level.
#[derive(Clone, Copy, Debug)]
pub struct CacheBuilder {
    write_policy: WritePolicy,
    block_words: usize,
    blocks: usize,
    ways: usize,
    policy: PolicyType,
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl CacheBuilder {
    /// Creates a builder for a direct-mapped write-back LRU cache.
    ///
    /// # Arguments
    ///
    /// * `blocks` - Number of blocks.
    /// * `block_words` - Words per block.
    pub fn new(blocks: usize, block_words: usize) -> Self {
        Self {
            blocks,
            block_words,
            ..Self::default()
        }
    }

    /// Builder matching a configuration entry.
    pub const fn from_config(config: &CacheConfig) -> Self {
        Self {
            write_policy: config.write_policy,
            block_words: config.block_words,
            blocks: config.blocks,
            ways: config.ways,
            policy: config.policy,
        }
    }

    /// Sets the associativity.
    #[must_use]
    pub const fn with_ways(mut self, ways: usize) -> Self {
        self.ways = ways;
        self
    }

    /// Sets the write policy.
    #[must_use]
    pub const fn with_write_policy(mut self, write_policy: WritePolicy) -> Self {
        self.write_policy = write_policy;
        self
    }

    /// Sets the replacement policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: PolicyType) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the cache on top of `next`.
    ///
    /// # Returns
    ///
    /// `SimError::Config` if the geometry is not made of powers of two.
    pub fn build(self, next: Box<dyn Memory>) -> SimResult<Cache> {
        let config = CacheConfig {
            write_policy: self.write_policy,
            block_words: self.block_words,
            blocks: self.blocks,
            ways: self.ways,
            policy: self.policy,
        };
        config.validate().map_err(SimError::Config)?;
        Ok(Cache::new(
            self.write_policy,
            self.block_words,
            self.blocks,
            self.ways,
            policies::from_config(self.policy),
            next,
        ))
    }
}

/// Wraps `main` with the configured caches.
///
/// `caches` lists the levels outermost first, so the last entry sits directly on main memory.
pub fn build_hierarchy(main: Box<dyn Memory>, caches: &[CacheConfig]) -> SimResult<Box<dyn Memory>> {
    caches.iter().rev().try_fold(main, |next, config| {
        let cache = CacheBuilder::from_config(config).build(next)?;
        Ok(Box::new(cache) as Box<dyn Memory>)
    })
}
