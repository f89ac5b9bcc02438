//! Cache Replacement Policies.
//!
//! Implements the algorithms that select victim blocks in set-associative caches.
//!
//! # Policies
//!
//! - `Fifo`: First-In, First-Out.
//! - `Lru`: Least Recently Used.
//! - `Random`: Pseudo-random selection.
//!
//! Policies keep no state of their own. They choose from the `created` and `modified`
//! timestamps stored in the blocks, so restoring a block on undo also restores everything
//! the policy depends on.

/// First-In, First-Out replacement policy.
pub mod fifo;

/// Least Recently Used replacement policy.
pub mod lru;

/// Pseudo-random replacement policy.
pub mod random;

use std::fmt;

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;
pub use random::RandomPolicy;

use super::CacheBlock;
use crate::config::ReplacementPolicy as PolicyType;

/// Trait for cache replacement policies.
pub trait ReplacementPolicy: fmt::Debug + Send {
    /// Selects the way to evict from a full set.
    ///
    /// # Arguments
    ///
    /// * `set` - The cache set index.
    /// * `ways` - The blocks of the set, all valid.
    /// * `clock` - The cache clock of the current operation.
    ///
    /// # Returns
    ///
    /// The index of the way to evict.
    fn victim(&self, set: usize, ways: &[CacheBlock], clock: u64) -> usize;

    /// Short display name.
    fn name(&self) -> &'static str;

    /// Clones the policy behind a box.
    fn boxed_clone(&self) -> Box<dyn ReplacementPolicy>;
}

impl Clone for Box<dyn ReplacementPolicy> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Instantiates the policy selected in the configuration.
pub fn from_config(policy: PolicyType) -> Box<dyn ReplacementPolicy> {
    match policy {
        PolicyType::Lru => Box::new(LruPolicy),
        PolicyType::Fifo => Box::new(FifoPolicy),
        PolicyType::Random => Box::new(RandomPolicy),
    }
}

/// Index of the block with the smallest key; ties go to the lowest way.
fn min_by_key(ways: &[CacheBlock], key: impl Fn(&CacheBlock) -> u64) -> usize {
    ways.iter()
        .enumerate()
        .min_by_key(|(i, b)| (key(b), *i))
        .map_or(0, |(i, _)| i)
}
