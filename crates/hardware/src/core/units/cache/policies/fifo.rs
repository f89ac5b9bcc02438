//! First-In, First-Out (FIFO) Replacement Policy.
//!
//! Evicts the block that was filled first, regardless of how recently it was accessed.
//! The fill time is the block's `created` stamp.
//!
//! # Performance
//!
//! - **Time Complexity:** `victim()`: O(W) where W is the number of ways
//! - **Best Case:** Streaming accesses where all blocks have equal importance
//! - **Worst Case:** Workloads with strong temporal locality

use super::{CacheBlock, ReplacementPolicy, min_by_key};

/// FIFO policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct FifoPolicy;

impl ReplacementPolicy for FifoPolicy {
    fn victim(&self, _set: usize, ways: &[CacheBlock], _clock: u64) -> usize {
        min_by_key(ways, |b| b.created)
    }

    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn boxed_clone(&self) -> Box<dyn ReplacementPolicy> {
        Box::new(*self)
    }
}
