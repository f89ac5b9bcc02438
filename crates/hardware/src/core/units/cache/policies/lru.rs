//! Least Recently Used (LRU) Replacement Policy.
//!
//! Evicts the block whose last access is the oldest. Every hit and fill stamps the
//! block's `modified` field with the cache clock, so the victim is the minimum stamp.
//!
//! # Performance
//!
//! - **Time Complexity:** `victim()`: O(W) where W is the number of ways
//! - **Best Case:** Loops whose working set fits in a set
//! - **Worst Case:** Scanning patterns larger than cache capacity (thrashing)

use super::{CacheBlock, ReplacementPolicy, min_by_key};

/// LRU policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct LruPolicy;

impl ReplacementPolicy for LruPolicy {
    fn victim(&self, _set: usize, ways: &[CacheBlock], _clock: u64) -> usize {
        min_by_key(ways, |b| b.modified)
    }

    fn name(&self) -> &'static str {
        "LRU"
    }

    fn boxed_clone(&self) -> Box<dyn ReplacementPolicy> {
        Box::new(*self)
    }
}
