//! Random Replacement Policy.
//!
//! Evicts a pseudo-random block from the set. The choice is a hash of the cache clock and
//! the set index rather than the output of a stateful generator, so replaying a cycle after
//! an undo evicts the same block.

use super::{CacheBlock, ReplacementPolicy};

/// Random policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomPolicy;

impl RandomPolicy {
    /// Mixes the clock and set index (SplitMix64 finalizer).
    const fn mix(clock: u64, set: usize) -> u64 {
        let mut x = clock ^ (set as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        x ^= x >> 30;
        x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        x ^= x >> 27;
        x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
        x ^ (x >> 31)
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn victim(&self, set: usize, ways: &[CacheBlock], clock: u64) -> usize {
        if ways.is_empty() {
            return 0;
        }
        (Self::mix(clock, set) % ways.len() as u64) as usize
    }

    fn name(&self) -> &'static str {
        "RANDOM"
    }

    fn boxed_clone(&self) -> Box<dyn ReplacementPolicy> {
        Box::new(*self)
    }
}
