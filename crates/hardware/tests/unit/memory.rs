//! Cache Layer Tests.
//!
//! Drives caches directly through the `Memory` trait: hit and miss accounting, write-back
//! versus write-through, replacement order, the memory-mapped bypass and multi-level
//! hierarchies. A property test checks that a cache never changes the values a sequence of
//! accesses observes.

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use mipsim_core::common::constants::{DATA_BASE, EXTERNAL_BASE};
use mipsim_core::config::{CacheConfig, Config, PipelineKind, ReplacementPolicy, WritePolicy};
use mipsim_core::core::units::cache::builder::build_hierarchy;
use mipsim_core::core::units::cache::{Cache, CacheBuilder};
use mipsim_core::sim::changes::Journal;
use mipsim_core::sim::simulator::Finish;
use mipsim_core::soc::memory::{MainMemory, Memory};

use crate::common::asm::*;
use crate::common::harness::{TestContext, config, image};

const A: u32 = DATA_BASE;

fn cache(blocks: usize, block_words: usize, ways: usize) -> CacheBuilder {
    CacheBuilder::new(blocks, block_words).with_ways(ways)
}

fn build(builder: CacheBuilder) -> Cache {
    builder
        .build(Box::new(MainMemory::default()))
        .expect("valid geometry")
}

fn read(cache: &mut Cache, address: u32) -> u32 {
    cache.read_word(address, &mut Journal::default()).expect("aligned read")
}

fn write(cache: &mut Cache, address: u32, value: u32) {
    cache
        .write_word(address, value, &mut Journal::default())
        .expect("aligned write");
}

fn main_memory(cache: &Cache) -> &dyn Memory {
    cache.inner().expect("cache wraps main memory")
}

// ══════════════════════════════════════════════════════════
// 1. Accounting
// ══════════════════════════════════════════════════════════

#[test]
fn direct_mapped_conflict_misses() {
    // 4 one-word blocks: A and A + 16 map to the same set.
    let mut cache = build(cache(4, 1, 1));

    let _ = read(&mut cache, A);
    let _ = read(&mut cache, A);
    let _ = read(&mut cache, A + 16);
    let _ = read(&mut cache, A);

    let stats = cache.stats();
    assert_eq!(stats.operations, 4);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses(), 3);
    assert!((stats.hit_rate() - 0.25).abs() < f64::EPSILON);
}

#[test]
fn block_fill_serves_neighbouring_words() {
    let mut cache = build(cache(4, 4, 1));

    for offset in [0, 4, 8, 12] {
        let _ = read(&mut cache, A + offset);
    }
    assert_eq!(cache.stats().operations, 4);
    assert_eq!(cache.stats().hits, 3);
}

#[test]
fn idle_cache_reports_zero_hit_rate() {
    let cache = build(cache(4, 1, 1));
    assert_eq!(cache.stats().operations, 0);
    assert!(cache.stats().hit_rate().abs() < f64::EPSILON);
}

#[test]
fn memory_mapped_addresses_bypass_the_cache() {
    let mut cache = build(cache(4, 1, 1));

    write(&mut cache, EXTERNAL_BASE, 0xAB);
    assert_eq!(read(&mut cache, EXTERNAL_BASE), 0xAB);
    assert_eq!(cache.stats().operations, 0);
    assert_eq!(main_memory(&cache).peek_word(EXTERNAL_BASE), 0xAB);
}

#[test]
fn misaligned_word_access_traps() {
    let mut cache = build(cache(4, 1, 1));
    assert!(cache.read_word(A + 2, &mut Journal::default()).is_err());
    assert_eq!(cache.stats().operations, 0);
}

// ══════════════════════════════════════════════════════════
// 2. Write policies
// ══════════════════════════════════════════════════════════

#[test]
fn write_back_defers_until_eviction() {
    let mut cache = build(cache(4, 1, 1).with_write_policy(WritePolicy::WriteBack));

    write(&mut cache, A, 0x1234_5678);
    assert_eq!(cache.peek_word(A), 0x1234_5678);
    assert_eq!(main_memory(&cache).peek_word(A), 0);
    assert!(cache.blocks().iter().any(|b| b.valid && b.dirty));

    // Conflicting access evicts the dirty block.
    let _ = read(&mut cache, A + 16);
    assert_eq!(main_memory(&cache).peek_word(A), 0x1234_5678);
    assert_eq!(read(&mut cache, A), 0x1234_5678);
}

#[test]
fn write_through_updates_next_level_immediately() {
    let mut cache = build(cache(4, 1, 1).with_write_policy(WritePolicy::WriteThrough));

    write(&mut cache, A, 77);
    assert_eq!(main_memory(&cache).peek_word(A), 77);
    assert!(cache.blocks().iter().all(|b| !b.dirty));

    // The written block was allocated.
    assert_eq!(read(&mut cache, A), 77);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn byte_writes_merge_into_cached_word() {
    let mut cache = build(cache(4, 1, 1));

    write(&mut cache, A, 0x1111_1111);
    cache
        .write_byte(A + 1, 0xFF, &mut Journal::default())
        .expect("byte write");
    assert_eq!(read(&mut cache, A), 0x1111_FF11);
}

// ══════════════════════════════════════════════════════════
// 3. Replacement
// ══════════════════════════════════════════════════════════

/// One fully-associative set of two ways: access A, B, A, C, A.
///
/// LRU evicts B for C and keeps A; FIFO evicts A, the oldest fill.
#[rstest]
#[case::lru(ReplacementPolicy::Lru, 2)]
#[case::fifo(ReplacementPolicy::Fifo, 1)]
fn replacement_order(#[case] policy: ReplacementPolicy, #[case] hits: u64) {
    let mut cache = build(cache(2, 1, 2).with_policy(policy));

    for address in [A, A + 4, A, A + 8, A] {
        let _ = read(&mut cache, address);
    }
    assert_eq!(cache.stats().operations, 5);
    assert_eq!(cache.stats().hits, hits);
}

#[test]
fn random_replacement_is_reproducible() {
    let run = || {
        let mut cache = build(cache(4, 1, 4).with_policy(ReplacementPolicy::Random));
        for i in 0..32 {
            let _ = read(&mut cache, A + (i * 7 % 13) * 4);
        }
        (cache.stats(), cache.blocks().to_vec())
    };
    assert_eq!(run(), run());
}

#[test]
fn invalid_ways_are_filled_before_evicting() {
    let mut cache = build(cache(4, 1, 4).with_policy(ReplacementPolicy::Fifo));
    for i in 0..4 {
        let _ = read(&mut cache, A + i * 4);
    }
    for i in 0..4 {
        let _ = read(&mut cache, A + i * 4);
    }
    assert_eq!(cache.stats().hits, 4);
    assert!(cache.blocks().iter().all(|b| b.valid));
}

// ══════════════════════════════════════════════════════════
// 4. Hierarchy
// ══════════════════════════════════════════════════════════

#[test]
fn two_level_hierarchy_counts_each_level() {
    let configs = [
        CacheConfig {
            blocks: 2,
            block_words: 1,
            ..CacheConfig::default()
        },
        CacheConfig {
            blocks: 8,
            block_words: 4,
            ..CacheConfig::default()
        },
    ];
    let mut memory =
        build_hierarchy(Box::new(MainMemory::default()), &configs).expect("valid hierarchy");
    let mut journal = Journal::default();

    for _ in 0..2 {
        for offset in [0, 4, 8] {
            let _ = memory.read_word(A + offset, &mut journal).expect("read");
        }
    }

    let outer = memory.as_cache().expect("outer cache").stats();
    let inner = memory
        .inner()
        .and_then(|m| m.as_cache())
        .expect("inner cache")
        .stats();
    assert_eq!(memory.level(), 2);
    assert_eq!(outer.operations, 6);
    // Only the outer misses reach the inner cache; its first fill covers all three words.
    assert_eq!(inner.operations, outer.misses());
    assert_eq!(inner.misses(), 1);
}

#[rstest]
#[case::blocks_not_power_of_two(CacheConfig { blocks: 6, ..CacheConfig::default() })]
#[case::block_words_not_power_of_two(CacheConfig { block_words: 3, ..CacheConfig::default() })]
#[case::too_many_ways(CacheConfig { blocks: 4, ways: 8, ..CacheConfig::default() })]
#[case::zero_ways(CacheConfig { ways: 0, ..CacheConfig::default() })]
fn invalid_geometry_is_rejected(#[case] config: CacheConfig) {
    assert!(build_hierarchy(Box::new(MainMemory::default()), &[config]).is_err());
}

#[test]
fn simulator_reports_cache_statistics() {
    let mut config = Config::default();
    config.caches.push(CacheConfig {
        blocks: 4,
        block_words: 2,
        ..CacheConfig::default()
    });
    let text = [
        lui(S0, 0x1001),
        addiu(T0, ZERO, 5),
        sw(T0, 0, S0),
        lw(T1, 0, S0),
        lw(T2, 4, S0),
    ];
    let mut ctx = TestContext::new(&config, &image(&text));

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(T1), 5);
    // Five fetches (two per block, three blocks) and three data accesses; the store
    // evicts the first text block and both loads hit its replacement.
    let stats = ctx.sim.cpu().system.cache_stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].operations, 8);
    assert_eq!(stats[0].hits, 4);
}

// ══════════════════════════════════════════════════════════
// 5. Transparency
// ══════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
enum Access {
    Read(u32),
    Write(u32, u32),
}

fn access() -> impl Strategy<Value = Access> {
    // 16 words spread over enough blocks to force evictions in small caches.
    let address = (0u32..16).prop_map(|w| A + w * 4);
    prop_oneof![
        address.clone().prop_map(Access::Read),
        (address, any::<u32>()).prop_map(|(a, v)| Access::Write(a, v)),
    ]
}

fn policy() -> impl Strategy<Value = ReplacementPolicy> {
    prop_oneof![
        Just(ReplacementPolicy::Lru),
        Just(ReplacementPolicy::Fifo),
        Just(ReplacementPolicy::Random),
    ]
}

fn write_policy() -> impl Strategy<Value = WritePolicy> {
    prop_oneof![Just(WritePolicy::WriteBack), Just(WritePolicy::WriteThrough)]
}

proptest! {
    #[test]
    fn cache_is_transparent(
        accesses in prop::collection::vec(access(), 1..64),
        policy in policy(),
        write_policy in write_policy(),
        ways in prop_oneof![Just(1usize), Just(2), Just(4)],
    ) {
        let mut cache = build(
            cache(4, 2, ways).with_policy(policy).with_write_policy(write_policy),
        );
        let mut model: HashMap<u32, u32> = HashMap::new();

        for access in &accesses {
            match *access {
                Access::Read(address) => {
                    let expected = model.get(&address).copied().unwrap_or(0);
                    prop_assert_eq!(read(&mut cache, address), expected);
                }
                Access::Write(address, value) => {
                    write(&mut cache, address, value);
                    let _ = model.insert(address, value);
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.operations, accesses.len() as u64);
        prop_assert!(stats.hits <= stats.operations);
        for (&address, &value) in &model {
            prop_assert_eq!(cache.peek_word(address), value);
            if write_policy == WritePolicy::WriteThrough {
                prop_assert_eq!(main_memory(&cache).peek_word(address), value);
            }
        }
    }
}

// ══════════════════════════════════════════════════════════
// 6. Top of the address space
// ══════════════════════════════════════════════════════════

const TOP_WORD: u32 = 0xFFFF_FFFC;

#[test]
fn main_memory_stores_the_last_word() {
    let mut mem = MainMemory::default();
    let mut journal = Journal::default();
    mem.write_word(TOP_WORD, 0x1122_3344, &mut journal)
        .expect("aligned write");
    assert_eq!(mem.peek_word(TOP_WORD), 0x1122_3344);
    assert_eq!(mem.peek_byte(u32::MAX), 0x11);

    mem.restore_bytes(TOP_WORD, &[0; 4]);
    assert_eq!(mem.peek_word(TOP_WORD), 0);
}

#[rstest]
#[case::single_cycle(PipelineKind::SingleCycle, false)]
#[case::classic(PipelineKind::Classic, false)]
#[case::classic_cached(PipelineKind::Classic, true)]
#[case::multi_unit(PipelineKind::MultiUnit, true)]
fn word_store_to_the_last_word(#[case] kind: PipelineKind, #[case] cached: bool) {
    let mut config = config(kind);
    if cached {
        config.caches.push(CacheConfig::default());
    }
    let text = [addiu(T0, ZERO, 7), sw(T0, -4, ZERO), lw(T1, -4, ZERO)];
    let mut ctx = TestContext::new(&config, &image(&text));

    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.gpr(T1), 7);
    assert_eq!(ctx.sim.cpu().system.memory.peek_word(TOP_WORD), 7);
}

#[test]
fn undo_restores_the_last_word() {
    let text = [addiu(T0, ZERO, 7), sw(T0, -4, ZERO)];
    let mut ctx = TestContext::classic(&text);
    assert_eq!(ctx.run_to_end(), Finish::Drained);
    assert_eq!(ctx.sim.cpu().system.memory.peek_word(TOP_WORD), 7);

    while ctx.sim.undo_last_step() {}
    assert_eq!(ctx.sim.cycles(), 0);
    assert_eq!(ctx.sim.cpu().system.memory.peek_word(TOP_WORD), 0);
}
