//! Set-Associative Cache Layer.
//!
//! This module implements a cache that decorates another layer of the memory hierarchy.
//! It provides:
//! 1. **Geometry:** configurable block size, block count and associativity.
//! 2. **Policies:** write-back or write-through, with LRU, FIFO or random replacement.
//! 3. **Accounting:** operation and hit counters per cache.
//! 4. **Reversibility:** every lookup journals the touched block and the clock before
//!    mutating them, so `undo_operation` reverses exactly that access.
//!
//! Block data is kept as bytes in address order; words are assembled with the byte order
//! of main memory. Addresses in the memory-mapped segment bypass the cache.

/// Cache builder and hierarchy assembly.
pub mod builder;

/// Cache replacement policy implementations (FIFO, LRU, Random).
pub mod policies;

use tracing::trace;

use self::policies::ReplacementPolicy;
use crate::common::constants::{EXTERNAL_BASE, WORD_SIZE};
use crate::common::error::Trap;
use crate::config::WritePolicy;
use crate::sim::changes::{ChangeRecord, Journal};
use crate::soc::memory::{Memory, Width, check_access};

pub use builder::CacheBuilder;

/// One block (line) of the cache.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheBlock {
    /// Tag of the cached address range.
    pub tag: u32,
    /// Whether the block holds data.
    pub valid: bool,
    /// Whether the block differs from the next level.
    pub dirty: bool,
    /// Cached bytes, in address order.
    pub data: Vec<u8>,
    /// Cache clock when the block was filled.
    pub created: u64,
    /// Cache clock of the last access.
    pub modified: u64,
}

/// Access counters of one cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups.
    pub operations: u64,
    /// Number of lookups that hit.
    pub hits: u64,
}

impl CacheStats {
    /// Number of lookups that missed.
    pub const fn misses(&self) -> u64 {
        self.operations - self.hits
    }

    /// Fraction of lookups that hit, 0 when idle.
    pub fn hit_rate(&self) -> f64 {
        if self.operations == 0 {
            0.0
        } else {
            self.hits as f64 / self.operations as f64
        }
    }
}

/// A cache wrapping the next level of the hierarchy.
#[derive(Clone, Debug)]
pub struct Cache {
    level: usize,
    write_policy: WritePolicy,
    block_words: usize,
    sets: usize,
    ways: usize,
    blocks: Vec<CacheBlock>,
    policy: Box<dyn ReplacementPolicy>,
    clock: u64,
    stats: CacheStats,
    next: Box<dyn Memory>,
}

impl Cache {
    fn new(
        write_policy: WritePolicy,
        block_words: usize,
        blocks: usize,
        ways: usize,
        policy: Box<dyn ReplacementPolicy>,
        next: Box<dyn Memory>,
    ) -> Self {
        let block_bytes = block_words * WORD_SIZE as usize;
        Self {
            level: next.level() + 1,
            write_policy,
            block_words,
            sets: blocks / ways,
            ways,
            blocks: vec![
                CacheBlock {
                    data: vec![0; block_bytes],
                    ..CacheBlock::default()
                };
                blocks
            ],
            policy,
            clock: 0,
            stats: CacheStats::default(),
            next,
        }
    }

    /// Access counters.
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Every block, set by set.
    pub fn blocks(&self) -> &[CacheBlock] {
        &self.blocks
    }

    /// Number of sets.
    pub const fn sets(&self) -> usize {
        self.sets
    }

    /// Blocks per set.
    pub const fn ways(&self) -> usize {
        self.ways
    }

    /// Words per block.
    pub const fn block_words(&self) -> usize {
        self.block_words
    }

    /// Write policy.
    pub const fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    /// Name of the replacement policy.
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Operation clock.
    pub const fn clock(&self) -> u64 {
        self.clock
    }

    const fn block_bytes(&self) -> u32 {
        self.block_words as u32 * WORD_SIZE
    }

    const fn offset_bits(&self) -> u32 {
        self.block_bytes().trailing_zeros()
    }

    const fn set_bits(&self) -> u32 {
        (self.sets as u32).trailing_zeros()
    }

    /// Splits an address into (set, tag, offset).
    fn locate(&self, address: u32) -> (usize, u32, usize) {
        let offset = (address & (self.block_bytes() - 1)) as usize;
        let set = ((address >> self.offset_bits()) as usize) & (self.sets - 1);
        let tag = address
            .checked_shr(self.offset_bits() + self.set_bits())
            .unwrap_or(0);
        (set, tag, offset)
    }

    /// First address of the block holding `tag` in `set`.
    fn block_base(&self, set: usize, tag: u32) -> u32 {
        let tag_part = tag
            .checked_shl(self.offset_bits() + self.set_bits())
            .unwrap_or(0);
        tag_part | ((set as u32) << self.offset_bits())
    }

    fn find(&self, set: usize, tag: u32) -> Option<usize> {
        let first = set * self.ways;
        (first..first + self.ways).find(|&i| self.blocks[i].valid && self.blocks[i].tag == tag)
    }

    /// Brings the block holding `address` into the cache and returns its index.
    ///
    /// Journals the block and the clock before touching them. On a miss the victim is an
    /// invalid way if there is one, otherwise the replacement policy decides; a dirty
    /// victim is written back before the fill.
    fn lookup(&mut self, address: u32, journal: &mut Journal) -> Result<usize, Trap> {
        let (set, tag, _) = self.locate(address);
        let old_clock = self.clock;
        self.clock += 1;
        self.stats.operations += 1;

        if let Some(index) = self.find(set, tag) {
            journal.record(ChangeRecord::CacheOperation {
                level: self.level,
                hit: true,
                block_index: index,
                old: self.blocks[index].clone(),
                old_clock,
            });
            self.stats.hits += 1;
            self.blocks[index].modified = self.clock;
            trace!(level = self.level, address, index, "cache hit");
            return Ok(index);
        }

        let first = set * self.ways;
        let ways = &self.blocks[first..first + self.ways];
        let way = ways
            .iter()
            .position(|b| !b.valid)
            .unwrap_or_else(|| self.policy.victim(set, ways, self.clock));
        let index = first + way;
        journal.record(ChangeRecord::CacheOperation {
            level: self.level,
            hit: false,
            block_index: index,
            old: self.blocks[index].clone(),
            old_clock,
        });
        trace!(level = self.level, address, index, "cache miss");

        let big_endian = self.next.is_big_endian();
        let victim = &self.blocks[index];
        if victim.valid && victim.dirty {
            let base = self.block_base(set, victim.tag);
            let words = words_of(&victim.data, big_endian);
            for (i, word) in words.into_iter().enumerate() {
                self.next
                    .write_word(base + (i as u32) * WORD_SIZE, word, journal)?;
            }
        }

        let base = self.block_base(set, tag);
        let mut data = Vec::with_capacity(self.block_bytes() as usize);
        for i in 0..self.block_words as u32 {
            let word = self.next.read_word(base + i * WORD_SIZE, journal)?;
            data.extend_from_slice(&encode(word, big_endian));
        }
        self.blocks[index] = CacheBlock {
            tag,
            valid: true,
            dirty: false,
            data,
            created: self.clock,
            modified: self.clock,
        };
        Ok(index)
    }

    fn store_bytes(&mut self, address: u32, bytes: &[u8], journal: &mut Journal) -> Result<(), Trap> {
        let index = self.lookup(address, journal)?;
        let (_, _, offset) = self.locate(address);
        let block = &mut self.blocks[index];
        block.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        if self.write_policy == WritePolicy::WriteBack {
            block.dirty = true;
        }
        Ok(())
    }

    /// Reverses one journaled lookup, including its counters.
    ///
    /// # Arguments
    ///
    /// * `hit` - Whether the lookup hit.
    /// * `block_index` - Block touched by the lookup.
    /// * `old` - Block state before the lookup.
    /// * `old_clock` - Clock before the lookup.
    pub fn undo_operation(&mut self, hit: bool, block_index: usize, old: CacheBlock, old_clock: u64) {
        self.stats.operations = self.stats.operations.saturating_sub(1);
        if hit {
            self.stats.hits = self.stats.hits.saturating_sub(1);
        }
        if let Some(block) = self.blocks.get_mut(block_index) {
            *block = old;
        }
        self.clock = old_clock;
    }

    /// Invalidates every block and zeroes the counters. Not journaled.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            block.valid = false;
            block.dirty = false;
            block.tag = 0;
            block.created = 0;
            block.modified = 0;
            block.data.fill(0);
        }
        self.clock = 0;
        self.stats = CacheStats::default();
    }
}

fn encode(word: u32, big_endian: bool) -> [u8; 4] {
    if big_endian {
        word.to_be_bytes()
    } else {
        word.to_le_bytes()
    }
}

fn decode(bytes: [u8; 4], big_endian: bool) -> u32 {
    if big_endian {
        u32::from_be_bytes(bytes)
    } else {
        u32::from_le_bytes(bytes)
    }
}

fn words_of(data: &[u8], big_endian: bool) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|c| decode([c[0], c[1], c[2], c[3]], big_endian))
        .collect()
}

impl Memory for Cache {
    fn level(&self) -> usize {
        self.level
    }

    fn read_byte(&mut self, address: u32, journal: &mut Journal) -> Result<u8, Trap> {
        check_access(address, Width::Byte, false)?;
        if address >= EXTERNAL_BASE {
            return self.next.read_byte(address, journal);
        }
        let index = self.lookup(address, journal)?;
        let (_, _, offset) = self.locate(address);
        Ok(self.blocks[index].data[offset])
    }

    fn read_word(&mut self, address: u32, journal: &mut Journal) -> Result<u32, Trap> {
        check_access(address, Width::Word, false)?;
        if address >= EXTERNAL_BASE {
            return self.next.read_word(address, journal);
        }
        let index = self.lookup(address, journal)?;
        let (_, _, offset) = self.locate(address);
        let d = &self.blocks[index].data;
        let bytes = [d[offset], d[offset + 1], d[offset + 2], d[offset + 3]];
        Ok(decode(bytes, self.next.is_big_endian()))
    }

    fn write_byte(&mut self, address: u32, value: u8, journal: &mut Journal) -> Result<(), Trap> {
        check_access(address, Width::Byte, true)?;
        if address >= EXTERNAL_BASE {
            return self.next.write_byte(address, value, journal);
        }
        if self.write_policy == WritePolicy::WriteThrough {
            self.next.write_byte(address, value, journal)?;
        }
        self.store_bytes(address, &[value], journal)
    }

    fn write_word(
        &mut self,
        address: u32,
        value: u32,
        journal: &mut Journal,
    ) -> Result<(), Trap> {
        check_access(address, Width::Word, true)?;
        if address >= EXTERNAL_BASE {
            return self.next.write_word(address, value, journal);
        }
        if self.write_policy == WritePolicy::WriteThrough {
            self.next.write_word(address, value, journal)?;
        }
        let bytes = encode(value, self.next.is_big_endian());
        self.store_bytes(address, &bytes, journal)
    }

    fn peek_byte(&self, address: u32) -> u8 {
        let (set, tag, offset) = self.locate(address);
        if address < EXTERNAL_BASE
            && let Some(index) = self.find(set, tag)
        {
            return self.blocks[index].data[offset];
        }
        self.next.peek_byte(address)
    }

    fn is_big_endian(&self) -> bool {
        self.next.is_big_endian()
    }

    fn set_big_endian(&mut self, big_endian: bool, journal: &mut Journal) {
        self.next.set_big_endian(big_endian, journal);
    }

    fn next_data_address(&self) -> u32 {
        self.next.next_data_address()
    }

    fn set_next_data_address(&mut self, address: u32) {
        self.next.set_next_data_address(address);
    }

    fn allocate(&mut self, bytes: u32, journal: &mut Journal) -> u32 {
        self.next.allocate(bytes, journal)
    }

    fn load(&mut self, address: u32, data: &[u8]) {
        self.next.load(address, data);
    }

    fn inner(&self) -> Option<&dyn Memory> {
        Some(self.next.as_ref())
    }

    fn layer_mut(&mut self, level: usize) -> Option<&mut dyn Memory> {
        if level == self.level {
            return Some(self);
        }
        self.next.layer_mut(level)
    }

    fn as_cache(&self) -> Option<&Cache> {
        Some(self)
    }

    fn as_cache_mut(&mut self) -> Option<&mut Cache> {
        Some(self)
    }

    fn restore_bytes(&mut self, address: u32, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            let (set, tag, offset) = self.locate(address.wrapping_add(i as u32));
            if let Some(index) = self.find(set, tag) {
                self.blocks[index].data[offset] = b;
            }
        }
    }

    fn restore_endianness(&mut self, big_endian: bool) {
        self.next.restore_endianness(big_endian);
    }

    fn restore_next_data_address(&mut self, address: u32) {
        self.next.restore_next_data_address(address);
    }

    fn reset_caches(&mut self) {
        self.reset();
        self.next.reset_caches();
    }

    fn boxed_clone(&self) -> Box<dyn Memory> {
        Box::new(self.clone())
    }
}
