//! Memory hierarchy interface.
//!
//! This module defines the contract shared by main memory and every cache layered above it:
//! 1. **Access:** byte, half-word and word reads/writes that may raise address errors.
//! 2. **Journaling:** each mutation records its prior state into the cycle journal.
//! 3. **Layering:** each layer has a level (main memory is 0) so undo records can address it.
//! 4. **Inspection:** side-effect-free `peek` reads for display.

/// Paged main memory.
pub mod buffer;

use std::fmt;

use crate::common::constants::LOWEST_VALID_ADDRESS;
use crate::common::error::Trap;
use crate::core::units::cache::Cache;
use crate::sim::changes::Journal;

pub use buffer::MainMemory;

/// Width of a memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    /// 8 bits.
    Byte,
    /// 16 bits.
    Half,
    /// 32 bits.
    Word,
}

impl Width {
    /// Alignment mask of the access.
    pub const fn align_mask(self) -> u32 {
        match self {
            Self::Byte => 0,
            Self::Half => 1,
            Self::Word => 3,
        }
    }
}

/// Validates an access, returning the address error it raises.
///
/// # Arguments
///
/// * `address` - Target address.
/// * `width` - Access width; the address must be naturally aligned.
/// * `store` - Whether the access writes (selects `AddressErrorStore`).
pub const fn check_access(address: u32, width: Width, store: bool) -> Result<(), Trap> {
    if address < LOWEST_VALID_ADDRESS || address & width.align_mask() != 0 {
        return Err(if store {
            Trap::address_store(address)
        } else {
            Trap::address_load(address)
        });
    }
    Ok(())
}

/// A layer of the memory hierarchy.
pub trait Memory: fmt::Debug + Send {
    /// Level of this layer; main memory is 0 and each cache adds one.
    fn level(&self) -> usize;

    /// Reads a byte.
    fn read_byte(&mut self, address: u32, journal: &mut Journal) -> Result<u8, Trap>;

    /// Reads an aligned word.
    fn read_word(&mut self, address: u32, journal: &mut Journal) -> Result<u32, Trap>;

    /// Writes a byte.
    fn write_byte(&mut self, address: u32, value: u8, journal: &mut Journal) -> Result<(), Trap>;

    /// Writes an aligned word.
    fn write_word(&mut self, address: u32, value: u32, journal: &mut Journal)
    -> Result<(), Trap>;

    /// Reads an aligned half-word through the containing word.
    fn read_half(&mut self, address: u32, journal: &mut Journal) -> Result<u16, Trap> {
        check_access(address, Width::Half, false)?;
        let word = self.read_word(address & !3, journal)?;
        let upper = (address & 2 == 0) == self.is_big_endian();
        Ok(if upper { (word >> 16) as u16 } else { word as u16 })
    }

    /// Writes an aligned half-word as two byte writes.
    fn write_half(&mut self, address: u32, value: u16, journal: &mut Journal) -> Result<(), Trap> {
        check_access(address, Width::Half, true)?;
        let bytes = if self.is_big_endian() {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.write_byte(address, bytes[0], journal)?;
        self.write_byte(address + 1, bytes[1], journal)
    }

    /// Reads a byte without touching caches, statistics or the journal.
    fn peek_byte(&self, address: u32) -> u8;

    /// Reads a word without side effects. Misaligned addresses are rounded down.
    fn peek_word(&self, address: u32) -> u32 {
        let base = address & !3;
        let bytes = [0, 1, 2, 3].map(|i| self.peek_byte(base + i));
        if self.is_big_endian() {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    }

    /// Returns `true` if words are stored most significant byte first.
    fn is_big_endian(&self) -> bool;

    /// Switches the byte order.
    fn set_big_endian(&mut self, big_endian: bool, journal: &mut Journal);

    /// Next free address of the heap.
    fn next_data_address(&self) -> u32;

    /// Moves the heap pointer without journaling. Used while loading a program.
    fn set_next_data_address(&mut self, address: u32);

    /// Reserves `bytes` of heap, rounded up to a word, returning the start of the block.
    fn allocate(&mut self, bytes: u32, journal: &mut Journal) -> u32;

    /// Copies `data` into main memory without journaling or caching. Used by loaders.
    fn load(&mut self, address: u32, data: &[u8]);

    /// Layer directly below this one.
    fn inner(&self) -> Option<&dyn Memory>;

    /// Layer at `level`, if it exists.
    fn layer_mut(&mut self, level: usize) -> Option<&mut dyn Memory>;

    /// This layer as a cache.
    fn as_cache(&self) -> Option<&Cache> {
        None
    }

    /// This layer as a mutable cache.
    fn as_cache_mut(&mut self) -> Option<&mut Cache> {
        None
    }

    /// Writes raw bytes at this layer's storage. Used only by undo.
    fn restore_bytes(&mut self, address: u32, bytes: &[u8]);

    /// Restores the byte order. Used only by undo.
    fn restore_endianness(&mut self, big_endian: bool);

    /// Restores the heap pointer. Used only by undo.
    fn restore_next_data_address(&mut self, address: u32);

    /// Invalidates every cache block and zeroes cache statistics.
    fn reset_caches(&mut self);

    /// Clones the whole hierarchy below and including this layer.
    fn boxed_clone(&self) -> Box<dyn Memory>;
}

impl Clone for Box<dyn Memory> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Iterates over the caches of a hierarchy, outermost first.
pub fn caches(memory: &dyn Memory) -> impl Iterator<Item = &Cache> {
    std::iter::successors(Some(memory), |layer| layer.inner()).filter_map(|layer| layer.as_cache())
}
