//! Paged Main Memory.
//!
//! This module implements the bottom layer of the memory hierarchy. It provides:
//! 1. **Lazy pages:** 4 KiB pages allocated on first write and zero-filled.
//! 2. **Byte order:** little-endian by default, switchable at run time.
//! 3. **Heap pointer:** the `sbrk` allocation pointer, growing upwards from the static data.
//!
//! Reads of pages that were never written return zero without allocating.

use std::collections::BTreeMap;

use crate::common::constants::{DATA_BASE, PAGE_SHIFT, PAGE_SIZE};
use crate::common::error::Trap;
use crate::sim::changes::{ChangeRecord, Journal};

use super::{Memory, Width, check_access};

/// Main memory: level 0 of the hierarchy.
#[derive(Clone, Debug)]
pub struct MainMemory {
    pages: BTreeMap<u32, Box<[u8]>>,
    big_endian: bool,
    next_data: u32,
}

impl Default for MainMemory {
    fn default() -> Self {
        Self::new(false)
    }
}

impl MainMemory {
    /// Creates empty memory.
    ///
    /// # Arguments
    ///
    /// * `big_endian` - Initial byte order.
    pub const fn new(big_endian: bool) -> Self {
        Self {
            pages: BTreeMap::new(),
            big_endian,
            next_data: DATA_BASE,
        }
    }

    /// Number of pages that have been allocated.
    pub fn allocated_pages(&self) -> usize {
        self.pages.len()
    }

    const fn split(address: u32) -> (u32, usize) {
        (address >> PAGE_SHIFT, (address as usize) & (PAGE_SIZE - 1))
    }

    fn byte(&self, address: u32) -> u8 {
        let (page, offset) = Self::split(address);
        self.pages.get(&page).map_or(0, |p| p[offset])
    }

    fn byte_mut(&mut self, address: u32) -> &mut u8 {
        let (page, offset) = Self::split(address);
        let page = self
            .pages
            .entry(page)
            .or_insert_with(|| vec![0; PAGE_SIZE].into_boxed_slice());
        &mut page[offset]
    }

    fn word_bytes(&self, address: u32) -> [u8; 4] {
        [0, 1, 2, 3].map(|i| self.byte(address + i))
    }

    const fn encode(&self, value: u32) -> [u8; 4] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    const fn decode(&self, bytes: [u8; 4]) -> u32 {
        if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    }

    fn store(&mut self, address: u32, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            *self.byte_mut(address.wrapping_add(i as u32)) = b;
        }
    }
}

impl Memory for MainMemory {
    fn level(&self) -> usize {
        0
    }

    fn read_byte(&mut self, address: u32, _journal: &mut Journal) -> Result<u8, Trap> {
        check_access(address, Width::Byte, false)?;
        Ok(self.byte(address))
    }

    fn read_word(&mut self, address: u32, _journal: &mut Journal) -> Result<u32, Trap> {
        check_access(address, Width::Word, false)?;
        Ok(self.decode(self.word_bytes(address)))
    }

    fn write_byte(&mut self, address: u32, value: u8, journal: &mut Journal) -> Result<(), Trap> {
        check_access(address, Width::Byte, true)?;
        journal.record(ChangeRecord::MemoryByte {
            level: 0,
            address,
            old: self.byte(address),
        });
        *self.byte_mut(address) = value;
        Ok(())
    }

    fn write_word(
        &mut self,
        address: u32,
        value: u32,
        journal: &mut Journal,
    ) -> Result<(), Trap> {
        check_access(address, Width::Word, true)?;
        journal.record(ChangeRecord::MemoryWord {
            level: 0,
            address,
            old: self.word_bytes(address),
        });
        let bytes = self.encode(value);
        self.store(address, &bytes);
        Ok(())
    }

    fn peek_byte(&self, address: u32) -> u8 {
        self.byte(address)
    }

    fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    fn set_big_endian(&mut self, big_endian: bool, journal: &mut Journal) {
        if self.big_endian != big_endian {
            journal.record(ChangeRecord::Endianness {
                old: self.big_endian,
            });
            self.big_endian = big_endian;
        }
    }

    fn next_data_address(&self) -> u32 {
        self.next_data
    }

    fn set_next_data_address(&mut self, address: u32) {
        self.next_data = address;
    }

    fn allocate(&mut self, bytes: u32, journal: &mut Journal) -> u32 {
        let start = self.next_data;
        let size = bytes.wrapping_add(3) & !3;
        if size != 0 {
            journal.record(ChangeRecord::AllocationPointer { old: start });
            self.next_data = start.wrapping_add(size);
        }
        start
    }

    fn load(&mut self, address: u32, data: &[u8]) {
        self.store(address, data);
    }

    fn inner(&self) -> Option<&dyn Memory> {
        None
    }

    fn layer_mut(&mut self, level: usize) -> Option<&mut dyn Memory> {
        if level == 0 { Some(self) } else { None }
    }

    fn restore_bytes(&mut self, address: u32, bytes: &[u8]) {
        self.store(address, bytes);
    }

    fn restore_endianness(&mut self, big_endian: bool) {
        self.big_endian = big_endian;
    }

    fn restore_next_data_address(&mut self, address: u32) {
        self.next_data = address;
    }

    fn reset_caches(&mut self) {}

    fn boxed_clone(&self) -> Box<dyn Memory> {
        Box::new(self.clone())
    }
}
