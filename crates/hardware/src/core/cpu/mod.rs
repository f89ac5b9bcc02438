//! CPU Core Definition and Initialization.
//!
//! This module defines the central `Cpu` structure, which serves as the container for the
//! architectural state shared by every pipeline organisation. It coordinates the following:
//! 1. **State Management:** Maintains the register file, including the PC and COP0 registers.
//! 2. **Memory Access:** Routes loads, stores and fetches through the memory hierarchy.
//! 3. **Journaling:** Owns the change journal every mutation of the cycle is recorded into.
//! 4. **Exceptions and Services:** Exception dispatch, interrupts and system calls.

/// Instruction execution contract and per-stage context.
pub mod execution;

/// System call services.
pub mod syscall;

/// Exception and interrupt dispatch.
pub mod trap;

use std::ops::Range;

use crate::common::constants::EXCEPTION_HANDLER;
use crate::common::error::Trap;
use crate::common::reg::{RegId, RegisterFile};
use crate::config::Config;
use crate::sim::changes::Journal;
use crate::soc::System;
use crate::soc::memory::{Width, check_access};

/// Behavioural switches of the core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuOptions {
    /// Forward in-flight results to dependent instructions.
    pub forwarding: bool,
    /// Execute the instruction after a control transfer before it takes effect.
    pub delay_slots: bool,
    /// Route `SYSCALL` to the kernel exception handler.
    pub kernel_syscalls: bool,
}

impl CpuOptions {
    /// Options selected in the configuration.
    pub const fn from_config(config: &Config) -> Self {
        Self {
            forwarding: config.general.forwarding,
            delay_slots: config.general.delay_slots,
            kernel_syscalls: config.general.kernel_syscalls,
        }
    }
}

/// Address ranges holding loaded code.
///
/// Fetch is suppressed outside these ranges; once the pipeline drains the program is finished.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeLayout {
    ranges: Vec<Range<u32>>,
}

impl CodeLayout {
    /// Registers `[start, end)` as executable.
    pub fn add(&mut self, start: u32, end: u32) {
        if start < end {
            self.ranges.push(start..end);
        }
    }

    /// Returns `true` if `pc` lies in loaded code.
    pub fn contains(&self, pc: u32) -> bool {
        self.ranges.iter().any(|r| r.contains(&pc))
    }

    /// Executable ranges in load order.
    pub fn ranges(&self) -> &[Range<u32>] {
        &self.ranges
    }
}

/// Architectural state of the processor.
#[derive(Clone, Debug)]
pub struct Cpu {
    /// General-purpose, HI/LO, PC and COP0 registers.
    pub regs: RegisterFile,
    /// Memory hierarchy, files and process state.
    pub system: System,
    /// Change journal of the cycle in progress.
    pub journal: Journal,
    /// Behavioural switches.
    pub options: CpuOptions,
    /// Loaded code ranges.
    pub layout: CodeLayout,
}

impl Cpu {
    /// Creates a CPU over `system` with reset register values.
    ///
    /// # Arguments
    ///
    /// * `system` - Memory hierarchy and process state.
    /// * `options` - Forwarding, delay slot and syscall switches.
    pub fn new(system: System, options: CpuOptions) -> Self {
        Self {
            regs: RegisterFile::new(),
            system,
            journal: Journal::default(),
            options,
            layout: CodeLayout::default(),
        }
    }

    /// Address of the next fetch.
    pub fn pc(&self) -> u32 {
        self.regs.get(RegId::PC)
    }

    /// Redirects the next fetch.
    pub fn set_pc(&mut self, pc: u32) {
        self.regs.set(RegId::PC, pc, &mut self.journal);
    }

    /// Writes a register outside the lock protocol (system calls, exception entry).
    pub fn set_register(&mut self, id: RegId, value: u32) {
        self.regs.set(id, value, &mut self.journal);
    }

    /// Returns `true` if an instruction may be fetched from `pc`.
    pub fn can_fetch(&self, pc: u32) -> bool {
        self.system.exit_code.is_none() && self.layout.contains(pc)
    }

    /// Returns `true` if a kernel exception handler has been loaded.
    pub fn has_exception_handler(&self) -> bool {
        self.layout.contains(EXCEPTION_HANDLER)
    }

    /// Fetches the instruction word at `pc`.
    pub fn fetch(&mut self, pc: u32) -> Result<u32, Trap> {
        check_access(pc, Width::Word, false)?;
        self.system.memory.read_word(pc, &mut self.journal)
    }

    /// Loads a byte.
    pub fn read_byte(&mut self, address: u32) -> Result<u8, Trap> {
        self.system.memory.read_byte(address, &mut self.journal)
    }

    /// Loads a half-word.
    pub fn read_half(&mut self, address: u32) -> Result<u16, Trap> {
        self.system.memory.read_half(address, &mut self.journal)
    }

    /// Loads a word.
    pub fn read_word(&mut self, address: u32) -> Result<u32, Trap> {
        self.system.memory.read_word(address, &mut self.journal)
    }

    /// Stores a byte.
    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), Trap> {
        self.system.memory.write_byte(address, value, &mut self.journal)
    }

    /// Stores a half-word.
    pub fn write_half(&mut self, address: u32, value: u16) -> Result<(), Trap> {
        self.system.memory.write_half(address, value, &mut self.journal)
    }

    /// Stores a word.
    pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), Trap> {
        self.system.memory.write_word(address, value, &mut self.journal)
    }

    /// Reads a NUL-terminated string, at most `limit` bytes.
    pub fn read_c_string(&mut self, address: u32, limit: usize) -> Result<Vec<u8>, Trap> {
        let mut bytes = Vec::new();
        let mut addr = address;
        while bytes.len() < limit {
            let b = self.read_byte(addr)?;
            if b == 0 {
                break;
            }
            bytes.push(b);
            addr = addr.wrapping_add(1);
        }
        Ok(bytes)
    }

    /// Returns the register file and memory to their loaded state. Not journaled.
    pub fn reset_from(&mut self, initial: &Self) {
        self.regs = initial.regs.clone();
        self.system = initial.system.clone();
        self.system.memory.reset_caches();
        self.journal = Journal::default();
        self.layout = initial.layout.clone();
    }

    /// Dumps the register file to stdout.
    pub fn dump_registers(&self) {
        let gprs: Vec<_> = self.regs.iter().filter(|r| r.id().is_gpr()).collect();
        for pair in gprs.chunks(2) {
            let line: Vec<String> = pair
                .iter()
                .map(|r| format!("{:<6}={:#010x}", r.id().to_string(), r.value()))
                .collect();
            println!("{}", line.join("  "));
        }
        for id in [
            RegId::HI,
            RegId::LO,
            RegId::PC,
            RegId::STATUS,
            RegId::CAUSE,
            RegId::EPC,
            RegId::BAD_VADDR,
        ] {
            println!("{:<8} = {:#010x}", id.to_string(), self.regs.get(id));
        }
    }
}
