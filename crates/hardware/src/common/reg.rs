//! Register identifiers and the journaled register file.
//!
//! This module provides:
//! 1. **Identifiers:** `RegId`, a dense index over the GPRs, HI/LO, the PC and COP0 registers.
//! 2. **Storage:** `RegisterFile`, the architectural register set with per-register lock lists.
//! 3. **Reversibility:** every value or lock mutation appends a `ChangeRecord` to the journal
//!    before it is applied, so a cycle can be undone exactly.

use std::fmt;

use crate::common::constants::{GLOBAL_POINTER, STACK_POINTER};
use crate::core::arch::Register;
use crate::isa::abi;
use crate::isa::privileged::cop0;
use crate::sim::changes::{ChangeRecord, Journal};

/// Dense register identifier.
///
/// Indices `0..32` are the general-purpose registers, followed by HI, LO, the program counter
/// and the COP0 registers BadVAddr, Status, Cause and EPC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegId(pub u8);

impl RegId {
    /// `$zero`, hardwired to zero.
    pub const ZERO: Self = Self(0);
    /// `$at`, assembler temporary.
    pub const AT: Self = Self(1);
    /// `$v0`, syscall selector and return value.
    pub const V0: Self = Self(2);
    /// `$v1`, second return value.
    pub const V1: Self = Self(3);
    /// `$a0`, first argument.
    pub const A0: Self = Self(4);
    /// `$a1`, second argument.
    pub const A1: Self = Self(5);
    /// `$a2`, third argument.
    pub const A2: Self = Self(6);
    /// `$a3`, fourth argument.
    pub const A3: Self = Self(7);
    /// `$t0`, first temporary.
    pub const T0: Self = Self(8);
    /// `$t1`.
    pub const T1: Self = Self(9);
    /// `$t2`.
    pub const T2: Self = Self(10);
    /// `$s0`, first saved register.
    pub const S0: Self = Self(16);
    /// `$k0`, kernel scratch.
    pub const K0: Self = Self(26);
    /// `$k1`, kernel scratch.
    pub const K1: Self = Self(27);
    /// `$gp`, global pointer.
    pub const GP: Self = Self(28);
    /// `$sp`, stack pointer.
    pub const SP: Self = Self(29);
    /// `$fp`, frame pointer.
    pub const FP: Self = Self(30);
    /// `$ra`, return address.
    pub const RA: Self = Self(31);
    /// Multiply/divide high result.
    pub const HI: Self = Self(32);
    /// Multiply/divide low result.
    pub const LO: Self = Self(33);
    /// Program counter (address of the next fetch).
    pub const PC: Self = Self(34);
    /// COP0 register 8.
    pub const BAD_VADDR: Self = Self(35);
    /// COP0 register 12.
    pub const STATUS: Self = Self(36);
    /// COP0 register 13.
    pub const CAUSE: Self = Self(37);
    /// COP0 register 14.
    pub const EPC: Self = Self(38);

    /// Number of registers in the file.
    pub const COUNT: usize = 39;

    /// General-purpose register `n` (0-31).
    pub const fn gpr(n: u32) -> Self {
        Self((n & 0x1F) as u8)
    }

    /// Maps a COP0 register number to its identifier.
    ///
    /// # Returns
    ///
    /// `None` for COP0 numbers that are not modelled.
    pub const fn cop0(number: u32) -> Option<Self> {
        match number {
            cop0::BAD_VADDR => Some(Self::BAD_VADDR),
            cop0::STATUS => Some(Self::STATUS),
            cop0::CAUSE => Some(Self::CAUSE),
            cop0::EPC => Some(Self::EPC),
            _ => None,
        }
    }

    /// Dense index into the register file.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` for `$0`-`$31`.
    pub const fn is_gpr(self) -> bool {
        self.0 < 32
    }

    /// Conventional name of the register.
    pub const fn name(self) -> &'static str {
        match self.0 {
            n @ 0..32 => abi::GPR_NAMES[n as usize],
            32 => "hi",
            33 => "lo",
            34 => "pc",
            35 => "BadVAddr",
            36 => "Status",
            37 => "Cause",
            38 => "EPC",
            _ => "?",
        }
    }
}

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_gpr() {
            write!(f, "${}", self.name())
        } else {
            f.write_str(self.name())
        }
    }
}

/// Architectural register file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterFile {
    regs: Vec<Register>,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Creates the register file with the MIPS reset values.
    ///
    /// `$sp` and `$gp` point into the default stack and global area, Status enables interrupts
    /// in user mode with every mask bit set. Everything else is zero.
    pub fn new() -> Self {
        let regs = (0..RegId::COUNT as u8)
            .map(|i| {
                let id = RegId(i);
                let default = match id {
                    RegId::SP => STACK_POINTER,
                    RegId::GP => GLOBAL_POINTER,
                    RegId::STATUS => cop0::STATUS_RESET,
                    _ => 0,
                };
                Register::new(id, default, id != RegId::ZERO)
            })
            .collect();
        Self { regs }
    }

    /// Committed value of `id`.
    pub fn get(&self, id: RegId) -> u32 {
        self.regs[id.index()].value()
    }

    /// Full register state of `id`.
    pub fn register(&self, id: RegId) -> &Register {
        &self.regs[id.index()]
    }

    /// Iterates over every register in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Register> {
        self.regs.iter()
    }

    /// Writes `value` into `id`, journaling the previous value.
    ///
    /// # Arguments
    ///
    /// * `id` - Target register. Writes to `$zero` are ignored.
    /// * `value` - New value.
    /// * `journal` - Change journal of the current cycle.
    pub fn set(&mut self, id: RegId, value: u32, journal: &mut Journal) {
        let reg = &mut self.regs[id.index()];
        if !reg.is_modifiable() || reg.value() == value {
            return;
        }
        journal.record(ChangeRecord::RegisterValue {
            register: id,
            old: reg.value(),
        });
        reg.set_raw(value);
    }

    /// Appends a lock owned by instruction `owner`.
    pub fn lock(&mut self, id: RegId, owner: u64, journal: &mut Journal) {
        let reg = &mut self.regs[id.index()];
        if !reg.is_modifiable() {
            return;
        }
        journal.record(ChangeRecord::RegisterLock {
            register: id,
            owner,
        });
        reg.push_lock(owner);
    }

    /// Releases the first lock held by `owner`. No-op if it holds none.
    pub fn unlock(&mut self, id: RegId, owner: u64, journal: &mut Journal) {
        let reg = &mut self.regs[id.index()];
        let Some(position) = reg.locks().iter().position(|&o| o == owner) else {
            return;
        };
        journal.record(ChangeRecord::RegisterUnlock {
            register: id,
            owner,
            position,
        });
        let _ = reg.remove_lock(owner);
    }

    /// Commits `value` and releases the lock held by `owner`.
    pub fn set_and_unlock(&mut self, id: RegId, value: u32, owner: u64, journal: &mut Journal) {
        self.set(id, value, journal);
        self.unlock(id, owner, journal);
    }

    /// Releases every lock on every register. Used when the pipeline is flushed.
    pub fn unlock_all(&mut self, journal: &mut Journal) {
        for reg in &mut self.regs {
            while let Some(&owner) = reg.locks().first() {
                journal.record(ChangeRecord::RegisterUnlock {
                    register: reg.id(),
                    owner,
                    position: 0,
                });
                let _ = reg.remove_lock(owner);
            }
        }
    }

    /// Changes the reset value of `id` and applies it immediately. Not journaled.
    pub fn set_default(&mut self, id: RegId, value: u32) {
        let reg = &mut self.regs[id.index()];
        reg.set_default_raw(value);
        reg.set_raw(value);
    }

    /// Returns every register to its reset value and drops all locks. Not journaled.
    pub fn reset(&mut self) {
        for reg in &mut self.regs {
            reg.reset();
        }
    }

    pub(crate) fn restore_value(&mut self, id: RegId, old: u32) {
        self.regs[id.index()].set_raw(old);
    }

    pub(crate) fn restore_lock(&mut self, id: RegId, owner: u64) {
        self.regs[id.index()].pop_lock(owner);
    }

    pub(crate) fn restore_unlock(&mut self, id: RegId, owner: u64, position: usize) {
        self.regs[id.index()].insert_lock(position, owner);
    }
}
