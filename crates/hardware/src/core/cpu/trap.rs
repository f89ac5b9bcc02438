//! Exception and Interrupt Handling.
//!
//! This module implements the COP0 side of exceptions for the CPU. It performs the following:
//! 1. **Exception Dispatch:** Saves the faulting PC into EPC, records the cause and redirects
//!    fetch to the kernel handler at `0x80000180`.
//! 2. **Interrupt Requests:** Raises the `Cause.IP` bits of external hardware interrupts and
//!    decides when a pending one may be taken.
//! 3. **Return Handling:** Implements the state change of `ERET`.
//!
//! All register writes go through the journal, so an exception entry is undone with the cycle
//! that took it.

use tracing::{debug, warn};

use super::Cpu;
use crate::common::constants::EXCEPTION_HANDLER;
use crate::common::error::Trap;
use crate::common::reg::RegId;
use crate::isa::privileged::cause::InterruptCause;
use crate::isa::privileged::cop0::{
    CAUSE_BD, CAUSE_EXC_MASK, CAUSE_EXC_SHIFT, CAUSE_IP_SHIFT, MAX_INTERRUPT_LEVEL,
    MIN_HARDWARE_LEVEL, STATUS_EXL, STATUS_IE,
};

impl Cpu {
    /// Enters the kernel exception handler.
    ///
    /// # Arguments
    ///
    /// * `trap` - Exception being taken.
    /// * `pc` - Address of the instruction that caused it.
    /// * `in_delay_slot` - The instruction sits in a branch delay slot; EPC then points at the
    ///   branch and `Cause.BD` is set.
    ///
    /// # Returns
    ///
    /// `Err(trap)` if no handler is loaded, which makes the exception fatal.
    pub fn dispatch_exception(
        &mut self,
        trap: Trap,
        pc: u32,
        in_delay_slot: bool,
    ) -> Result<(), Trap> {
        if !self.has_exception_handler() {
            warn!(pc = format_args!("{pc:#010x}"), %trap, "no exception handler loaded");
            return Err(trap);
        }
        debug!(pc = format_args!("{pc:#010x}"), %trap, "exception");

        let status = self.regs.get(RegId::STATUS);
        let mut cause = self.regs.get(RegId::CAUSE) & !CAUSE_EXC_MASK;
        if status & STATUS_EXL == 0 {
            if in_delay_slot {
                self.set_register(RegId::EPC, pc.wrapping_sub(4));
                cause |= CAUSE_BD;
            } else {
                self.set_register(RegId::EPC, pc);
                cause &= !CAUSE_BD;
            }
        }
        cause |= trap.cause.code() << CAUSE_EXC_SHIFT;
        self.set_register(RegId::CAUSE, cause);
        self.set_register(RegId::STATUS, status | STATUS_EXL);
        if let Some(address) = trap.bad_address {
            self.set_register(RegId::BAD_VADDR, address);
        }

        self.regs.unlock_all(&mut self.journal);
        self.set_pc(EXCEPTION_HANDLER);
        Ok(())
    }

    /// Raises hardware interrupt `level` (2-7) in `Cause.IP`.
    ///
    /// # Returns
    ///
    /// `false` if the level is not a hardware interrupt line.
    pub fn request_interrupt(&mut self, level: u32) -> bool {
        if !(MIN_HARDWARE_LEVEL..=MAX_INTERRUPT_LEVEL).contains(&level) {
            return false;
        }
        let cause = self.regs.get(RegId::CAUSE) | (1 << (CAUSE_IP_SHIFT + level));
        self.set_register(RegId::CAUSE, cause);
        true
    }

    /// Highest pending interrupt level that may be taken now.
    ///
    /// Requires `Status.IE`, a clear `Status.EXL`, the level's mask bit and a loaded handler.
    pub fn pending_interrupt(&self) -> Option<u32> {
        let status = self.regs.get(RegId::STATUS);
        if status & STATUS_IE == 0 || status & STATUS_EXL != 0 || !self.has_exception_handler() {
            return None;
        }
        let pending = ((self.regs.get(RegId::CAUSE) & status) >> CAUSE_IP_SHIFT) & 0xFF;
        (pending != 0).then(|| 31 - pending.leading_zeros())
    }

    /// Takes interrupt `level`, acknowledging its `Cause.IP` bit.
    ///
    /// # Arguments
    ///
    /// * `level` - Interrupt line returned by [`Cpu::pending_interrupt`].
    /// * `pc` - Address of the oldest instruction that has not committed.
    /// * `in_delay_slot` - Whether that instruction sits in a delay slot.
    pub fn take_interrupt(&mut self, level: u32, pc: u32, in_delay_slot: bool) -> Result<(), Trap> {
        let cause = self.regs.get(RegId::CAUSE) & !(1 << (CAUSE_IP_SHIFT + level));
        self.set_register(RegId::CAUSE, cause);
        self.dispatch_exception(Trap::new(InterruptCause::Interrupt), pc, in_delay_slot)
    }

    /// Leaves exception level (`ERET`).
    pub fn return_from_exception(&mut self) {
        let status = self.regs.get(RegId::STATUS) & !STATUS_EXL;
        self.set_register(RegId::STATUS, status);
    }
}
