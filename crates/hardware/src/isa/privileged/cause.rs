//! MIPS32 Exception Cause Codes.
//!
//! This module defines the exception codes written to the `ExcCode` field (bits 2-6) of the
//! COP0 Cause register when an exception is taken. Hardware interrupts share code 0; the
//! pending level is reported separately in the `IP` bits.

use std::fmt;

/// Value of `Cause.ExcCode`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterruptCause {
    /// External or software interrupt (0).
    Interrupt,
    /// Address error on load or instruction fetch (4).
    AddressErrorLoad,
    /// Address error on store (5).
    AddressErrorStore,
    /// Bus error on instruction fetch (6).
    InstructionBusError,
    /// Bus error on data load or store (7).
    DataBusError,
    /// `SYSCALL` executed (8).
    Syscall,
    /// `BREAK` executed (9).
    Breakpoint,
    /// Reserved or illegal instruction (10).
    ReservedInstruction,
    /// Coprocessor unusable (11).
    CoprocessorUnusable,
    /// Signed arithmetic overflow (12).
    ArithmeticOverflow,
    /// Trap instruction (13).
    Trap,
}

impl InterruptCause {
    /// Numeric `ExcCode` of the cause.
    pub const fn code(self) -> u32 {
        match self {
            Self::Interrupt => 0,
            Self::AddressErrorLoad => 4,
            Self::AddressErrorStore => 5,
            Self::InstructionBusError => 6,
            Self::DataBusError => 7,
            Self::Syscall => 8,
            Self::Breakpoint => 9,
            Self::ReservedInstruction => 10,
            Self::CoprocessorUnusable => 11,
            Self::ArithmeticOverflow => 12,
            Self::Trap => 13,
        }
    }

    /// Inverse of [`InterruptCause::code`].
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Interrupt,
            4 => Self::AddressErrorLoad,
            5 => Self::AddressErrorStore,
            6 => Self::InstructionBusError,
            7 => Self::DataBusError,
            8 => Self::Syscall,
            9 => Self::Breakpoint,
            10 => Self::ReservedInstruction,
            11 => Self::CoprocessorUnusable,
            12 => Self::ArithmeticOverflow,
            13 => Self::Trap,
            _ => return None,
        })
    }

    /// Returns `true` for address errors, which also load `BadVAddr`.
    pub const fn is_address_error(self) -> bool {
        matches!(self, Self::AddressErrorLoad | Self::AddressErrorStore)
    }
}

impl fmt::Display for InterruptCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Interrupt => "Interrupt",
            Self::AddressErrorLoad => "AddressErrorLoad",
            Self::AddressErrorStore => "AddressErrorStore",
            Self::InstructionBusError => "InstructionBusError",
            Self::DataBusError => "DataBusError",
            Self::Syscall => "Syscall",
            Self::Breakpoint => "Breakpoint",
            Self::ReservedInstruction => "ReservedInstruction",
            Self::CoprocessorUnusable => "CoprocessorUnusable",
            Self::ArithmeticOverflow => "ArithmeticOverflow",
            Self::Trap => "Trap",
        };
        f.write_str(name)
    }
}
