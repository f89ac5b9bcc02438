//! Trap and error definitions.
//!
//! This module defines the error handling and trap mechanisms for the simulator. It provides:
//! 1. **Trap Representation:** Architectural exceptions with their cause and faulting address.
//! 2. **Stage Errors:** The outcome of a single pipeline stage call (trap, RAW hazard, host fault).
//! 3. **Simulator Errors:** Configuration, loading and driver failures surfaced to callers.

use std::fmt;

use thiserror::Error;

use crate::common::reg::RegId;
use crate::isa::privileged::cause::InterruptCause;

/// MIPS architectural exception.
///
/// Traps raised by a stage are captured in the pipeline slot and dispatched when the
/// instruction reaches WriteBack, where they redirect the PC to the exception vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Trap {
    /// Exception cause written to `Cause.ExcCode`.
    pub cause: InterruptCause,
    /// Faulting address written to `BadVAddr`, for address errors.
    pub bad_address: Option<u32>,
}

impl Trap {
    /// Creates a trap without an associated address.
    ///
    /// # Arguments
    ///
    /// * `cause` - The exception cause.
    pub const fn new(cause: InterruptCause) -> Self {
        Self {
            cause,
            bad_address: None,
        }
    }

    /// Creates an address error raised by a load or an instruction fetch.
    pub const fn address_load(address: u32) -> Self {
        Self {
            cause: InterruptCause::AddressErrorLoad,
            bad_address: Some(address),
        }
    }

    /// Creates an address error raised by a store.
    pub const fn address_store(address: u32) -> Self {
        Self {
            cause: InterruptCause::AddressErrorStore,
            bad_address: Some(address),
        }
    }

    /// Creates a reserved-instruction exception.
    pub const fn reserved_instruction() -> Self {
        Self::new(InterruptCause::ReservedInstruction)
    }
}

impl fmt::Display for Trap {
    /// Formats the trap for display.
    ///
    /// # Arguments
    ///
    /// * `f` - The formatter to write to.
    ///
    /// # Returns
    ///
    /// A formatting result indicating success or failure.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bad_address {
            Some(address) => write!(f, "{}({:#010x})", self.cause, address),
            None => write!(f, "{}", self.cause),
        }
    }
}

impl std::error::Error for Trap {}

/// Outcome of a failed stage call on an instruction execution.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StageError {
    /// Architectural exception, deferred to WriteBack.
    #[error("architectural exception {0}")]
    Trap(#[from] Trap),

    /// A source operand is still owned by an older in-flight instruction and no
    /// forwarding record can supply it. The stage is retried next cycle.
    #[error("read-after-write hazard on {register}")]
    RawHazard {
        /// Register whose value is not yet available.
        register: RegId,
    },

    /// Host-level fault inside an execution. Logged, and the stage effect is discarded.
    #[error("host fault: {0}")]
    Fault(String),
}

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The program file could not be read.
    #[error("failed to read program: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON program image or configuration is malformed.
    #[error("malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// The ELF executable is malformed or unsupported.
    #[error("malformed ELF file: {0}")]
    Elf(String),

    /// The program does not fit the simulated memory map.
    #[error("unsupported program: {0}")]
    Program(String),

    /// The program already ran to completion; reset before running again.
    #[error("simulation has already finished")]
    Finished,

    /// The simulation worker thread has terminated.
    #[error("simulation worker is no longer running")]
    WorkerGone,
}

/// Convenience alias for results carrying a [`SimError`].
pub type SimResult<T> = Result<T, SimError>;
