//! Core processor implementation.
//!
//! This module contains the architectural state (`Cpu`), the instruction pipelines that
//! advance it cycle by cycle, and the cache layer of the memory hierarchy.

/// Architectural register descriptions.
pub mod arch;

/// CPU state, instruction contract, exceptions and system calls.
pub mod cpu;

/// Instruction pipelines (engines, stages, slots, forwarding).
pub mod pipeline;

/// Cache layer of the memory hierarchy.
pub mod units;

pub use self::cpu::Cpu;
