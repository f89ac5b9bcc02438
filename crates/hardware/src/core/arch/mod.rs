//! MIPS32 architectural state components.
//!
//! This module contains the building blocks of the architectural state that are not tied
//! to a particular pipeline organisation:
//! 1. **Registers:** Value, reset default and ordered lock ownership of a single register.

/// Architectural register with lock ownership.
pub mod register;

pub use register::Register;
