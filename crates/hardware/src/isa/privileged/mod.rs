//! Privileged Architecture Definitions.
//!
//! Defines constants and types for the MIPS32 system control coprocessor (COP0).
//!
//! # Modules
//!
//! - `cause`: Exception and interrupt cause codes (`Cause.ExcCode`).
//! - `cop0`: COP0 register numbers and Status/Cause bit layouts.

/// Exception and interrupt cause code definitions.
pub mod cause;

/// COP0 register numbers and bit fields.
pub mod cop0;
