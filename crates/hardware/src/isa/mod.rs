//! Instruction Set Architecture (ISA) Definitions.
//!
//! Contains the MIPS32 encodings, the decode table and the built-in instruction executions
//! consumed by the pipelines through the `InstructionSet` contract.
//!
//! # Modules
//!
//! * `decode`: opcode and function constants, the decode table and `BuiltinIsa`.
//! * `exec`: stage behaviour of every built-in operation.
//! * `privileged`: COP0 registers and exception cause codes.

/// Application Binary Interface (ABI) register name mappings.
pub mod abi;

/// Table-driven decoder and the built-in instruction set.
pub mod decode;

/// Instruction disassembler for displays, tracing and diagnostics.
pub mod disasm;

/// Stage behaviour of the built-in operations.
pub mod exec;

/// Instruction encoding structures and bit extraction utilities.
pub mod instruction;

/// Privileged architecture definitions (COP0 registers, exception causes).
pub mod privileged;

pub use decode::BuiltinIsa;
