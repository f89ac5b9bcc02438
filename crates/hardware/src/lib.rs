//! MIPS32 pipeline simulator library.
//!
//! This crate implements a cycle-accurate, reversible MIPS32 simulator with the following:
//! 1. **Core:** Single-cycle, classic 5-stage and multi-unit pipelines, register locks and forwarding.
//! 2. **Memory:** Paged main memory with a configurable chain of write-back/write-through caches.
//! 3. **ISA:** Table-driven decoding of the MIPS32 integer subset, COP0 and system calls.
//! 4. **SoC:** Memory hierarchy, in-memory file system and console descriptors.
//! 5. **Simulation:** Program loading, per-cycle change journal, undo history and a threaded driver.

/// Common types and constants (memory layout, registers, errors).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// CPU core (architectural state, execution contract, pipelines, caches).
pub mod core;
/// Instruction set (encoding fields, decode table, built-in executions, COP0).
pub mod isa;
/// Program loading, change journal, cycle driver and threaded simulation handle.
pub mod sim;
/// System around the core (memory hierarchy, files, exit requests).
pub mod soc;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Architectural CPU state: registers, system and change journal.
pub use crate::core::Cpu;
/// Single-threaded simulator core: pipeline, history and breakpoints.
pub use crate::sim::simulator::Simulator;
/// Threaded simulation handle driven through a request channel.
pub use crate::sim::driver::Simulation;
/// Assembled program consumed by the simulator.
pub use crate::sim::loader::ProgramImage;
/// System around the core; construct with `System::new`.
pub use crate::soc::System;
