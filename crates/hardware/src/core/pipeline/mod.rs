//! Instruction pipeline implementation.
//!
//! This module contains the pipeline organisations and the pieces they share.
//! It includes the following components:
//! 1. **Engine:** the `ExecutionEngine` contract and the `PipelineDispatch` enum.
//! 2. **Backends:** single-cycle, multi-cycle, classic five-stage and multi-unit organisations.
//! 3. **Hazards:** the per-cycle forwarding network.
//! 4. **Latches:** pipeline slots, their status and display views.
//! 5. **Stages:** Fetch, Decode, Execute, Memory and Writeback logic.

/// Pipeline organisations.
pub mod backend;

/// Execution engine contract and type-erased dispatch.
pub mod engine;

/// Result forwarding between in-flight instructions.
pub mod hazards;

/// Pipeline slots and stage identifiers.
pub mod latches;

/// Pipeline stage implementations (fetch, decode, execute, memory, writeback).
pub mod stages;

pub use engine::{ExecutionEngine, PipelineDispatch, TickContext, TickOutcome};
