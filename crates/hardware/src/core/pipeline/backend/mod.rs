//! Pipeline organisations.
//!
//! Each organisation implements `ExecutionEngine` on top of the shared stage functions:
//! 1. **Single-cycle:** one whole instruction per cycle.
//! 2. **Multi-cycle:** one instruction at a time, one stage per cycle.
//! 3. **Classic:** five stages with one instruction each.
//! 4. **Multi-unit:** parallel execution units of configurable kind and latency.

/// Classic five-stage pipeline.
pub mod classic;

/// One stage per cycle, no overlap.
pub mod multicycle;

/// Pipeline with parallel execution units.
pub mod multiunit;

/// One instruction per cycle.
pub mod single;
