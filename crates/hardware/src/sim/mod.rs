//! Simulation control and program loading.
//!
//! This module drives the pipeline over time. It provides:
//! 1. **Loader:** JSON and ELF program images placed into memory.
//! 2. **Changes:** the per-cycle change journal and the bounded undo history.
//! 3. **Simulator:** the single-threaded cycle loop with breakpoints, interrupts and undo.
//! 4. **Driver:** a worker thread around the simulator, controlled over a request channel.

/// Per-cycle change journal and undo history.
pub mod changes;

/// Threaded simulation handle, cancellation token and lifecycle events.
pub mod driver;

/// Program images (JSON or ELF) and their placement in memory.
pub mod loader;

/// Single-threaded simulator core.
pub mod simulator;
