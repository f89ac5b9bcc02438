//! Common utilities and types used throughout the MIPS simulator.
//!
//! This module provides fundamental building blocks that are shared across all components
//! of the simulator. It includes:
//! 1. **Constants:** Memory layout, exception vector and history limits.
//! 2. **Error Handling:** Architectural traps, per-stage errors and crate-level errors.
//! 3. **Register Management:** Register identifiers and the lock-aware register file.

/// Common constants used throughout the simulator.
pub mod constants;

/// Error types and trap definitions.
pub mod error;

/// Register identifiers and register file implementation.
pub mod reg;

pub use error::{SimError, SimResult, StageError, Trap};
pub use reg::{RegId, RegisterFile};
