
/// Same final state across every organisation and forwarding setting.
pub mod equivalence;

/// Multi-cycle organisation.
pub mod multi_cycle;


/// Single-cycle organisation.
pub mod single_cycle;
