
/// JSON and ELF program images.
pub mod loader;

/// Built-in system call services.
pub mod syscalls;


/// Cycle-exact undo, history bounds and reset.
pub mod undo;
