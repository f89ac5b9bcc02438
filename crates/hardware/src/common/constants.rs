//! System-wide constants.
//!
//! The memory layout follows the conventional MIPS32 map used by educational
//! assemblers: user text at `0x0040_0000`, static data at `0x1001_0000`, kernel
//! text at `0x8000_0000` and memory-mapped devices at `0xFFFF_0000`.

/// Size of an encoded instruction in bytes.
pub const INSTRUCTION_SIZE: u32 = 4;

/// Size of a machine word in bytes.
pub const WORD_SIZE: u32 = 4;

/// Lowest valid address. Accesses below raise an address error.
pub const LOWEST_VALID_ADDRESS: u32 = 0x0040_0000;

/// Base of the user text segment.
pub const TEXT_BASE: u32 = 0x0040_0000;

/// Base of the user static data segment.
pub const DATA_BASE: u32 = 0x1001_0000;

/// Initial value of `$gp`.
pub const GLOBAL_POINTER: u32 = 0x1000_8000;

/// Initial value of `$sp`.
pub const STACK_POINTER: u32 = 0x7FFF_EFFC;

/// Base of the kernel text segment.
pub const KERNEL_TEXT_BASE: u32 = 0x8000_0000;

/// Base of the kernel data segment.
pub const KERNEL_DATA_BASE: u32 = 0x9000_0000;

/// Base of the memory-mapped external segment. Never cached.
pub const EXTERNAL_BASE: u32 = 0xFFFF_0000;

/// General exception vector.
pub const EXCEPTION_HANDLER: u32 = 0x8000_0180;

/// Page size of the lazily allocated main memory.
pub const PAGE_SIZE: usize = 4096;

/// Page shift matching [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Default number of cycles kept in the undo history.
pub const MAX_CHANGES: usize = 10_000;
