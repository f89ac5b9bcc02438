//! COP0 Register Layout.
//!
//! Register numbers as used by `MFC0`/`MTC0` and the bit fields of Status and Cause.

/// `BadVAddr`, faulting address of the last address error.
pub const BAD_VADDR: u32 = 8;
/// `Status`, interrupt enable, exception level and interrupt mask.
pub const STATUS: u32 = 12;
/// `Cause`, exception code, pending interrupts and branch-delay flag.
pub const CAUSE: u32 = 13;
/// `EPC`, restart address of the last exception.
pub const EPC: u32 = 14;

/// Status: global interrupt enable.
pub const STATUS_IE: u32 = 1;
/// Status: exception level. Set while a handler runs; masks interrupts.
pub const STATUS_EXL: u32 = 1 << 1;
/// Status: user mode.
pub const STATUS_UM: u32 = 1 << 4;
/// Status: interrupt mask, one bit per level.
pub const STATUS_IM_MASK: u32 = 0xFF << 8;
/// Status value at reset: user mode, interrupts enabled, every level unmasked.
pub const STATUS_RESET: u32 = STATUS_IM_MASK | STATUS_UM | STATUS_IE;

/// Cause: shift of the `ExcCode` field.
pub const CAUSE_EXC_SHIFT: u32 = 2;
/// Cause: mask of the `ExcCode` field.
pub const CAUSE_EXC_MASK: u32 = 0x1F << CAUSE_EXC_SHIFT;
/// Cause: shift of the pending-interrupt field.
pub const CAUSE_IP_SHIFT: u32 = 8;
/// Cause: pending interrupts, one bit per level.
pub const CAUSE_IP_MASK: u32 = 0xFF << CAUSE_IP_SHIFT;
/// Cause: the faulting instruction sits in a branch delay slot.
pub const CAUSE_BD: u32 = 1 << 31;

/// Highest hardware interrupt level.
pub const MAX_INTERRUPT_LEVEL: u32 = 7;
/// Lowest hardware interrupt level. Levels 0 and 1 are software interrupts.
pub const MIN_HARDWARE_LEVEL: u32 = 2;
