//! MIPS O32 Application Binary Interface (ABI) register names.
//!
//! Defines the conventional names of the 32 general-purpose registers used by
//! assemblers, system calls and the disassembler.

/// Conventional names of `$0`-`$31`, without the `$` prefix.
pub const GPR_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

/// Looks a register up by conventional name (`"t0"`, `"$t0"`) or number (`"8"`, `"$8"`).
pub fn register_by_name(name: &str) -> Option<u32> {
    let name = name.strip_prefix('$').unwrap_or(name);
    if let Ok(n) = name.parse::<u32>() {
        return (n < 32).then_some(n);
    }
    GPR_NAMES
        .iter()
        .position(|&n| n == name || (name == "s8" && n == "fp"))
        .map(|i| i as u32)
}
