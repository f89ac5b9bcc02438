//! Simulation statistics collection and reporting.
//!
//! This module tracks performance metrics for the MIPS simulator. It provides:
//! 1. **Cycle and IPC:** Total cycles, retired instructions, and derived metrics (CPI, IPC).
//! 2. **Instruction mix:** Counts by category (ALU, load, store, branch, system).
//! 3. **Hazards:** RAW, structural and WAW stall counts and pipeline flushes.
//! 4. **Exceptions:** Traps and hardware interrupts taken.
//! 5. **Cache hierarchy:** Hit/miss counts per cache level, supplied by the caller.
//!
//! The structure is snapshotted with the pipeline at the start of every cycle, so undoing a
//! cycle also rewinds every counter.

use std::time::Instant;

use crate::core::units::cache::CacheStats;

/// Broad category of an instruction, used for the instruction mix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstructionClass {
    /// Arithmetic, logic, shift, multiply and divide.
    Alu,
    /// Memory load.
    Load,
    /// Memory store.
    Store,
    /// Branch or jump.
    Branch,
    /// `SYSCALL`, `BREAK`, COP0 moves and `ERET`.
    System,
}

/// Simulation statistics structure tracking all performance metrics.
#[derive(Clone, Debug)]
pub struct SimStats {
    start_time: Instant,
    /// Total simulator cycles elapsed.
    pub cycles: u64,
    /// Number of instructions fetched.
    pub instructions_started: u64,
    /// Number of instructions committed by WriteBack.
    pub instructions_retired: u64,

    /// Count of ALU instructions retired.
    pub inst_alu: u64,
    /// Count of load instructions retired.
    pub inst_load: u64,
    /// Count of store instructions retired.
    pub inst_store: u64,
    /// Count of branch/jump instructions retired.
    pub inst_branch: u64,
    /// Count of system instructions retired.
    pub inst_system: u64,

    /// Cycles lost to read-after-write hazards.
    pub stalls_raw: u64,
    /// Cycles an instruction waited for a free execution unit.
    pub stalls_structural: u64,
    /// Cycles a finished instruction waited for an older one to retire.
    pub stalls_waw: u64,
    /// Number of pipeline flushes (exceptions, interrupts, exit).
    pub flushes: u64,

    /// Number of exceptions dispatched to the kernel handler.
    pub traps_taken: u64,
    /// Number of hardware interrupts taken.
    pub interrupts_taken: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            instructions_started: 0,
            instructions_retired: 0,
            inst_alu: 0,
            inst_load: 0,
            inst_store: 0,
            inst_branch: 0,
            inst_system: 0,
            stalls_raw: 0,
            stalls_structural: 0,
            stalls_waw: 0,
            flushes: 0,
            traps_taken: 0,
            interrupts_taken: 0,
        }
    }
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"hazards"`, `"instruction_mix"`, `"memory"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "hazards", "instruction_mix", "memory"];

impl SimStats {
    /// Counts one retired instruction of the given class.
    pub const fn retire(&mut self, class: InstructionClass) {
        self.instructions_retired += 1;
        match class {
            InstructionClass::Alu => self.inst_alu += 1,
            InstructionClass::Load => self.inst_load += 1,
            InstructionClass::Store => self.inst_store += 1,
            InstructionClass::Branch => self.inst_branch += 1,
            InstructionClass::System => self.inst_system += 1,
        }
    }

    /// Total stall cycles of every kind.
    pub const fn stalls(&self) -> u64 {
        self.stalls_raw + self.stalls_structural + self.stalls_waw
    }

    /// Zeroes every counter and restarts the host timer.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// # Arguments
    ///
    /// * `sections` - Slice of section names to print, or empty for all.
    /// * `caches` - Statistics of each cache level, outermost first.
    pub fn print_sections(&self, sections: &[String], caches: &[CacheStats]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let seconds = self.start_time.elapsed().as_secs_f64();
        let cyc = self.cycles.max(1);
        let instr = self.instructions_retired.max(1);
        let pct = |n: u64, of: u64| (n as f64 / of as f64) * 100.0;

        if want("summary") {
            let ipc = self.instructions_retired as f64 / cyc as f64;
            let cpi = cyc as f64 / instr as f64;
            let khz = (self.cycles as f64 / seconds.max(f64::EPSILON)) / 1000.0;
            println!("\n==========================================================");
            println!("MIPS PIPELINE SIMULATION STATISTICS");
            println!("==========================================================");
            println!("host_seconds             {seconds:.4} s");
            println!("sim_cycles               {}", self.cycles);
            println!("sim_freq                 {khz:.2} kHz");
            println!("sim_insts_fetched        {}", self.instructions_started);
            println!("sim_insts                {}", self.instructions_retired);
            println!("sim_ipc                  {ipc:.4}");
            println!("sim_cpi                  {cpi:.4}");
            println!("----------------------------------------------------------");
        }
        if want("hazards") {
            println!("HAZARDS");
            println!(
                "  stalls.raw             {} ({:.2}%)",
                self.stalls_raw,
                pct(self.stalls_raw, cyc)
            );
            println!(
                "  stalls.structural      {} ({:.2}%)",
                self.stalls_structural,
                pct(self.stalls_structural, cyc)
            );
            println!(
                "  stalls.waw             {} ({:.2}%)",
                self.stalls_waw,
                pct(self.stalls_waw, cyc)
            );
            println!("  flushes                {}", self.flushes);
            println!("  traps                  {}", self.traps_taken);
            println!("  interrupts             {}", self.interrupts_taken);
            println!("----------------------------------------------------------");
        }
        if want("instruction_mix") {
            println!("INSTRUCTION MIX");
            for (name, count) in [
                ("op.alu", self.inst_alu),
                ("op.load", self.inst_load),
                ("op.store", self.inst_store),
                ("op.branch", self.inst_branch),
                ("op.system", self.inst_system),
            ] {
                println!("  {name:<22} {count} ({:.2}%)", pct(count, instr));
            }
            println!("----------------------------------------------------------");
        }
        if want("memory") {
            println!("MEMORY HIERARCHY");
            if caches.is_empty() {
                println!("  no caches configured");
            }
            for (i, cache) in caches.iter().enumerate() {
                let miss_rate = if cache.operations > 0 {
                    pct(cache.misses(), cache.operations)
                } else {
                    0.0
                };
                println!(
                    "  L{:<5} accesses: {:<10} | hits: {:<10} | miss_rate: {:.2}%",
                    i + 1,
                    cache.operations,
                    cache.hits,
                    miss_rate
                );
            }
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[], caches)`.
    pub fn print(&self, caches: &[CacheStats]) {
        self.print_sections(&[], caches);
    }
}
