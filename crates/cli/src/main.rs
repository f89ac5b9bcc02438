//! MIPS32 pipeline simulator CLI.
//!
//! This binary drives the simulator core from the command line. It provides:
//! 1. **Run:** Execute a program to completion (or a cycle limit) and print its console output,
//!    exit status and statistics.
//! 2. **Step:** Execute a fixed number of cycles, optionally undo some of them, and print the
//!    registers and pipeline occupancy.
//!
//! Programs are ELF executables or JSON program images. The configuration is a JSON file;
//! without one the built-in defaults apply.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::{fs, process};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use mipsim_core::common::error::SimResult;
use mipsim_core::sim::simulator::{Finish, StepOutcome};
use mipsim_core::{Config, ProgramImage, Simulator};

#[derive(Parser, Debug)]
#[command(
    name = "mipsim",
    author,
    version,
    about = "Cycle-accurate, reversible MIPS32 pipeline simulator",
    long_about = "Run or single-step a MIPS32 program on a single-cycle, multi-cycle, classic \
                  five-stage or multi-unit pipeline.\n\nExamples:\n  mipsim run prog.elf --stats\n  \
                  mipsim run prog.json --config sim.json --input \"42\"\n  \
                  mipsim step prog.elf --cycles 12 --undo 3"
)]
struct Cli {
    /// Emit a trace event for every pipeline stage of every cycle.
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program until it exits, drains or hits the cycle limit.
    Run {
        /// ELF executable or JSON program image.
        program: PathBuf,

        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop after this many cycles.
        #[arg(long)]
        max_cycles: Option<u64>,

        /// Print statistics when the run ends.
        #[arg(long)]
        stats: bool,

        /// Text queued on the console input before the run starts.
        #[arg(long)]
        input: Option<String>,
    },

    /// Execute a number of cycles and show the resulting state.
    Step {
        /// ELF executable or JSON program image.
        program: PathBuf,

        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cycles to execute.
        #[arg(long, default_value_t = 1)]
        cycles: u64,

        /// Cycles to undo afterwards.
        #[arg(long, default_value_t = 0)]
        undo: u64,

        /// Print the registers as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.trace);

    let result = match cli.command {
        Commands::Run {
            program,
            config,
            max_cycles,
            stats,
            input,
        } => cmd_run(&program, config.as_deref(), max_cycles, stats, input.as_deref()),
        Commands::Step {
            program,
            config,
            cycles,
            undo,
            json,
        } => cmd_step(&program, config.as_deref(), cycles, undo, json),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    }
}

/// Installs the fmt subscriber; `RUST_LOG` selects the level unless `trace` forces it.
fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("mipsim_core=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Loads the configuration file, or the defaults when none is given.
fn load_config(path: Option<&Path>) -> SimResult<Config> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let config = Config::from_json(&text)?;
            debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

fn build(program: &Path, config: Option<&Path>) -> SimResult<Simulator> {
    let config = load_config(config)?;
    let image = ProgramImage::from_file(program)?;
    println!(
        "[*] {}  pipeline: {:?}  forwarding: {}  delay slots: {}",
        program.display(),
        config.pipeline.kind,
        config.general.forwarding,
        config.general.delay_slots
    );
    Simulator::new(&config, &image)
}

/// Runs a program to completion.
///
/// # Returns
///
/// The process exit code: the program's own code on `Exit`, 0 when it drained, 1 on an
/// unhandled exception and 3 when the cycle limit was reached.
fn cmd_run(
    program: &Path,
    config: Option<&Path>,
    max_cycles: Option<u64>,
    stats: bool,
    input: Option<&str>,
) -> SimResult<i32> {
    let mut sim = build(program, config)?;
    if let Some(text) = input {
        sim.push_console_input(text);
    }

    let outcome = sim.run(max_cycles)?;
    print!("{}", sim.console_output());

    let code = match outcome {
        StepOutcome::Finished(Finish::Exit(code)) => {
            println!("\n[*] Exit code {code}");
            code
        }
        StepOutcome::Finished(Finish::Drained) => {
            println!("\n[*] Program drained after {} cycles", sim.cycles());
            0
        }
        StepOutcome::Finished(Finish::Fatal { trap, pc }) => {
            eprintln!("\n[!] FATAL TRAP: {trap} at {pc:#010x}");
            sim.cpu().dump_registers();
            1
        }
        StepOutcome::CycleLimit => {
            warn!(cycles = sim.cycles(), "cycle limit reached");
            println!("\n[*] Stopped at the cycle limit ({} cycles)", sim.cycles());
            3
        }
        StepOutcome::Breakpoint(_) | StepOutcome::Cancelled | StepOutcome::Executed => {
            println!("\n[*] Stopped at {pc:#010x}", pc = sim.cpu().pc());
            0
        }
    };

    if stats {
        sim.stats().print(&sim.cpu().system.cache_stats());
    }
    Ok(code)
}

/// Executes `cycles` cycles, undoes `undo` of them and prints the state.
fn cmd_step(
    program: &Path,
    config: Option<&Path>,
    cycles: u64,
    undo: u64,
    json: bool,
) -> SimResult<i32> {
    let mut sim = build(program, config)?;

    for _ in 0..cycles {
        if sim.finished().is_some() {
            break;
        }
        let _ = sim.step()?;
    }
    for _ in 0..undo {
        if !sim.undo_last_step() {
            warn!("undo history exhausted");
            break;
        }
    }

    let snapshot = sim.snapshot();
    if json {
        let registers: serde_json::Map<String, serde_json::Value> = snapshot
            .registers
            .iter()
            .map(|(id, value)| (id.to_string(), serde_json::Value::from(*value)))
            .collect();
        let doc = serde_json::json!({
            "cycle": snapshot.cycle,
            "pc": snapshot.pc,
            "registers": registers,
        });
        println!("{doc:#}");
        return Ok(0);
    }

    println!("cycle {}  pc {:#010x}", snapshot.cycle, snapshot.pc);
    sim.cpu().dump_registers();
    println!();
    if snapshot.pipeline.is_empty() {
        println!("pipeline empty");
    }
    for slot in &snapshot.pipeline {
        println!(
            "{:<12} {:#010x}  {:<28} {}",
            slot.location, slot.pc, slot.text, slot.status
        );
    }
    if let Some(finish) = snapshot.finished {
        println!("finished: {finish:?}");
    }
    Ok(0)
}
