//! Threaded simulation driver.
//!
//! A `Simulation` owns one worker thread holding a `Simulator`; all simulated state is only
//! ever touched by that thread. It provides:
//! 1. **Requests:** run, step, undo, reset, snapshots, breakpoints, console input, interrupts
//!    and observer subscription, sent over an `mpsc` channel.
//! 2. **Cancellation:** a shared generation-counting `CancelToken` polled between pipeline
//!    stages; a cancelled cycle is rolled back before the worker reports `Stopped`.
//! 3. **State machine:** `Idle` until the first run, `Running`/`Stepping` while cycles execute,
//!    `Stopped` afterwards.
//! 4. **Events:** lifecycle notifications broadcast to every subscriber.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::common::error::{SimError, SimResult};
use crate::config::GeneralConfig;
use crate::sim::simulator::{Finish, Simulator, Snapshot, StepOutcome};

/// Cooperative cancellation shared between a driver and its cycle loop.
///
/// Every [`CancelToken::cancel`] opens a new generation. A cycle loop is armed with the
/// generation current when its request was issued, so a cancel made after that point is
/// seen even if it lands before the loop starts.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<Generations>);

#[derive(Debug, Default)]
struct Generations {
    requested: AtomicU64,
    armed: AtomicU64,
}

impl CancelToken {
    /// Requests cancellation of the running cycle.
    pub fn cancel(&self) {
        let _ = self.0.requested.fetch_add(1, Ordering::SeqCst);
    }

    /// Clears every request made so far.
    pub fn reset(&self) {
        self.arm(self.generation());
    }

    /// Generation opened by the most recent cancel.
    pub fn generation(&self) -> u64 {
        self.0.requested.load(Ordering::SeqCst)
    }

    /// Honours only the cancels made after `generation`.
    pub fn arm(&self, generation: u64) {
        self.0.armed.store(generation, Ordering::SeqCst);
    }

    /// Returns `true` if cancellation was requested since the token was last armed.
    pub fn is_cancelled(&self) -> bool {
        self.0.requested.load(Ordering::SeqCst) > self.0.armed.load(Ordering::SeqCst)
    }
}

/// Lifecycle state of a simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SimState {
    /// Loaded or reset, no cycle run yet.
    Idle,
    /// Running until a breakpoint, the end of the program or a stop request.
    Running,
    /// Running a bounded number of cycles.
    Stepping,
    /// Paused after a run or step.
    Stopped,
}

impl SimState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stepping,
            _ => Self::Stopped,
        }
    }
}

/// Notification sent to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimEvent {
    /// A run or step started.
    Started,
    /// A run or step ended without finishing the program.
    Stopped(StepOutcome),
    /// The program finished.
    Finished(Finish),
    /// A cycle completed (only with `cycle_events` enabled).
    Cycle {
        /// Cycles executed so far.
        cycle: u64,
        /// Next fetch address.
        pc: u32,
    },
    /// The last cycle was undone.
    Undone {
        /// Cycles executed after the undo.
        cycle: u64,
    },
    /// The simulation returned to its loaded state.
    Reset,
}

/// Message to the worker thread.
enum Request {
    Run { max_cycles: Option<u64>, generation: u64 },
    Step { cycles: u64, generation: u64 },
    Undo { reply: Sender<bool> },
    Reset,
    Snapshot { reply: Sender<Snapshot> },
    AddBreakpoint(u32),
    RemoveBreakpoint(u32),
    ClearBreakpoints,
    ConsoleInput(String),
    Interrupt { level: u32, reply: Sender<bool> },
    Subscribe(Sender<SimEvent>),
    Shutdown,
}

impl Request {
    /// Requests that need the cycle loop to be idle.
    const fn is_exclusive(&self) -> bool {
        matches!(
            self,
            Self::Run { .. } | Self::Step { .. } | Self::Undo { .. } | Self::Reset | Self::Shutdown
        )
    }
}

/// Handle of a simulation running on its own thread.
///
/// # Examples
///
/// ```
/// use mipsim_core::{Config, ProgramImage, Simulation, Simulator};
/// use mipsim_core::sim::driver::SimEvent;
///
/// // addiu $v0, $zero, 10; syscall
/// let image = ProgramImage::from_words(&[0x2402_000A, 0x0000_000C]);
/// let config = Config::default();
/// let simulation = Simulation::spawn(Simulator::new(&config, &image).unwrap(), &config.general).unwrap();
///
/// let events = simulation.subscribe().unwrap();
/// simulation.run().unwrap();
/// while let Ok(event) = events.recv() {
///     if let SimEvent::Finished(_) = event {
///         break;
///     }
/// }
/// let simulator = simulation.shutdown().unwrap();
/// assert!(simulator.finished().is_some());
/// ```
#[derive(Debug)]
pub struct Simulation {
    requests: Sender<Request>,
    cancel: CancelToken,
    state: Arc<AtomicU8>,
    worker: Option<JoinHandle<Simulator>>,
}

impl Simulation {
    /// Moves `simulator` onto a new worker thread.
    ///
    /// # Arguments
    ///
    /// * `simulator` - Loaded simulator; its cancel token becomes the driver's.
    /// * `general` - Supplies `cycle_delay_ms` and `cycle_events`.
    ///
    /// # Errors
    ///
    /// `SimError::Io` if the thread cannot be spawned.
    pub fn spawn(simulator: Simulator, general: &GeneralConfig) -> SimResult<Self> {
        let (requests, inbox) = mpsc::channel();
        let cancel = simulator.cancel_token();
        let state = Arc::new(AtomicU8::new(SimState::Idle as u8));
        let worker = Worker {
            sim: simulator,
            inbox,
            deferred: VecDeque::new(),
            subscribers: Vec::new(),
            state: Arc::clone(&state),
            cycle_delay: Duration::from_millis(general.cycle_delay_ms),
            cycle_events: general.cycle_events,
        };
        let handle = thread::Builder::new()
            .name("mipsim-worker".into())
            .spawn(move || worker.serve())?;
        Ok(Self {
            requests,
            cancel,
            state,
            worker: Some(handle),
        })
    }

    fn send(&self, request: Request) -> SimResult<()> {
        self.requests.send(request).map_err(|_| SimError::WorkerGone)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SimState {
        SimState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Runs until a breakpoint, the end of the program or [`Simulation::stop`].
    pub fn run(&self) -> SimResult<()> {
        self.send(Request::Run {
            max_cycles: None,
            generation: self.cancel.generation(),
        })
    }

    /// Runs at most `max_cycles` cycles, stopping early like [`Simulation::run`].
    pub fn run_for(&self, max_cycles: u64) -> SimResult<()> {
        self.send(Request::Run {
            max_cycles: Some(max_cycles),
            generation: self.cancel.generation(),
        })
    }

    /// Runs `cycles` cycles.
    pub fn step(&self, cycles: u64) -> SimResult<()> {
        self.send(Request::Step {
            cycles,
            generation: self.cancel.generation(),
        })
    }

    /// Interrupts the running cycle; it is rolled back and the worker reports `Stopped`.
    ///
    /// Runs and steps requested before this call are cancelled too, including ones the
    /// worker has not started yet.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stops the worker, then reverts the most recent cycle.
    ///
    /// # Returns
    ///
    /// `false` if there was nothing to undo.
    pub fn undo_last_step(&self) -> SimResult<bool> {
        self.cancel.cancel();
        let (reply, answer) = mpsc::channel();
        self.send(Request::Undo { reply })?;
        answer.recv().map_err(|_| SimError::WorkerGone)
    }

    /// Stops the worker, then returns to the loaded program's initial state.
    pub fn reset(&self) -> SimResult<()> {
        self.cancel.cancel();
        self.send(Request::Reset)
    }

    /// Captures the state shown to users, between two cycles.
    pub fn snapshot(&self) -> SimResult<Snapshot> {
        let (reply, answer) = mpsc::channel();
        self.send(Request::Snapshot { reply })?;
        answer.recv().map_err(|_| SimError::WorkerGone)
    }

    /// Adds a breakpoint on the fetch address `pc`.
    pub fn add_breakpoint(&self, pc: u32) -> SimResult<()> {
        self.send(Request::AddBreakpoint(pc))
    }

    /// Removes the breakpoint at `pc`.
    pub fn remove_breakpoint(&self, pc: u32) -> SimResult<()> {
        self.send(Request::RemoveBreakpoint(pc))
    }

    /// Removes every breakpoint.
    pub fn clear_breakpoints(&self) -> SimResult<()> {
        self.send(Request::ClearBreakpoints)
    }

    /// Queues console input for the program.
    pub fn push_console_input(&self, text: impl Into<String>) -> SimResult<()> {
        self.send(Request::ConsoleInput(text.into()))
    }

    /// Raises hardware interrupt `level` (2-7).
    pub fn request_interrupt(&self, level: u32) -> SimResult<bool> {
        let (reply, answer) = mpsc::channel();
        self.send(Request::Interrupt { level, reply })?;
        answer.recv().map_err(|_| SimError::WorkerGone)
    }

    /// Registers an observer of lifecycle events.
    pub fn subscribe(&self) -> SimResult<Receiver<SimEvent>> {
        let (sender, receiver) = mpsc::channel();
        self.send(Request::Subscribe(sender))?;
        Ok(receiver)
    }

    /// Stops the worker and hands back the simulator.
    pub fn shutdown(mut self) -> SimResult<Simulator> {
        self.cancel.cancel();
        let _ = self.requests.send(Request::Shutdown);
        let handle = self.worker.take().ok_or(SimError::WorkerGone)?;
        handle.join().map_err(|_| SimError::WorkerGone)
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.cancel.cancel();
            let _ = self.requests.send(Request::Shutdown);
            let _ = handle.join();
        }
    }
}

/// State owned by the worker thread.
struct Worker {
    sim: Simulator,
    inbox: Receiver<Request>,
    deferred: VecDeque<Request>,
    subscribers: Vec<Sender<SimEvent>>,
    state: Arc<AtomicU8>,
    cycle_delay: Duration,
    cycle_events: bool,
}

impl Worker {
    fn serve(mut self) -> Simulator {
        loop {
            let request = match self.deferred.pop_front() {
                Some(request) => request,
                None => match self.inbox.recv() {
                    Ok(request) => request,
                    Err(_) => break,
                },
            };
            match request {
                Request::Run {
                    max_cycles,
                    generation,
                } => self.execute(max_cycles, SimState::Running, generation),
                Request::Step { cycles, generation } => {
                    self.execute(Some(cycles), SimState::Stepping, generation);
                }
                Request::Undo { reply } => {
                    let undone = self.sim.undo_last_step();
                    let _ = reply.send(undone);
                    if undone {
                        self.emit(SimEvent::Undone {
                            cycle: self.sim.cycles(),
                        });
                    }
                }
                Request::Reset => {
                    self.sim.reset();
                    self.set_state(SimState::Idle);
                    self.emit(SimEvent::Reset);
                }
                Request::Shutdown => break,
                passive => self.serve_passive(passive),
            }
        }
        debug!("simulation worker exiting");
        self.sim
    }

    /// Serves a request that does not interfere with the cycle loop.
    fn serve_passive(&mut self, request: Request) {
        match request {
            Request::Snapshot { reply } => {
                let _ = reply.send(self.sim.snapshot());
            }
            Request::AddBreakpoint(pc) => {
                let _ = self.sim.add_breakpoint(pc);
            }
            Request::RemoveBreakpoint(pc) => {
                let _ = self.sim.remove_breakpoint(pc);
            }
            Request::ClearBreakpoints => self.sim.clear_breakpoints(),
            Request::ConsoleInput(text) => self.sim.push_console_input(&text),
            Request::Interrupt { level, reply } => {
                let _ = reply.send(self.sim.request_interrupt(level));
            }
            Request::Subscribe(sender) => self.subscribers.push(sender),
            exclusive => self.deferred.push_back(exclusive),
        }
    }

    /// Handles requests that arrived while cycles run; exclusive ones wait for the loop.
    fn drain_inbox(&mut self) {
        while let Ok(request) = self.inbox.try_recv() {
            if request.is_exclusive() {
                self.deferred.push_back(request);
            } else {
                self.serve_passive(request);
            }
        }
    }

    fn execute(&mut self, budget: Option<u64>, mode: SimState, generation: u64) {
        self.sim.cancel_token().arm(generation);
        if let Some(finish) = self.sim.finished() {
            warn!("run requested after the program finished");
            self.emit(SimEvent::Finished(finish));
            return;
        }
        self.set_state(mode);
        self.emit(SimEvent::Started);

        let mut executed = 0u64;
        let outcome = loop {
            if budget.is_some_and(|max| executed >= max) {
                break StepOutcome::CycleLimit;
            }
            if executed > 0 && self.sim.at_breakpoint() {
                break StepOutcome::Breakpoint(self.sim.cpu().pc());
            }
            match self.sim.cycle() {
                StepOutcome::Executed => executed += 1,
                other => break other,
            }
            if self.cycle_events {
                self.emit(SimEvent::Cycle {
                    cycle: self.sim.cycles(),
                    pc: self.sim.cpu().pc(),
                });
            }
            self.drain_inbox();
            if mode == SimState::Running && !self.cycle_delay.is_zero() {
                thread::sleep(self.cycle_delay);
            }
        };

        debug!(executed, ?outcome, "cycle loop ended");
        self.set_state(SimState::Stopped);
        match outcome {
            StepOutcome::Finished(finish) => self.emit(SimEvent::Finished(finish)),
            other => self.emit(SimEvent::Stopped(other)),
        }
    }

    fn set_state(&self, state: SimState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn emit(&mut self, event: SimEvent) {
        self.subscribers.retain(|s| s.send(event).is_ok());
    }
}
