//! The run controller: owns the simulation worker and the control surface.
//!
//! Logically two threads: this controller and one simulation worker. The
//! worker locks the simulation per half-cycle, so a controller-side
//! snapshot read is atomic at half-cycle granularity. Cancellation is
//! cooperative through an atomic down-counter the worker decrements at
//! every half-cycle boundary.

use std::fs::File;
use std::io::{self, BufRead, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error};
use thiserror::Error;

use rustyz80_sim::{
    ControlPin, HexError, NameOp, NameOpError, NetId, ReadError, Simulation, Z80State,
};

use crate::events::{EventSink, SimEvent};

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// No worker active; the netlist is quiescent.
    Idle = 0,
    /// A worker is stepping half-cycles.
    Running = 1,
    /// A stop was requested; the worker will exit at the next boundary.
    Stopping = 2,
}

impl RunState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Idle,
        }
    }
}

/// Control-surface misuse or simulation-side failure.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The operation requires the Idle state.
    #[error("simulation is not idle")]
    NotIdle,

    /// A name or net could not be resolved.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// A name-op precondition was violated; nothing changed.
    #[error(transparent)]
    NameOp(#[from] NameOpError),

    /// Program loading failed.
    #[error(transparent)]
    Hex(#[from] HexError),
}

/// Owns the simulation and its worker thread; everything outside goes
/// through here.
pub struct Controller {
    sim: Arc<Mutex<Simulation>>,
    state: Arc<AtomicU8>,
    runcount: Arc<AtomicI64>,
    events: EventSink,
    worker: Option<JoinHandle<()>>,
}

impl Controller {
    /// Wraps a simulation and hands back the observer channel.
    #[must_use]
    pub fn new(sim: Simulation) -> (Self, std::sync::mpsc::Receiver<SimEvent>) {
        let (events, rx) = EventSink::channel();
        (
            Self {
                sim: Arc::new(Mutex::new(sim)),
                state: Arc::new(AtomicU8::new(RunState::Idle as u8)),
                runcount: Arc::new(AtomicI64::new(0)),
                events,
                worker: None,
            },
            rx,
        )
    }

    /// Current state-machine state.
    #[must_use]
    pub fn state(&self) -> RunState {
        RunState::from_raw(self.state.load(Ordering::SeqCst))
    }

    fn lock_sim(&self) -> MutexGuard<'_, Simulation> {
        self.sim.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Runs the simulation for `ticks` half-cycles on the worker thread.
    /// `ticks == 0` requests a cooperative stop instead.
    ///
    /// # Errors
    ///
    /// [`ControlError::NotIdle`] when a run is already in flight.
    pub fn run(&mut self, ticks: u64) -> Result<(), ControlError> {
        if ticks == 0 {
            self.stop();
            return Ok(());
        }
        if self
            .state
            .compare_exchange(
                RunState::Idle as u8,
                RunState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(ControlError::NotIdle);
        }
        self.join_worker(); // reap the previous, already-finished worker

        debug!("running for {ticks} half-cycles");
        self.runcount.store(ticks as i64, Ordering::SeqCst);
        self.events.notify(SimEvent::RunStarted);

        let sim = Arc::clone(&self.sim);
        let state = Arc::clone(&self.state);
        let runcount = Arc::clone(&self.runcount);
        let events = self.events.clone();
        self.worker = Some(thread::spawn(move || {
            while runcount.fetch_sub(1, Ordering::SeqCst) > 0 {
                let mut sim = sim.lock().unwrap_or_else(PoisonError::into_inner);
                match sim.half_cycle() {
                    Ok(outcome) => {
                        events.notify_lossy(SimEvent::Tick(sim.hcycle()));
                        if let Some(c) = outcome.echo {
                            events.notify_lossy(SimEvent::Echo(c));
                        }
                        if outcome.stop_requested {
                            runcount.store(0, Ordering::SeqCst);
                        }
                    }
                    Err(e) => {
                        error!("simulation halted: {e}");
                        runcount.store(0, Ordering::SeqCst);
                    }
                }
            }
            runcount.store(0, Ordering::SeqCst);
            let hcycle = sim
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .hcycle();
            state.store(RunState::Idle as u8, Ordering::SeqCst);
            events.notify(SimEvent::RunStopped(hcycle));
        }));
        Ok(())
    }

    /// Requests a cooperative stop; the run ends at the next half-cycle
    /// boundary and `RunStopped` is delivered asynchronously.
    pub fn stop(&mut self) {
        let _ = self.state.compare_exchange(
            RunState::Running as u8,
            RunState::Stopping as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.runcount.store(0, Ordering::SeqCst);
    }

    /// Blocks until the worker has exited and the state is Idle.
    pub fn wait_idle(&mut self) {
        self.join_worker();
    }

    /// Runs the chip reset sequence, stopping any pending run first.
    /// Watch history and trickbox schedules are cleared.
    ///
    /// # Errors
    ///
    /// [`ControlError::Read`] when a control net is missing.
    pub fn reset(&mut self) -> Result<u64, ControlError> {
        self.stop();
        self.join_worker();

        debug!("chip reset");
        let hcycle = {
            let mut sim = self.lock_sim();
            sim.watches_mut().clear();
            sim.trickbox_mut().reset();
            sim.reset_sequence()?
        };
        self.events.notify(SimEvent::RunStopped(hcycle));
        Ok(hcycle)
    }

    /// Snapshot of the register and pin state; legal in any state.
    ///
    /// # Errors
    ///
    /// [`ControlError::Read`] when a register net is missing.
    pub fn read_state(&self) -> Result<Z80State, ControlError> {
        Ok(self.lock_sim().read_state()?)
    }

    /// Runs a closure against the simulation read-only; legal in any
    /// state, atomic with respect to half-cycles.
    pub fn with_sim<R>(&self, f: impl FnOnce(&Simulation) -> R) -> R {
        f(&self.lock_sim())
    }

    /// Runs a closure against the simulation mutably. Requires Idle so
    /// external mutation never interleaves with a run.
    ///
    /// # Errors
    ///
    /// [`ControlError::NotIdle`] while a run is in flight.
    pub fn with_sim_mut<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> Result<R, ControlError> {
        if self.state() != RunState::Idle {
            return Err(ControlError::NotIdle);
        }
        Ok(f(&mut self.lock_sim()))
    }

    /// Loads an Intel-HEX program into simulated memory. Requires Idle.
    ///
    /// # Errors
    ///
    /// [`ControlError::NotIdle`] or a [`HexError`].
    pub fn load_program<R: BufRead>(&self, reader: R) -> Result<(), ControlError> {
        self.with_sim_mut(|sim| sim.trickbox_mut().load_hex(reader))?
            .map_err(ControlError::from)
    }

    /// Drives one of the external control pins.
    ///
    /// # Errors
    ///
    /// [`ControlError::Read`] when the pin's net is missing.
    pub fn set_pin(&self, pin: ControlPin, high: bool) -> Result<(), ControlError> {
        Ok(self.lock_sim().set_pin(pin, high)?)
    }

    /// Persists the user-maintained session files to a resource directory:
    /// the net-name override file and the watch list. Called on shutdown.
    ///
    /// # Errors
    ///
    /// I/O errors from either file.
    pub fn save_session(&self, dir: &Path) -> io::Result<()> {
        let sim = self.lock_sim();
        let overrides = File::create(dir.join("netnames.js"))?;
        sim.netlist().names().save_overrides(BufWriter::new(overrides))?;
        sim.watches().save(dir)
    }

    /// Names a previously anonymous net and broadcasts the change.
    ///
    /// # Errors
    ///
    /// [`ControlError::NameOp`] on a precondition violation.
    pub fn set_net_name(&self, name: &str, net: NetId) -> Result<(), ControlError> {
        debug!("setting net name {name} for net {net}");
        self.lock_sim().netlist_mut().names_mut().set(name, net)?;
        self.events.notify(SimEvent::NameOp {
            op: NameOp::Set,
            name: name.to_owned(),
            net,
        });
        Ok(())
    }

    /// Renames a named net and broadcasts the change.
    ///
    /// # Errors
    ///
    /// [`ControlError::NameOp`] on a precondition violation.
    pub fn rename_net(&self, name: &str, net: NetId) -> Result<(), ControlError> {
        debug!("renaming net {net} to {name}");
        self.lock_sim()
            .netlist_mut()
            .names_mut()
            .rename(name, net)?;
        self.events.notify(SimEvent::NameOp {
            op: NameOp::Rename,
            name: name.to_owned(),
            net,
        });
        Ok(())
    }

    /// Deletes a net's name and broadcasts the change.
    ///
    /// # Errors
    ///
    /// [`ControlError::NameOp`] on a precondition violation.
    pub fn delete_net_name(&self, net: NetId) -> Result<(), ControlError> {
        debug!("deleting name for net {net}");
        self.lock_sim().netlist_mut().names_mut().delete(net)?;
        self.events.notify(SimEvent::NameOp {
            op: NameOp::Delete,
            name: String::new(),
            net,
        });
        Ok(())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
        self.join_worker();
    }
}
