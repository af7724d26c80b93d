//! RustyZ80 Sim - Switch-Level Simulation Core.
//!
//! This crate advances the transistor-level Z80 model one clock edge at a
//! time. Around the propagation engine it provides everything a half-cycle
//! needs: the bus-protocol trickbox that plays the role of memory and I/O,
//! the watch recorder that captures per-signal waveforms, and the snapshot
//! reader that assembles register and pin state for observers.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       Simulation                          │
//! │                                                           │
//! │  half_cycle():                                            │
//! │    1. pins say read/write/io/irq?  ──►  Trickbox          │
//! │    2. toggle clk                   ──►  Propagator        │
//! │    3. sample watches               ──►  WatchList         │
//! │    4. tick schedules               ◄──  Trickbox          │
//! │                                                           │
//! │            all state lives in ──►  Netlist                │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use rustyz80_sim::Simulation;
//! use std::fs::File;
//! use std::io::BufReader;
//! use std::path::Path;
//!
//! let dir = Path::new("resource");
//! let mut sim = Simulation::from_resources(dir).expect("resources");
//!
//! // Load a program and bring the chip out of reset.
//! let hex = File::open(dir.join("hello_world.hex")).expect("program");
//! sim.trickbox_mut().load_hex(BufReader::new(hex)).expect("intel-hex");
//! sim.reset_sequence().expect("reset");
//!
//! // Run and observe.
//! for _ in 0..1000 {
//!     sim.half_cycle().expect("step");
//! }
//! println!("{}", sim.read_state().expect("state"));
//! ```

mod engine;
mod sim;
mod state;
mod trickbox;
mod watch;

pub use engine::{Propagator, RECALC_ITERATION_CAP};
pub use sim::{ControlPin, HalfCycleOutcome, Simulation};
pub use state::Z80State;
pub use trickbox::{HexError, TickActions, Trickbox, ECHO_ADDRESS};
pub use watch::{Watch, WatchList, MAX_HISTORY};

// Re-export the netlist types that appear in this crate's API.
pub use rustyz80_netlist::{
    LoadError, NameOp, NameOpError, NameTable, NetId, Netlist, NetlistBuilder, PinState,
    ReadError, GND, VCC,
};
