//! RustyZ80 Core - Simulation Control Layer.
//!
//! This crate sits between the switch-level simulator and whatever wants
//! to observe or steer it. It owns the simulation worker thread, exposes
//! the reset/run/stop control surface and the name-operation channel, and
//! fans typed notifications out to observers over a bounded channel.
//!
//! # Architecture
//!
//! ```text
//!            reset / run(n) / stop / name ops
//! observer ──────────────► Controller ◄──────────── control surface
//!    ▲                          │
//!    │   SimEvent channel       │ Arc<Mutex<Simulation>>
//!    └──────────────────────────┤
//!                               ▼
//!                         worker thread
//!                     (one half-cycle per lock)
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use rustyz80_core::{Controller, SimEvent};
//! use rustyz80_sim::Simulation;
//! use std::path::Path;
//!
//! let sim = Simulation::from_resources(Path::new("resource")).expect("resources");
//! let (mut controller, events) = Controller::new(sim);
//!
//! controller.reset().expect("reset");
//! controller.run(5000).expect("run");
//!
//! for event in events {
//!     match event {
//!         SimEvent::Echo(c) => print!("{c}"),
//!         SimEvent::RunStopped(h) => {
//!             println!("stopped at half-cycle {h}");
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! println!("{}", controller.read_state().expect("state"));
//! ```

mod controller;
mod events;
mod userdata;

pub use controller::{ControlError, Controller, RunState};
pub use events::{EventSink, SimEvent, EVENT_CHANNEL_CAPACITY};
pub use userdata::{Annotation, ColorRule, Tip, UserData};

// Re-export the simulation types observers interact with.
pub use rustyz80_sim::{
    ControlPin, HalfCycleOutcome, NameOp, NameOpError, PinState, Simulation, Z80State,
};
